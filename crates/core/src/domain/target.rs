// Target Domain Model

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound for `shutdown_timeout_secs` (one day)
pub const MAX_SHUTDOWN_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Target ID (unique per configuration document)
pub type TargetId = String;

/// How a target is brought up and torn down
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetKind {
    /// Executable launched and owned by the supervisor
    Spawned {
        executable: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        working_dir: Option<String>,
    },
    /// Service managed by the host's service manager
    Service { service_name: String },
}

/// Log rotation policy applied before each spawn
///
/// Fields are signed so that a hand-edited document with negative values
/// surfaces as a validation error instead of a parse error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRotation {
    #[serde(default)]
    pub max_size_mb: i64,
    #[serde(default)]
    pub max_backups: i64,
    #[serde(default)]
    pub max_age_days: i64,
}

impl LogRotation {
    pub fn is_enabled(&self) -> bool {
        self.max_size_mb > 0
    }

    pub fn max_size_bytes(&self) -> u64 {
        (self.max_size_mb.max(0) as u64) * 1024 * 1024
    }
}

/// Target configuration (one entry of the configuration document)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    pub id: TargetId,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,

    #[serde(flatten)]
    pub kind: TargetKind,

    #[serde(default)]
    pub auto_restart: bool,

    /// Graceful-shutdown timeout in seconds (0 = force-terminate immediately)
    #[serde(default)]
    pub shutdown_timeout_secs: u64,

    #[serde(default)]
    pub log_rotation: LogRotation,
}

impl TargetConfig {
    /// Spawned-executable target with defaults (no auto-restart, immediate kill on stop)
    pub fn spawned(
        id: impl Into<String>,
        name: impl Into<String>,
        executable: impl Into<String>,
        args: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: None,
            kind: TargetKind::Spawned {
                executable: executable.into(),
                args,
                working_dir: None,
            },
            auto_restart: false,
            shutdown_timeout_secs: 0,
            log_rotation: LogRotation::default(),
        }
    }

    /// OS-service target with defaults
    pub fn service(
        id: impl Into<String>,
        name: impl Into<String>,
        service_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: None,
            kind: TargetKind::Service {
                service_name: service_name.into(),
            },
            auto_restart: false,
            shutdown_timeout_secs: 0,
            log_rotation: LogRotation::default(),
        }
    }

    pub fn with_auto_restart(mut self, auto_restart: bool) -> Self {
        self.auto_restart = auto_restart;
        self
    }

    pub fn with_shutdown_timeout(mut self, secs: u64) -> Self {
        self.shutdown_timeout_secs = secs;
        self
    }

    pub fn with_log_rotation(mut self, log_rotation: LogRotation) -> Self {
        self.log_rotation = log_rotation;
        self
    }

    pub fn is_service(&self) -> bool {
        matches!(self.kind, TargetKind::Service { .. })
    }

    /// Executable path (spawned) or service name (service), for display
    pub fn executable(&self) -> &str {
        match &self.kind {
            TargetKind::Spawned { executable, .. } => executable,
            TargetKind::Service { service_name } => service_name,
        }
    }

    pub fn working_dir(&self) -> Option<&str> {
        match &self.kind {
            TargetKind::Spawned { working_dir, .. } => working_dir.as_deref(),
            TargetKind::Service { .. } => None,
        }
    }

    /// Graceful-shutdown timeout, clamped to `MAX_SHUTDOWN_TIMEOUT_SECS`
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs.min(MAX_SHUTDOWN_TIMEOUT_SECS))
    }
}

/// Whole configuration document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorConfig {
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_spawned_and_service_entries() {
        let doc = serde_json::json!({
            "targets": [
                {
                    "id": "api",
                    "name": "API server",
                    "kind": "spawned",
                    "executable": "/usr/bin/api",
                    "args": ["--port", "8080"],
                    "auto_restart": true,
                    "shutdown_timeout_secs": 10,
                    "log_rotation": { "max_size_mb": 5, "max_backups": 3 }
                },
                {
                    "id": "db",
                    "name": "Database",
                    "kind": "service",
                    "service_name": "postgresql"
                }
            ]
        });

        let config: SupervisorConfig = serde_json::from_value(doc).unwrap();
        assert_eq!(config.targets.len(), 2);

        let api = &config.targets[0];
        assert!(!api.is_service());
        assert_eq!(api.executable(), "/usr/bin/api");
        assert_eq!(api.shutdown_timeout(), Duration::from_secs(10));
        assert_eq!(api.log_rotation.max_size_bytes(), 5 * 1024 * 1024);
        assert_eq!(api.log_rotation.max_age_days, 0);

        let db = &config.targets[1];
        assert!(db.is_service());
        assert_eq!(db.executable(), "postgresql");
        assert!(!db.auto_restart);
        assert_eq!(db.working_dir(), None);
    }

    #[test]
    fn test_shutdown_timeout_is_clamped() {
        let cfg = TargetConfig::spawned("api", "API", "/bin/api", vec![]).with_shutdown_timeout(u64::MAX);
        assert_eq!(cfg.shutdown_timeout(), Duration::from_secs(MAX_SHUTDOWN_TIMEOUT_SECS));
    }

    #[test]
    fn test_serialize_keeps_kind_tag_flat() {
        let cfg = TargetConfig::service("db", "Database", "postgresql");
        let value = serde_json::to_value(&cfg).unwrap();
        assert_eq!(value["kind"], "service");
        assert_eq!(value["service_name"], "postgresql");
    }
}
