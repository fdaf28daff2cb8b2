//! Daemon settings read from `PROCWATCH_*` environment variables

use std::path::PathBuf;

use procwatch_api_rpc::server::{DEFAULT_RPC_HOST, DEFAULT_RPC_PORT};

const DEFAULT_CONFIG_PATH: &str = "~/.procwatch/config.json";
const DEFAULT_LOG_DIR: &str = "~/.procwatch/logs";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonSettings {
    /// Target configuration document
    pub config_path: PathBuf,
    /// Per-target stdout/stderr logs
    pub log_dir: PathBuf,
    pub rpc_host: String,
    pub rpc_port: u16,
    pub log_format: LogFormat,
    /// Daily-rolling file for the daemon's own logs; stderr only when unset
    pub daemon_log_dir: Option<PathBuf>,
    /// Start every target at boot
    pub autostart: bool,
}

impl DaemonSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let path = |key: &str, default: &str| -> PathBuf {
            let raw = lookup(key).unwrap_or_else(|| default.to_string());
            PathBuf::from(shellexpand::tilde(&raw).into_owned())
        };

        let log_format = match lookup("PROCWATCH_LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        let autostart = lookup("PROCWATCH_AUTOSTART")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Self {
            config_path: path("PROCWATCH_CONFIG_PATH", DEFAULT_CONFIG_PATH),
            log_dir: path("PROCWATCH_LOG_DIR", DEFAULT_LOG_DIR),
            rpc_host: lookup("PROCWATCH_RPC_HOST").unwrap_or_else(|| DEFAULT_RPC_HOST.to_string()),
            rpc_port: lookup("PROCWATCH_RPC_PORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_RPC_PORT),
            log_format,
            daemon_log_dir: lookup("PROCWATCH_DAEMON_LOG_DIR")
                .filter(|s| !s.is_empty())
                .map(|s| PathBuf::from(shellexpand::tilde(&s).into_owned())),
            autostart,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> DaemonSettings {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DaemonSettings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let s = settings(&[]);
        assert_eq!(s.rpc_host, "127.0.0.1");
        assert_eq!(s.rpc_port, 8090);
        assert_eq!(s.log_format, LogFormat::Pretty);
        assert!(s.daemon_log_dir.is_none());
        assert!(!s.autostart);
        assert!(s.config_path.ends_with(".procwatch/config.json"));
        assert!(!s.config_path.to_string_lossy().starts_with('~'));
    }

    #[test]
    fn test_defaults_follow_rpc_server() {
        let s = settings(&[]);
        assert_eq!(s.rpc_host, DEFAULT_RPC_HOST);
        assert_eq!(s.rpc_port, DEFAULT_RPC_PORT);
    }

    #[test]
    fn test_overrides() {
        let s = settings(&[
            ("PROCWATCH_CONFIG_PATH", "/etc/procwatch.json"),
            ("PROCWATCH_RPC_PORT", "9100"),
            ("PROCWATCH_LOG_FORMAT", "json"),
            ("PROCWATCH_DAEMON_LOG_DIR", "/var/log/procwatch"),
            ("PROCWATCH_AUTOSTART", "true"),
        ]);
        assert_eq!(s.config_path, PathBuf::from("/etc/procwatch.json"));
        assert_eq!(s.rpc_port, 9100);
        assert_eq!(s.log_format, LogFormat::Json);
        assert_eq!(s.daemon_log_dir, Some(PathBuf::from("/var/log/procwatch")));
        assert!(s.autostart);
    }

    #[test]
    fn test_bad_port_falls_back() {
        assert_eq!(settings(&[("PROCWATCH_RPC_PORT", "http")]).rpc_port, 8090);
    }
}
