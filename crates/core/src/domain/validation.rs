// Configuration validation (rejects shell metacharacters and path traversal)

use std::collections::HashSet;

use super::error::{DomainError, Result};
use super::target::{SupervisorConfig, TargetConfig, TargetKind, MAX_SHUTDOWN_TIMEOUT_SECS};

/// Sequences that could be used for command injection or path traversal
const DANGEROUS_SEQUENCES: &[&str] = &["..", "&", "|", ";", ">", "<", "`", "$(", "%", "\n", "\r"];

fn contains_dangerous(s: &str) -> bool {
    DANGEROUS_SEQUENCES.iter().any(|seq| s.contains(seq))
}

fn reject(msg: String) -> DomainError {
    DomainError::ValidationError(msg)
}

/// Validate a single target entry
pub fn validate_target(target: &TargetConfig) -> Result<()> {
    if target.id.trim().is_empty() {
        return Err(reject("target id cannot be empty".to_string()));
    }

    match &target.kind {
        TargetKind::Spawned {
            executable,
            args,
            working_dir,
        } => {
            if executable.trim().is_empty() {
                return Err(reject(format!("target {}: executable cannot be empty", target.id)));
            }
            if contains_dangerous(executable) {
                return Err(reject(format!("invalid executable path: {}", executable)));
            }
            if let Some(dir) = working_dir {
                if contains_dangerous(dir) {
                    return Err(reject(format!("invalid working directory: {}", dir)));
                }
            }
            if let Some(arg) = args.iter().find(|a| contains_dangerous(a)) {
                return Err(reject(format!("invalid argument: {}", arg)));
            }
        }
        TargetKind::Service { service_name } => {
            if service_name.trim().is_empty() {
                return Err(reject(format!("target {}: service name cannot be empty", target.id)));
            }
            if contains_dangerous(service_name) {
                return Err(reject(format!("invalid service name: {}", service_name)));
            }
        }
    }

    if target.shutdown_timeout_secs > MAX_SHUTDOWN_TIMEOUT_SECS {
        return Err(reject(format!(
            "target {}: shutdown_timeout_secs must be <= {}",
            target.id, MAX_SHUTDOWN_TIMEOUT_SECS
        )));
    }

    let rotation = &target.log_rotation;
    if rotation.max_size_mb < 0 {
        return Err(reject("log_rotation.max_size_mb must be >= 0".to_string()));
    }
    if rotation.max_backups < 0 {
        return Err(reject("log_rotation.max_backups must be >= 0".to_string()));
    }
    if rotation.max_age_days < 0 {
        return Err(reject("log_rotation.max_age_days must be >= 0".to_string()));
    }

    Ok(())
}

/// Validate a whole configuration document (entries + id uniqueness)
pub fn validate_config(config: &SupervisorConfig) -> Result<()> {
    let mut seen = HashSet::new();
    for target in &config.targets {
        validate_target(target)?;
        if !seen.insert(target.id.as_str()) {
            return Err(reject(format!("duplicate target id: {}", target.id)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::target::LogRotation;

    fn config(targets: Vec<TargetConfig>) -> SupervisorConfig {
        SupervisorConfig { targets }
    }

    #[test]
    fn test_accepts_plain_config() {
        let cfg = config(vec![
            TargetConfig::spawned("api", "API", "/opt/api/bin/server", vec!["--port".into(), "8080".into()]),
            TargetConfig::service("db", "Database", "postgresql"),
        ]);
        assert!(validate_config(&cfg).is_ok());
    }

    #[test]
    fn test_rejects_shell_metacharacters_in_args() {
        let cfg = config(vec![TargetConfig::spawned(
            "api",
            "API",
            "/opt/api",
            vec!["ok".into(), "foo; rm -rf /".into()],
        )]);
        let err = validate_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("invalid argument"));
    }

    #[test]
    fn test_rejects_path_traversal() {
        let mut target = TargetConfig::spawned("api", "API", "/opt/api", vec![]);
        if let TargetKind::Spawned { working_dir, .. } = &mut target.kind {
            *working_dir = Some("/opt/../etc".to_string());
        }
        let err = validate_target(&target).unwrap_err();
        assert!(err.to_string().contains("working directory"));

        let target = TargetConfig::spawned("api", "API", "../bin/api", vec![]);
        assert!(validate_target(&target).is_err());
    }

    #[test]
    fn test_rejects_command_substitution_in_service_name() {
        let target = TargetConfig::service("db", "DB", "pg$(whoami)");
        assert!(validate_target(&target).is_err());
    }

    #[test]
    fn test_rejects_negative_rotation_fields() {
        let target = TargetConfig::spawned("api", "API", "/opt/api", vec![]).with_log_rotation(LogRotation {
            max_size_mb: 10,
            max_backups: -1,
            max_age_days: 0,
        });
        let err = validate_target(&target).unwrap_err();
        assert!(err.to_string().contains("max_backups"));
    }

    #[test]
    fn test_rejects_oversized_shutdown_timeout() {
        let target = TargetConfig::spawned("api", "API", "/opt/api", vec![])
            .with_shutdown_timeout(MAX_SHUTDOWN_TIMEOUT_SECS);
        assert!(validate_target(&target).is_ok());

        let target = target.with_shutdown_timeout(u64::MAX);
        let err = validate_target(&target).unwrap_err();
        assert!(err.to_string().contains("shutdown_timeout_secs"));
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let cfg = config(vec![
            TargetConfig::spawned("api", "API", "/opt/api", vec![]),
            TargetConfig::service("api", "Other", "nginx"),
        ]);
        let err = validate_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }
}
