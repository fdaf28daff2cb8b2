// Configuration Store Port
use async_trait::async_trait;
use thiserror::Error;

use crate::domain::SupervisorConfig;

#[derive(Error, Debug)]
pub enum ConfigStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Load / persist the target configuration document
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Load the document (a missing document yields an empty configuration)
    async fn load(&self) -> Result<SupervisorConfig, ConfigStoreError>;

    /// Replace the persisted document atomically
    async fn save(&self, config: &SupervisorConfig) -> Result<(), ConfigStoreError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use parking_lot::Mutex;

    /// In-memory store that counts saves
    #[derive(Default)]
    pub struct MockConfigStore {
        config: Mutex<SupervisorConfig>,
        saves: Mutex<usize>,
        fail_saves: Mutex<bool>,
    }

    impl MockConfigStore {
        pub fn new(config: SupervisorConfig) -> Self {
            Self {
                config: Mutex::new(config),
                ..Default::default()
            }
        }

        pub fn save_count(&self) -> usize {
            *self.saves.lock()
        }

        pub fn saved(&self) -> SupervisorConfig {
            self.config.lock().clone()
        }

        pub fn set_fail_saves(&self, fail: bool) {
            *self.fail_saves.lock() = fail;
        }
    }

    #[async_trait]
    impl ConfigStore for MockConfigStore {
        async fn load(&self) -> Result<SupervisorConfig, ConfigStoreError> {
            Ok(self.config.lock().clone())
        }

        async fn save(&self, config: &SupervisorConfig) -> Result<(), ConfigStoreError> {
            if *self.fail_saves.lock() {
                return Err(ConfigStoreError::Io(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "read-only store",
                )));
            }
            *self.saves.lock() += 1;
            *self.config.lock() = config.clone();
            Ok(())
        }
    }
}
