// Central Error Type for the Application

use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Process could not be created, or its log sink / input pipe could not be opened
    #[error("Spawn failed: {0}")]
    Spawn(String),

    /// Transient OS query failure (swallowed per sampler tick)
    #[error("OS query failed: {0}")]
    OsQuery(String),

    #[error("Adapter error: {0}")]
    Adapter(crate::port::AdapterError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

// Spawn and query failures map onto their own variants
impl From<crate::port::AdapterError> for AppError {
    fn from(err: crate::port::AdapterError) -> Self {
        match err {
            crate::port::AdapterError::SpawnFailed(msg) => AppError::Spawn(msg),
            crate::port::AdapterError::QueryFailed(msg) => AppError::OsQuery(msg),
            other => AppError::Adapter(other),
        }
    }
}

impl From<crate::port::ConfigStoreError> for AppError {
    fn from(err: crate::port::ConfigStoreError) -> Self {
        AppError::Config(err.to_string())
    }
}
