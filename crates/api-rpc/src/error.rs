//! RPC Error Types
//!
//! Maps application errors to JSON-RPC error codes.

use jsonrpsee::types::ErrorObjectOwned;
use procwatch_core::error::AppError;

/// RPC Error Codes
pub mod code {
    pub const VALIDATION_ERROR: i32 = 4000;
    pub const NOT_FOUND: i32 = 4001;
    pub const CONFLICT: i32 = 4002;
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const SYSTEM_ERROR: i32 = 5002;
}

/// Convert AppError to JSON-RPC ErrorObject
pub fn to_rpc_error(err: AppError) -> ErrorObjectOwned {
    let code = match &err {
        AppError::Validation(_) | AppError::Serialization(_) => code::VALIDATION_ERROR,
        AppError::Domain(procwatch_core::domain::DomainError::ValidationError(_)) => {
            code::VALIDATION_ERROR
        }
        AppError::Domain(procwatch_core::domain::DomainError::TargetNotFound(_))
        | AppError::NotFound(_) => code::NOT_FOUND,
        AppError::Domain(_) | AppError::InvalidState(_) => code::CONFLICT,
        AppError::Spawn(_) | AppError::OsQuery(_) | AppError::Adapter(_) | AppError::Io(_) => {
            code::SYSTEM_ERROR
        }
        AppError::Config(_) | AppError::Internal(_) => code::INTERNAL_ERROR,
    };
    ErrorObjectOwned::owned(code, err.to_string(), None::<()>)
}

#[cfg(test)]
mod tests {
    use super::*;
    use procwatch_core::domain::DomainError;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            to_rpc_error(AppError::NotFound("x".into())).code(),
            code::NOT_FOUND
        );
        assert_eq!(
            to_rpc_error(AppError::Validation("bad".into())).code(),
            code::VALIDATION_ERROR
        );
        assert_eq!(
            to_rpc_error(AppError::InvalidState("stopping".into())).code(),
            code::CONFLICT
        );
        assert_eq!(
            to_rpc_error(AppError::Spawn("no such file".into())).code(),
            code::SYSTEM_ERROR
        );
        assert_eq!(
            to_rpc_error(AppError::Domain(DomainError::InvalidStateTransition {
                from: "stopping".into(),
                to: "running".into(),
            }))
            .code(),
            code::CONFLICT
        );
        assert_eq!(
            to_rpc_error(AppError::Config("disk full".into())).code(),
            code::INTERNAL_ERROR
        );
    }
}
