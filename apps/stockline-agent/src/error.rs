//! # Agent Error Type
//!
//! What a failed command prints, and which exit code it leaves behind.
//!
//! ```text
//! SyncError::Validation        ──► VALIDATION_ERROR  exit 2
//! SyncError::RemoteRejected    ──► REMOTE_ERROR      exit 3
//! SyncError::MalformedResponse ──► REMOTE_ERROR      exit 3
//! SyncError::TransportFailure  ──► NETWORK_ERROR     exit 4
//! SyncError::LocalIoFailure    ──► STORAGE_ERROR     exit 5
//! config variants              ──► CONFIG_ERROR      exit 6
//! anything else                ──► INTERNAL          exit 1
//! ```
//!
//! With `--json` the error goes to stdout as
//! `{ "code": "REMOTE_ERROR", "message": "Server error" }`.

use serde::Serialize;
use thiserror::Error;

use stockline_db::DbError;
use stockline_sync::SyncError;

/// Error returned by every command.
#[derive(Debug, Clone, Error, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("{message}")]
pub struct ApiError {
    /// Machine-readable error code
    pub code: ErrorCode,

    /// Human-readable message, shown as is
    pub message: String,
}

/// Error codes for command failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    RemoteError,
    NetworkError,
    StorageError,
    ConfigError,
    Internal,
}

impl ErrorCode {
    /// Process exit code for this error.
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorCode::Internal => 1,
            ErrorCode::ValidationError => 2,
            ErrorCode::RemoteError => 3,
            ErrorCode::NetworkError => 4,
            ErrorCode::StorageError => 5,
            ErrorCode::ConfigError => 6,
        }
    }
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        let code = match &err {
            SyncError::Validation(_) => ErrorCode::ValidationError,
            SyncError::RemoteRejected { .. } | SyncError::MalformedResponse(_) => ErrorCode::RemoteError,
            SyncError::TransportFailure(_) => ErrorCode::NetworkError,
            SyncError::LocalIoFailure(_) => ErrorCode::StorageError,
            e if e.is_config_error() => ErrorCode::ConfigError,
            _ => ErrorCode::Internal,
        };
        ApiError::new(code, err.to_string())
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        tracing::error!("Database error: {}", err);
        ApiError::new(ErrorCode::StorageError, err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::internal(format!("Could not encode output: {err}"))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_error_codes() {
        assert_eq!(
            ApiError::from(SyncError::rejected("Server error")).code,
            ErrorCode::RemoteError
        );
        assert_eq!(
            ApiError::from(SyncError::TransportFailure("timed out".into())).code,
            ErrorCode::NetworkError
        );
        assert_eq!(
            ApiError::from(SyncError::InvalidConfig("bad".into())).code,
            ErrorCode::ConfigError
        );
    }

    #[test]
    fn test_message_is_preserved() {
        let err = ApiError::from(SyncError::rejected("Server error"));
        assert_eq!(err.to_string(), "Server error");
    }

    #[test]
    fn test_serializes_screaming_code() {
        let err = ApiError::new(ErrorCode::NetworkError, "Network error: timed out");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "NETWORK_ERROR");
        assert_eq!(json["message"], "Network error: timed out");
    }
}
