//! # Sync Error Types
//!
//! Error types for sync operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │     Remote      │  │        Local            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  RemoteRejected │  │  LocalIoFailure         │ │
//! │  │  InvalidUrl     │  │  Transport-     │  │  Validation             │ │
//! │  │  ConfigLoad/    │  │    Failure      │  │                         │ │
//! │  │    SaveFailed   │  │  Malformed-     │  │                         │ │
//! │  │                 │  │    Response     │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  UnexpectedFailure: catch-all, handled like a remote failure           │
//! │                                                                         │
//! │  Going offline is NOT an error: add_product returns                    │
//! │  AddOutcome::Queued instead.                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use stockline_core::{CoreError, ValidationError};

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Everything `add_product`, `drain_pending` and friends can fail with.
///
/// The UI only ever shows `to_string()`, so each message is written for a
/// person, not a log.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Remote Errors
    // =========================================================================
    /// The server answered with a non-2xx status, or a 2xx that says
    /// `success: false`. Carries the server's message.
    #[error("{message}")]
    RemoteRejected { message: String },

    /// Network unreachable, connection reset, timeout.
    #[error("Network error: {0}")]
    TransportFailure(String),

    /// The server answered but the body couldn't be understood.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    // =========================================================================
    // Local Errors
    // =========================================================================
    /// Database or image file failure.
    #[error("Local storage error: {0}")]
    LocalIoFailure(String),

    /// The request failed validation. Nothing was written or sent.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid sync configuration.
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),

    /// Invalid base URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Anything else. Treated exactly like a remote failure.
    #[error("Unexpected error: {0}")]
    UnexpectedFailure(String),

    /// The background trigger has been stopped.
    #[error("Background trigger is shutting down")]
    ShuttingDown,
}

impl SyncError {
    /// Builds a `RemoteRejected` error.
    pub fn rejected(message: impl Into<String>) -> Self {
        SyncError::RemoteRejected {
            message: message.into(),
        }
    }
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<stockline_db::DbError> for SyncError {
    fn from(err: stockline_db::DbError) -> Self {
        SyncError::LocalIoFailure(err.to_string())
    }
}

impl From<CoreError> for SyncError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(v) => SyncError::Validation(v),
            other => SyncError::LocalIoFailure(other.to_string()),
        }
    }
}

/// reqwest errors split into "couldn't talk" and "couldn't understand".
impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SyncError::MalformedResponse(err.to_string())
        } else if err.is_builder() {
            SyncError::InvalidUrl(err.to_string())
        } else {
            SyncError::TransportFailure(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::MalformedResponse(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::LocalIoFailure(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// Returns true for transport-level failures that may succeed later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::TransportFailure(_))
    }

    /// Returns true if the remote side was involved in the failure.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            SyncError::RemoteRejected { .. }
                | SyncError::TransportFailure(_)
                | SyncError::MalformedResponse(_)
        )
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(SyncError::TransportFailure("connection reset".into()).is_retryable());

        assert!(!SyncError::rejected("Server error").is_retryable());
        assert!(!SyncError::MalformedResponse("eof".into()).is_retryable());
        assert!(!SyncError::InvalidConfig("bad".into()).is_retryable());
    }

    #[test]
    fn test_rejected_displays_server_message() {
        assert_eq!(SyncError::rejected("Server error").to_string(), "Server error");
    }

    #[test]
    fn test_categories() {
        assert!(SyncError::MalformedResponse("x".into()).is_remote());
        assert!(!SyncError::LocalIoFailure("disk".into()).is_remote());
        assert!(SyncError::InvalidUrl("x".into()).is_config_error());
    }

    #[test]
    fn test_validation_passes_through_core_error() {
        let core: CoreError = ValidationError::Negative {
            field: "price".into(),
        }
        .into();
        let err: SyncError = core.into();
        assert!(matches!(err, SyncError::Validation(_)));
        assert_eq!(err.to_string(), "price must not be negative");
    }

    #[test]
    fn test_db_error_is_local_io() {
        let err: SyncError = stockline_db::DbError::PoolExhausted.into();
        assert!(matches!(err, SyncError::LocalIoFailure(_)));
    }
}
