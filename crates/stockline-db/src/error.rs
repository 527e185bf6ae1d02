//! # Database Error Types
//!
//! Error types for local store operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error / MigrateError)                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SyncError::LocalIoFailure (stockline-sync)                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  UI displays error.to_string()                                         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::migrate::MigrateError;
use thiserror::Error;

/// Local store errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file can't be created
    /// - File permissions issue
    /// - Disk full
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed for a reason other than schema incompatibility.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// The applied migrations don't match the embedded ones.
    ///
    /// ## When This Occurs
    /// - An older binary opens a database written by a newer one
    /// - An embedded migration was edited after being applied
    ///
    /// `Database::new` recreates the file instead of returning this when
    /// `recreate_on_incompatible` is set.
    #[error("Incompatible schema: {0}")]
    IncompatibleSchema(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Filesystem error while managing the database file.
    #[error("Database file error: {0}")]
    Io(String),

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// True when the error means the schema on disk can't be migrated.
    pub fn is_incompatible_schema(&self) -> bool {
        matches!(self, DbError::IncompatibleSchema(_))
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → UniqueViolation or QueryFailed
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // "UNIQUE constraint failed: <table>.<column>"
                if let Some(field) = msg.strip_prefix("UNIQUE constraint failed: ") {
                    DbError::UniqueViolation {
                        field: field.to_string(),
                        value: "unknown".to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            sqlx::Error::Migrate(migrate_err) => DbError::from(*migrate_err),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

/// Migration errors split into "schema incompatible" and everything else.
impl From<MigrateError> for DbError {
    fn from(err: MigrateError) -> Self {
        match err {
            MigrateError::VersionMissing(_) | MigrateError::VersionMismatch(_) => {
                DbError::IncompatibleSchema(err.to_string())
            }
            _ => DbError::MigrationFailed(err.to_string()),
        }
    }
}

impl From<std::io::Error> for DbError {
    fn from(err: std::io::Error) -> Self {
        DbError::Io(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrate_errors_classified() {
        let err: DbError = MigrateError::VersionMissing(2).into();
        assert!(err.is_incompatible_schema());

        let err: DbError = MigrateError::VersionMismatch(1).into();
        assert!(err.is_incompatible_schema());

        let err: DbError = MigrateError::Dirty(1).into();
        assert!(!err.is_incompatible_schema());
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: DbError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
