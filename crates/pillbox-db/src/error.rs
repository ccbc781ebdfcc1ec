//! # Database Error Types
//!
//! Error types for database operations and repository requests.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)        ValidationError (pillbox-core)      │
//! │       │                                   │                             │
//! │       ▼                                   │                             │
//! │  DbError ← Adds categorization            │                             │
//! │       │                                   │                             │
//! │       ▼                                   ▼                             │
//! │  RepositoryError (this module) ← Terminal outcome of one request       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Ticket resolves ──► presentation layer shows `to_string()`            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use pillbox_core::ValidationError;
use thiserror::Error;

/// Database operation errors.
///
/// These errors wrap sqlx errors and provide additional context
/// for debugging and user feedback.
#[derive(Debug, Clone, Error)]
pub enum DbError {
    /// Entity not found in database.
    ///
    /// ## When This Occurs
    /// - `fetch_one` returns no rows
    /// - An update or delete touched zero rows
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Creating a second user with the same username
    /// - `field` is `<table>.<column>` as SQLite reports it
    #[error("{field} already exists")]
    UniqueViolation { field: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - Diary entry for a user that does not exist
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file doesn't exist and can't be created
    /// - File permissions issue
    /// - Pool already closed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    ///
    /// ## When This Occurs
    /// - Invalid SQL in migration
    /// - Database was migrated by a newer build
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite constraint messages:
                // "UNIQUE constraint failed: <table>.<column>"
                // "FOREIGN KEY constraint failed"
                if let Some(field) = msg.strip_prefix("UNIQUE constraint failed: ") {
                    DbError::UniqueViolation {
                        field: field.to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Config Error
// =============================================================================

/// Application configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value is out of range.
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// Failed to read or parse the config file.
    #[error("Failed to load config: {0}")]
    LoadFailed(String),

    /// Failed to write the config file.
    #[error("Failed to save config: {0}")]
    SaveFailed(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::LoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::LoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(err: toml::ser::Error) -> Self {
        ConfigError::SaveFailed(err.to_string())
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Repository Error
// =============================================================================

/// The store operation a failed request was performing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Save,
    Update,
    Delete,
    Read,
}

impl std::fmt::Display for StoreOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            StoreOp::Save => "save",
            StoreOp::Update => "update",
            StoreOp::Delete => "delete",
            StoreOp::Read => "read",
        })
    }
}

/// Why a repository request did not succeed.
///
/// Every ticket handed out by a repository resolves with either its success
/// value or exactly one of these.
///
/// ## Variants by Origin
/// ```text
/// before any I/O      Validation
/// store said "0 rows" NotFound
/// store raised        Store { op, source }   "database save failed: ..."
/// ownership check     PermissionDenied
/// inventory check     OutOfStock
/// worker pool         ShutDown (after cleanup), Aborted (task died)
/// ```
#[derive(Debug, Clone, Error)]
pub enum RepositoryError {
    /// The candidate record broke a rule; nothing was written.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// The targeted row does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    /// The store raised an error while performing `op`.
    #[error("database {op} failed: {source}")]
    Store {
        op: StoreOp,
        #[source]
        source: DbError,
    },

    /// The acting user does not own the targeted row.
    #[error("user {user_id} may not modify {entity} {id}")]
    PermissionDenied {
        entity: &'static str,
        id: i64,
        user_id: i64,
    },

    /// A dose was requested from an empty medication.
    #[error("{name} is out of stock")]
    OutOfStock { name: String },

    /// The repository was cleaned up before this request could start.
    #[error("repository has been shut down")]
    ShutDown,

    /// The worker running this request stopped without producing a result.
    #[error("request aborted before completion")]
    Aborted,
}

impl RepositoryError {
    /// Wraps a store failure for the given operation.
    pub fn store(op: StoreOp, source: impl Into<DbError>) -> Self {
        RepositoryError::Store {
            op,
            source: source.into(),
        }
    }

    /// Returns true for a row-not-found outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RepositoryError::NotFound { .. })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_message_names_operation() {
        let err = RepositoryError::store(StoreOp::Save, DbError::QueryFailed("disk I/O error".into()));
        assert_eq!(
            err.to_string(),
            "database save failed: Query failed: disk I/O error"
        );
    }

    #[test]
    fn test_validation_message_is_passed_through() {
        let err: RepositoryError = ValidationError::Required {
            field: "name".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "name is required");
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: DbError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, DbError::NotFound { .. }));
        assert!(matches!(
            DbError::from(sqlx::Error::PoolTimedOut),
            DbError::PoolExhausted
        ));
    }
}
