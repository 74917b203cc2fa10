//! # Database Error Types
//!
//! Error types for local store operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │                                                                 │
//! │       ├── ConstraintViolation / NotFound → surfaced to the caller      │
//! │       └── everything else                → storage failure              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SyncError (catalog-sync) ← Counted or surfaced by the sync engine     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use catalog_core::ValidationError;
use thiserror::Error;

/// Local store errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    ///
    /// ## When This Occurs
    /// - Updating or deleting a product id that does not exist
    /// - Marking a change id that does not exist as synced
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Saving a product whose barcode belongs to a different product
    #[error("Duplicate {field}: '{value}' already exists")]
    ConstraintViolation { field: String, value: String },

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file can't be created
    /// - File permissions issue
    /// - Disk full
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// A stored row could not be decoded (bad JSON payload, bad timestamp).
    #[error("Corrupt row in {table}: {message}")]
    Corrupt { table: String, message: String },

    /// The record failed field validation before being written.
    #[error(transparent)]
    Validation(#[from] ValidationError),

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

    /// Creates a ConstraintViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::ConstraintViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Creates a Corrupt error.
    pub fn corrupt(table: impl Into<String>, message: impl ToString) -> Self {
        DbError::Corrupt {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// True for failures of the persistence layer itself, as opposed to
    /// caller mistakes (`NotFound`, `ConstraintViolation`, `Validation`).
    pub fn is_storage_failure(&self) -> bool {
        !matches!(
            self,
            DbError::NotFound { .. } | DbError::ConstraintViolation { .. } | DbError::Validation(_)
        )
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → UNIQUE → ConstraintViolation, else QueryFailed
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// sqlx::Error::PoolClosed     → DbError::ConnectionFailed
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // "UNIQUE constraint failed: products.barcode"
                if let Some(field) = msg.strip_prefix("UNIQUE constraint failed: ") {
                    DbError::ConstraintViolation {
                        field: field.to_string(),
                        value: "unknown".to_string(),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(!DbError::not_found("Product", 5).is_storage_failure());
        assert!(!DbError::duplicate("barcode", "B1").is_storage_failure());
        assert!(!DbError::from(ValidationError::required("name")).is_storage_failure());
        assert!(DbError::PoolExhausted.is_storage_failure());
        assert!(DbError::QueryFailed("disk I/O error".into()).is_storage_failure());
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            DbError::not_found("PendingChange", 42).to_string(),
            "PendingChange not found: 42"
        );
        assert_eq!(
            DbError::duplicate("barcode", "B1").to_string(),
            "Duplicate barcode: 'B1' already exists"
        );
    }
}
