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
//! │  │  Configuration  │  │   Transport     │  │     Local store         │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Connection     │  │  ConstraintViolation    │ │
//! │  │  InvalidUrl     │  │  Timeout        │  │  NotFound               │ │
//! │  │  ConfigLoad/Save│  │  RemoteStatus   │  │  Validation             │ │
//! │  │                 │  │  RemoteNotFound │  │  Storage                │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  Caller mistakes (ConstraintViolation, NotFound, Validation) are       │
//! │  surfaced and never retried. Transport failures are counted toward     │
//! │  the reset threshold. Storage failures are surfaced, not retried.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use catalog_core::ValidationError;
use catalog_db::DbError;
use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering every failure the catalog layer can report.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid API URL.
    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// The API could not be reached.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The API did not answer in time.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// The API answered with an error status.
    #[error("API returned {status}: {message}")]
    RemoteStatus { status: u16, message: String },

    /// The API has no such record (HTTP 404).
    #[error("Not found on server: {0}")]
    RemoteNotFound(String),

    /// The API answered with a body we could not read.
    #[error("Invalid response: {0}")]
    Deserialization(String),

    // =========================================================================
    // Local Store Errors
    // =========================================================================
    /// A different product already uses this barcode.
    #[error("Duplicate {field}: '{value}' already exists")]
    ConstraintViolation { field: String, value: String },

    /// No such local record.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Input rejected by field validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The local persistence layer failed.
    #[error("Storage failure: {0}")]
    Storage(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// The sync engine is shutting down.
    #[error("Sync engine is shutting down")]
    ShuttingDown,

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<DbError> for SyncError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::ConstraintViolation { field, value } => {
                SyncError::ConstraintViolation { field, value }
            }
            DbError::NotFound { entity, id } => SyncError::NotFound { entity, id },
            DbError::Validation(e) => SyncError::Validation(e),
            other => SyncError::Storage(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SyncError::Timeout(0)
        } else if err.is_decode() {
            SyncError::Deserialization(err.to_string())
        } else if let Some(status) = err.status() {
            SyncError::RemoteStatus {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            SyncError::Connection(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Deserialization(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// True when the remote could not be reached or did not behave.
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            SyncError::Connection(_)
                | SyncError::Timeout(_)
                | SyncError::RemoteStatus { .. }
                | SyncError::Deserialization(_)
        )
    }

    /// True for local persistence failures.
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, SyncError::Storage(_))
    }
}
