//! Error types for the ORM.

use tabula_sql::IdentError;
use thiserror::Error;

/// ORM-specific errors.
#[derive(Debug, Error)]
pub enum OrmError {
    /// Database error from sqlx, passed through unchanged.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The store accepted a write but reported nothing written.
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// A `..._or_die` lookup found nothing and the request was aborted.
    #[error("request aborted: {0}")]
    Aborted(String),

    /// A table or column name outside the permitted character set.
    #[error(transparent)]
    UnsafeIdentifier(#[from] IdentError),

    /// An operator string that is not part of the supported set.
    #[error("invalid operator: {0}")]
    InvalidOperator(String),

    /// A formatter name with no registry entry.
    #[error("unknown formatter: {0}")]
    UnknownFormatter(String),

    /// An UPDATE with nothing to set.
    #[error("update requires at least one field")]
    EmptyPayload,

    /// A record operation that needs an identifier ran before one was set.
    #[error("record has not been persisted")]
    NotPersisted,

    /// JSON encoding or decoding error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Failure to build the runtime that drives the store.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for ORM operations.
pub type Result<T> = std::result::Result<T, OrmError>;
