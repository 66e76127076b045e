//! Error types for host storage APIs.

use thiserror::Error;

/// Result type for host operations.
pub type HostResult<T> = Result<T, HostError>;

/// Errors raised by a host storage API.
///
/// The variants mirror the exception names a browser host raises, so that
/// callers can tell a full quota from a blocked area or a version clash.
/// Errors are `Clone` so one failure can be handed to several waiters.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HostError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),

    /// The storage area is full.
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// The host refused access (for example, private browsing).
    #[error("security error: {0}")]
    SecurityError(String),

    /// A database was opened with a version that conflicts with the stored one.
    #[error("version error: {0}")]
    VersionError(String),

    /// A named database or object store does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The host API is unusable (closed or failed to open).
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A SQL statement failed.
    #[error("SQL error: {0}")]
    Sql(String),

    /// Stored data could not be parsed.
    #[error("storage corrupted: {0}")]
    Corrupted(String),
}

impl From<std::io::Error> for HostError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<rusqlite::Error> for HostError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Sql(err.to_string())
    }
}
