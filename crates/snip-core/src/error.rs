use crate::shortcode::ShortCode;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum CoreError {
    #[error("invalid short code: {0}")]
    InvalidShortCode(String),
}

/// Errors returned by every [`Repository`][crate::Repository] implementation.
///
/// A lookup miss is not an error: `read_by_id` returns `Ok(None)`.
/// `Unavailable` and `Timeout` describe a backend that cannot be reached and
/// are never retried inside the storage layer.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("short code already exists: {0}")]
    AlreadyExists(ShortCode),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("corrupt record on line {line}: {reason}")]
    CorruptRecord { line: usize, reason: String },
}

impl StorageError {
    /// Returns `true` if the backing store could not be reached.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_))
    }
}
