use snip_core::{CoreError, ShortCode, StorageError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ShortenerError>;

#[derive(Debug, Clone, Error)]
pub enum ShortenerError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("invalid short code: {0}")]
    InvalidShortCode(String),
    #[error("invalid owner id: {0}")]
    InvalidOwner(String),
    #[error("short code not found: {0}")]
    NotFound(ShortCode),
    #[error("short code was deleted: {0}")]
    Gone(ShortCode),
    /// The derived code is already taken by a different URL.
    #[error("short code {0} is already used by another url")]
    CodeCollision(ShortCode),
    #[error("deletion queue is full")]
    DeletionQueueFull,
    #[error("deletion worker has stopped")]
    DeletionQueueClosed,
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<CoreError> for ShortenerError {
    fn from(value: CoreError) -> Self {
        match value {
            CoreError::InvalidShortCode(message) => Self::InvalidShortCode(message),
        }
    }
}
