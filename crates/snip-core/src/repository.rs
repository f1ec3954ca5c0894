use crate::error::StorageError;
use crate::owner::OwnerId;
use crate::shortcode::ShortCode;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// A stored URL record in the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    /// The short code derived from `original_url`.
    pub short_code: ShortCode,
    /// The original URL that was shortened.
    pub original_url: String,
    /// The client that created the record.
    pub owner_id: OwnerId,
    /// Soft-delete flag. Only ever moves from `false` to `true`.
    pub deleted: bool,
}

impl UrlRecord {
    /// Creates a new active record.
    pub fn new(short_code: ShortCode, original_url: impl Into<String>, owner_id: OwnerId) -> Self {
        Self {
            short_code,
            original_url: original_url.into(),
            owner_id,
            deleted: false,
        }
    }
}

/// A read-only view of a repository.
#[async_trait]
pub trait ReadRepository: Send + Sync + 'static {
    /// Retrieves the record stored under `code`, tombstones included.
    /// Returns `None` if the code does not exist.
    ///
    /// Callers must check [`UrlRecord::deleted`] before redirecting.
    async fn read_by_id(&self, code: &ShortCode) -> Result<Option<UrlRecord>>;

    /// Returns the active (not deleted) records created by `owner`.
    async fn get_user_urls(&self, owner: &OwnerId) -> Result<Vec<UrlRecord>>;

    /// Checks that the backing store is reachable.
    async fn ping(&self) -> Result<()>;
}

#[async_trait]
pub trait Repository: ReadRepository {
    /// Inserts a new record.
    ///
    /// Returns `Err(AlreadyExists)` if the code is already stored, including
    /// as a tombstone: deleted codes are never reactivated.
    async fn add(&self, record: UrlRecord) -> Result<()>;

    /// Inserts several records.
    ///
    /// Atomicity is backend specific: relational backends apply the whole
    /// batch or nothing, the in-memory backend applies each record on its own
    /// and skips records whose code already exists.
    async fn add_batch(&self, records: Vec<UrlRecord>) -> Result<()>;

    /// Marks the records in `codes` owned by `owner` as deleted.
    /// Codes that don't exist or belong to someone else are ignored.
    async fn delete_batch(&self, codes: &[ShortCode], owner: &OwnerId) -> Result<()>;

    /// Releases backend resources. Calling it more than once is fine.
    async fn close(&self) -> Result<()>;
}
