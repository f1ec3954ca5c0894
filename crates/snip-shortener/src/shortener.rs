use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use snip_core::{OwnerId, ShortCode, UrlRecord};
use tokio_util::sync::CancellationToken;

/// Result of a successful [`Shortener::shorten`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShortenOutcome {
    /// A new record was stored under this code.
    Created(ShortCode),
    /// The URL had already been shortened, possibly by another owner.
    AlreadyExists(ShortCode),
}

impl ShortenOutcome {
    pub fn code(&self) -> &ShortCode {
        match self {
            Self::Created(code) | Self::AlreadyExists(code) => code,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// One entry of a batch shorten request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    /// Caller-chosen id echoed back in the response.
    pub correlation_id: String,
    pub original_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub correlation_id: String,
    pub short_code: ShortCode,
}

#[async_trait]
pub trait Shortener: Send + Sync + 'static {
    /// Shortens `original_url` on behalf of `owner`.
    ///
    /// Shortening a URL that is already stored is not an error; it yields
    /// [`ShortenOutcome::AlreadyExists`] with the existing code.
    async fn shorten(&self, original_url: &str, owner: &OwnerId) -> Result<ShortenOutcome>;

    /// Shortens every URL in `requests`, returning one response per request
    /// in the same order.
    async fn shorten_batch(
        &self,
        requests: Vec<BatchRequest>,
        owner: &OwnerId,
    ) -> Result<Vec<BatchResponse>>;

    /// Returns the original URL stored under `code`.
    async fn resolve(&self, code: &ShortCode) -> Result<String>;

    /// Lists the active records created by `owner`.
    async fn user_urls(&self, owner: &OwnerId) -> Result<Vec<UrlRecord>>;

    /// Queues a soft-delete of `codes` owned by `owner` and returns as soon
    /// as the request is accepted.
    ///
    /// Cancelling the returned token before the worker picks the request up
    /// drops it.
    async fn delete_urls(&self, codes: Vec<ShortCode>, owner: &OwnerId)
        -> Result<CancellationToken>;

    /// Checks that the storage backend is reachable.
    async fn ping(&self) -> Result<()>;
}
