use crate::deleter::{DeletionQueue, DeletionTask, DeletionWorker, DEFAULT_QUEUE_CAPACITY};
use crate::error::{Result, ShortenerError};
use crate::shortener::{BatchRequest, BatchResponse, ShortenOutcome, Shortener};
use async_trait::async_trait;
use snip_core::owner::MAX_OWNER_ID_LEN;
use snip_core::{Deriver, OwnerId, Repository, Sha256Deriver, ShortCode, StorageError, UrlRecord};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A concrete implementation of the `Shortener` trait.
///
/// This service wraps a `Repository` and a `Deriver` to handle:
/// - URL and owner validation
/// - duplicate detection against the stored record
/// - handing soft-delete requests to the deletion worker
///
/// Codes are derived from the URL alone, so the same URL always maps to the
/// same code whoever submits it. The first owner keeps the record.
#[derive(Debug)]
pub struct ShortenerService<R, D = Sha256Deriver> {
    repository: Arc<R>,
    deriver: D,
    deletions: DeletionQueue,
}

impl<R: Repository> ShortenerService<R> {
    /// Creates a service using [`Sha256Deriver`] and spawns its deletion
    /// worker on the current runtime.
    pub fn with_worker(repository: Arc<R>) -> (Self, DeletionWorker) {
        let (deletions, worker) =
            DeletionWorker::spawn(Arc::clone(&repository), DEFAULT_QUEUE_CAPACITY);
        (Self::new(repository, Sha256Deriver, deletions), worker)
    }
}

impl<R: Repository, D: Deriver> ShortenerService<R, D> {
    pub fn new(repository: Arc<R>, deriver: D, deletions: DeletionQueue) -> Self {
        Self {
            repository,
            deriver,
            deletions,
        }
    }

    /// Validates that the URL has a valid format (has a scheme and host).
    fn validate_url(url: &str) -> Result<()> {
        if url.is_empty() {
            return Err(ShortenerError::InvalidUrl(
                "URL cannot be empty".to_string(),
            ));
        }

        let Some((scheme, rest)) = url.split_once("://") else {
            return Err(ShortenerError::InvalidUrl(format!(
                "URL must have a valid scheme and host: {url}"
            )));
        };
        if scheme.is_empty() || rest.is_empty() || rest.starts_with('/') {
            return Err(ShortenerError::InvalidUrl(format!(
                "URL must have a valid scheme and host: {url}"
            )));
        }

        let scheme = scheme.to_lowercase();
        if scheme != "http" && scheme != "https" {
            return Err(ShortenerError::InvalidUrl(format!(
                "URL scheme must be http or https: {scheme}"
            )));
        }

        Ok(())
    }

    fn validate_owner(owner: &OwnerId) -> Result<()> {
        if owner.is_empty() {
            return Err(ShortenerError::InvalidOwner(
                "owner id must not be empty".to_string(),
            ));
        }
        if owner.as_str().len() > MAX_OWNER_ID_LEN {
            return Err(ShortenerError::InvalidOwner(format!(
                "owner id must be at most {MAX_OWNER_ID_LEN} bytes, got {}",
                owner.as_str().len()
            )));
        }
        Ok(())
    }

    /// Decides what an existing record under `code` means for a request to
    /// shorten `original_url`.
    fn classify_existing(
        code: ShortCode,
        original_url: &str,
        existing: &UrlRecord,
    ) -> Result<ShortenOutcome> {
        if existing.deleted {
            return Err(ShortenerError::Gone(code));
        }
        if existing.original_url != original_url {
            warn!(code = %code, "derived short code collides with a different url");
            return Err(ShortenerError::CodeCollision(code));
        }
        Ok(ShortenOutcome::AlreadyExists(code))
    }
}

#[async_trait]
impl<R: Repository, D: Deriver> Shortener for ShortenerService<R, D> {
    async fn shorten(&self, original_url: &str, owner: &OwnerId) -> Result<ShortenOutcome> {
        Self::validate_url(original_url)?;
        Self::validate_owner(owner)?;

        let code = self.deriver.derive(original_url);

        if let Some(existing) = self.repository.read_by_id(&code).await? {
            return Self::classify_existing(code, original_url, &existing);
        }

        let record = UrlRecord::new(code.clone(), original_url, owner.clone());
        match self.repository.add(record).await {
            Ok(()) => {
                debug!(code = %code, owner = %owner, "shortened url");
                Ok(ShortenOutcome::Created(code))
            }
            // lost a race with a concurrent writer; report what is stored now
            Err(StorageError::AlreadyExists(_)) => {
                match self.repository.read_by_id(&code).await? {
                    Some(existing) => Self::classify_existing(code, original_url, &existing),
                    None => Ok(ShortenOutcome::AlreadyExists(code)),
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn shorten_batch(
        &self,
        requests: Vec<BatchRequest>,
        owner: &OwnerId,
    ) -> Result<Vec<BatchResponse>> {
        Self::validate_owner(owner)?;
        for request in &requests {
            Self::validate_url(&request.original_url)?;
        }

        // unique codes in request order, with the index of their url
        let mut unique: Vec<(ShortCode, String)> = Vec::new();
        let mut positions: HashMap<ShortCode, usize> = HashMap::new();
        let mut responses = Vec::with_capacity(requests.len());

        for request in requests {
            let code = self.deriver.derive(&request.original_url);
            match positions.get(&code) {
                Some(&index) if unique[index].1 != request.original_url => {
                    warn!(code = %code, "batch urls collide on one short code");
                    return Err(ShortenerError::CodeCollision(code));
                }
                Some(_) => {}
                None => {
                    positions.insert(code.clone(), unique.len());
                    unique.push((code.clone(), request.original_url));
                }
            }
            responses.push(BatchResponse {
                correlation_id: request.correlation_id,
                short_code: code,
            });
        }

        let mut records = Vec::with_capacity(unique.len());
        for (code, original_url) in unique {
            match self.repository.read_by_id(&code).await? {
                // same url already stored; nothing to insert
                Some(existing) => {
                    Self::classify_existing(code, &original_url, &existing)?;
                }
                None => records.push(UrlRecord::new(code, original_url, owner.clone())),
            }
        }

        let stored = records.len();
        self.repository.add_batch(records).await?;
        info!(owner = %owner, requested = responses.len(), stored, "shortened url batch");

        Ok(responses)
    }

    async fn resolve(&self, code: &ShortCode) -> Result<String> {
        match self.repository.read_by_id(code).await? {
            None => Err(ShortenerError::NotFound(code.clone())),
            Some(record) if record.deleted => Err(ShortenerError::Gone(code.clone())),
            Some(record) => Ok(record.original_url),
        }
    }

    async fn user_urls(&self, owner: &OwnerId) -> Result<Vec<UrlRecord>> {
        Self::validate_owner(owner)?;
        Ok(self.repository.get_user_urls(owner).await?)
    }

    async fn delete_urls(
        &self,
        codes: Vec<ShortCode>,
        owner: &OwnerId,
    ) -> Result<CancellationToken> {
        Self::validate_owner(owner)?;

        let task = DeletionTask::new(codes, owner.clone());
        let cancel = task.cancel.clone();
        let count = task.codes.len();
        if count > 0 {
            self.deletions.submit(task)?;
            debug!(owner = %owner, count, "deletion accepted");
        }

        Ok(cancel)
    }

    async fn ping(&self) -> Result<()> {
        Ok(self.repository.ping().await?)
    }
}
