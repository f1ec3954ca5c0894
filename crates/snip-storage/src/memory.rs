use crate::log::RecordLog;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use snip_core::repository::Result;
use snip_core::{OwnerId, ReadRepository, Repository, ShortCode, StorageError, UrlRecord};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

/// In-memory implementation of the repository contract using DashMap,
/// optionally made durable by a [`RecordLog`].
///
/// Durability is best-effort: a failed log append is logged and the
/// operation still succeeds.
#[derive(Debug)]
pub struct InMemoryRepository {
    records: DashMap<ShortCode, UrlRecord>,
    log: Mutex<Option<RecordLog>>,
    closed: AtomicBool,
}

impl InMemoryRepository {
    /// Creates a new in-memory repository without a backing log.
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            log: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Opens a durable repository backed by the log at `path`.
    ///
    /// The log is created if absent, then replayed front to back. A later
    /// line for the same code overwrites the earlier one, except that a
    /// tombstone is never undone. Replayed records are not written back.
    pub fn open(path: &Path) -> Result<Self> {
        let log = RecordLog::open(path)?;
        let records = DashMap::new();

        let stats = RecordLog::replay(path, |record| apply_replayed(&records, record))?;
        info!(
            path = %path.display(),
            applied = stats.applied,
            skipped = stats.skipped,
            records = records.len(),
            "replayed record log"
        );

        Ok(Self {
            records,
            log: Mutex::new(Some(log)),
            closed: AtomicBool::new(false),
        })
    }

    /// Returns the number of stored records, tombstones included.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn ensure_open(&self, operation: &str) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::Unavailable(format!(
                "{operation}: repository is closed"
            )));
        }
        Ok(())
    }

    /// Check-and-insert under the entry lock, then write through to the log.
    fn insert(&self, record: UrlRecord) -> Result<()> {
        match self.records.entry(record.short_code.clone()) {
            Entry::Occupied(_) => return Err(StorageError::AlreadyExists(record.short_code)),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
            }
        }

        self.persist(&record);
        Ok(())
    }

    fn persist(&self, record: &UrlRecord) {
        let mut guard = self.log.lock();
        let Some(log) = guard.as_mut() else {
            return;
        };

        if let Err(err) = log.append(record) {
            error!(
                code = %record.short_code,
                error = %err,
                "failed to append to record log, change is not durable"
            );
        }
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_replayed(records: &DashMap<ShortCode, UrlRecord>, record: UrlRecord) {
    match records.entry(record.short_code.clone()) {
        Entry::Occupied(mut slot) => {
            let deleted = slot.get().deleted || record.deleted;
            *slot.get_mut() = UrlRecord { deleted, ..record };
        }
        Entry::Vacant(slot) => {
            slot.insert(record);
        }
    }
}

#[async_trait]
impl ReadRepository for InMemoryRepository {
    async fn read_by_id(&self, code: &ShortCode) -> Result<Option<UrlRecord>> {
        self.ensure_open("read_by_id")?;
        Ok(self.records.get(code).map(|entry| entry.value().clone()))
    }

    async fn get_user_urls(&self, owner: &OwnerId) -> Result<Vec<UrlRecord>> {
        self.ensure_open("get_user_urls")?;
        Ok(self
            .records
            .iter()
            .filter(|entry| entry.owner_id == *owner && !entry.deleted)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        self.ensure_open("ping")
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn add(&self, record: UrlRecord) -> Result<()> {
        self.ensure_open("add")?;
        self.insert(record)
    }

    async fn add_batch(&self, records: Vec<UrlRecord>) -> Result<()> {
        self.ensure_open("add_batch")?;

        let total = records.len();
        let mut skipped = 0;
        for record in records {
            match self.insert(record) {
                Ok(()) => {}
                Err(StorageError::AlreadyExists(code)) => {
                    warn!(code = %code, "batch record already exists, skipping");
                    skipped += 1;
                }
                Err(err) => return Err(err),
            }
        }

        debug!(total, skipped, "applied record batch");
        Ok(())
    }

    async fn delete_batch(&self, codes: &[ShortCode], owner: &OwnerId) -> Result<()> {
        self.ensure_open("delete_batch")?;

        let mut tombstones = Vec::new();
        for code in codes {
            let Some(mut entry) = self.records.get_mut(code) else {
                continue;
            };
            if entry.owner_id != *owner || entry.deleted {
                continue;
            }
            entry.deleted = true;
            tombstones.push(entry.value().clone());
        }

        for tombstone in &tombstones {
            self.persist(tombstone);
        }

        debug!(
            owner = %owner,
            requested = codes.len(),
            deleted = tombstones.len(),
            "soft-deleted records"
        );
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.log.lock().take();
            debug!("closed in-memory repository");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snip_core::{Deriver, Sha256Deriver};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn code(s: &str) -> ShortCode {
        ShortCode::new_unchecked(s)
    }

    fn owner(s: &str) -> OwnerId {
        OwnerId::new(s)
    }

    fn record(url: &str, owner_id: &str) -> UrlRecord {
        UrlRecord::new(Sha256Deriver.derive(url), url, owner(owner_id))
    }

    #[tokio::test]
    async fn add_and_read() {
        let repo = InMemoryRepository::new();

        repo.add(UrlRecord::new(
            code("QrPnX5IU"),
            "https://practicum.yandex.ru/",
            owner("alice"),
        ))
        .await
        .unwrap();

        let got = repo.read_by_id(&code("QrPnX5IU")).await.unwrap().unwrap();
        assert_eq!(got.original_url, "https://practicum.yandex.ru/");
        assert!(!got.deleted);
    }

    #[tokio::test]
    async fn read_nonexistent() {
        let repo = InMemoryRepository::new();
        assert!(repo.read_by_id(&code("nope0000")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn second_owner_gets_already_exists() {
        let repo = InMemoryRepository::new();

        repo.add(record("https://practicum.yandex.ru/", "alice"))
            .await
            .unwrap();
        let err = repo
            .add(record("https://practicum.yandex.ru/", "bob"))
            .await
            .unwrap_err();

        match err {
            StorageError::AlreadyExists(existing) => assert_eq!(existing.as_str(), "QrPnX5IU"),
            other => panic!("unexpected error: {other:?}"),
        }

        let stored = repo.read_by_id(&code("QrPnX5IU")).await.unwrap().unwrap();
        assert_eq!(stored.owner_id, owner("alice"));
    }

    #[tokio::test]
    async fn add_batch_skips_existing_records() {
        let repo = InMemoryRepository::new();
        repo.add(record("https://b.example", "alice")).await.unwrap();

        repo.add_batch(vec![
            record("https://a.example", "bob"),
            record("https://b.example", "bob"),
            record("https://c.example", "bob"),
        ])
        .await
        .unwrap();

        assert_eq!(repo.len(), 3);
        let b = repo
            .read_by_id(&Sha256Deriver.derive("https://b.example"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(b.owner_id, owner("alice"));
    }

    #[tokio::test]
    async fn delete_batch_is_owner_scoped() {
        let repo = InMemoryRepository::new();
        let mine = record("https://mine.example", "alice");
        let theirs = record("https://theirs.example", "bob");
        repo.add(mine.clone()).await.unwrap();
        repo.add(theirs.clone()).await.unwrap();

        repo.delete_batch(
            &[
                mine.short_code.clone(),
                theirs.short_code.clone(),
                code("missing0"),
            ],
            &owner("alice"),
        )
        .await
        .unwrap();

        let mine = repo.read_by_id(&mine.short_code).await.unwrap().unwrap();
        let theirs = repo.read_by_id(&theirs.short_code).await.unwrap().unwrap();
        assert!(mine.deleted);
        assert!(!theirs.deleted);
    }

    #[tokio::test]
    async fn tombstone_is_not_resurrected() {
        let repo = InMemoryRepository::new();
        let rec = record("https://example.com", "alice");
        repo.add(rec.clone()).await.unwrap();
        repo.delete_batch(&[rec.short_code.clone()], &owner("alice"))
            .await
            .unwrap();

        let err = repo.add(rec.clone()).await.unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists(_)));

        let stored = repo.read_by_id(&rec.short_code).await.unwrap().unwrap();
        assert!(stored.deleted);
    }

    #[tokio::test]
    async fn user_urls_exclude_deleted_and_foreign_records() {
        let repo = InMemoryRepository::new();
        let kept = record("https://kept.example", "alice");
        let gone = record("https://gone.example", "alice");
        repo.add(kept.clone()).await.unwrap();
        repo.add(gone.clone()).await.unwrap();
        repo.add(record("https://other.example", "bob"))
            .await
            .unwrap();
        repo.delete_batch(&[gone.short_code], &owner("alice"))
            .await
            .unwrap();

        let urls = repo.get_user_urls(&owner("alice")).await.unwrap();
        assert_eq!(urls, vec![kept]);
        assert!(repo.get_user_urls(&owner("carol")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reopen_replays_log() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("urls.json");

        let urls: Vec<String> = (0..5).map(|i| format!("https://example{i}.com")).collect();
        {
            let repo = InMemoryRepository::open(&path).unwrap();
            for url in &urls {
                repo.add(record(url, "alice")).await.unwrap();
            }
            repo.delete_batch(&[Sha256Deriver.derive(&urls[0])], &owner("alice"))
                .await
                .unwrap();
            repo.close().await.unwrap();
        }

        let reopened = InMemoryRepository::open(&path).unwrap();
        assert_eq!(reopened.len(), urls.len());
        for url in &urls {
            let got = reopened
                .read_by_id(&Sha256Deriver.derive(url))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(&got.original_url, url);
            assert_eq!(got.owner_id, owner("alice"));
        }

        let first = reopened
            .read_by_id(&Sha256Deriver.derive(&urls[0]))
            .await
            .unwrap()
            .unwrap();
        assert!(first.deleted);
    }

    #[tokio::test]
    async fn replay_does_not_append_to_log() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("urls.json");
        {
            let repo = InMemoryRepository::open(&path).unwrap();
            repo.add(record("https://example.com", "alice"))
                .await
                .unwrap();
        }
        let before = std::fs::read_to_string(&path).unwrap();

        let _reopened = InMemoryRepository::open(&path).unwrap();
        let after = std::fs::read_to_string(&path).unwrap();
        assert_eq!(before, after);
        assert_eq!(after.lines().count(), 1);
    }

    #[tokio::test]
    async fn replay_keeps_tombstones_sticky() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("urls.json");
        let rec = record("https://example.com", "alice");
        let mut tombstone = rec.clone();
        tombstone.deleted = true;

        let mut log = RecordLog::open(&path).unwrap();
        log.append(&rec).unwrap();
        log.append(&tombstone).unwrap();
        log.append(&rec).unwrap();
        drop(log);

        let repo = InMemoryRepository::open(&path).unwrap();
        let got = repo.read_by_id(&rec.short_code).await.unwrap().unwrap();
        assert!(got.deleted);
    }

    #[tokio::test]
    async fn replay_last_write_wins_for_duplicates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("urls.json");

        let mut log = RecordLog::open(&path).unwrap();
        log.append(&UrlRecord::new(code("AAAAAAAA"), "https://old.example", owner("")))
            .unwrap();
        log.append(&UrlRecord::new(code("AAAAAAAA"), "https://new.example", owner("")))
            .unwrap();
        drop(log);

        let repo = InMemoryRepository::open(&path).unwrap();
        let got = repo.read_by_id(&code("AAAAAAAA")).await.unwrap().unwrap();
        assert_eq!(got.original_url, "https://new.example");
    }

    #[tokio::test]
    async fn close_is_idempotent_and_rejects_later_calls() {
        let repo = InMemoryRepository::new();
        repo.ping().await.unwrap();

        repo.close().await.unwrap();
        repo.close().await.unwrap();

        assert!(repo.ping().await.unwrap_err().is_unavailable());
        let err = repo
            .add(record("https://example.com", "alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Unavailable(_)));
    }

    #[tokio::test]
    async fn concurrent_adds_of_same_url_have_one_winner() {
        let repo = Arc::new(InMemoryRepository::new());
        let mut handles = vec![];

        for i in 0..16 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                repo.add(record("https://race.example", &format!("owner-{i}")))
                    .await
                    .is_ok()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }

        assert_eq!(winners, 1);
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_access() {
        let repo = Arc::new(InMemoryRepository::new());
        let mut handles = vec![];

        for i in 0..10u64 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                repo.add(record(&format!("https://example{i}.com"), "alice"))
                    .await
                    .unwrap();
            }));
        }

        for i in 0..10u64 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                let c = Sha256Deriver.derive(&format!("https://example{i}.com"));
                let _ = repo.read_by_id(&c).await;
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(repo.get_user_urls(&owner("alice")).await.unwrap().len(), 10);
    }
}
