//! Background execution of soft-delete requests.
//!
//! [`DeletionQueue`] is the cheap, cloneable submit side of a bounded channel.
//! A single [`DeletionWorker`] task drains it and calls
//! [`Repository::delete_batch`] for each task. The worker stops once every
//! queue handle has been dropped and the remaining tasks are processed.

use crate::error::{Result, ShortenerError};
use snip_core::{OwnerId, Repository, ShortCode};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// A soft-delete request waiting for the worker.
#[derive(Debug, Clone)]
pub struct DeletionTask {
    pub codes: Vec<ShortCode>,
    pub owner: OwnerId,
    pub cancel: CancellationToken,
}

impl DeletionTask {
    pub fn new(codes: Vec<ShortCode>, owner: OwnerId) -> Self {
        Self {
            codes,
            owner,
            cancel: CancellationToken::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeletionQueue {
    tx: mpsc::Sender<DeletionTask>,
}

impl DeletionQueue {
    /// Hands `task` to the worker without waiting for queue space.
    pub fn submit(&self, task: DeletionTask) -> Result<()> {
        self.tx.try_send(task).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => ShortenerError::DeletionQueueFull,
            mpsc::error::TrySendError::Closed(_) => ShortenerError::DeletionQueueClosed,
        })
    }
}

#[derive(Debug)]
pub struct DeletionWorker {
    handle: JoinHandle<()>,
}

impl DeletionWorker {
    /// Spawns the worker on the current tokio runtime.
    pub fn spawn<R: Repository>(repository: Arc<R>, capacity: usize) -> (DeletionQueue, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        let handle = tokio::spawn(run(repository, rx));

        (DeletionQueue { tx }, Self { handle })
    }

    /// Waits until the worker has drained the queue and stopped.
    ///
    /// Only returns once every [`DeletionQueue`] clone has been dropped.
    pub async fn join(self) {
        if let Err(err) = self.handle.await {
            error!(error = %err, "deletion worker terminated abnormally");
        }
    }
}

async fn run<R: Repository>(repository: Arc<R>, mut rx: mpsc::Receiver<DeletionTask>) {
    info!("deletion worker started");

    while let Some(task) = rx.recv().await {
        if task.cancel.is_cancelled() {
            debug!(owner = %task.owner, count = task.codes.len(), "deletion cancelled, skipping");
            continue;
        }

        match repository.delete_batch(&task.codes, &task.owner).await {
            Ok(()) => debug!(owner = %task.owner, count = task.codes.len(), "deletion applied"),
            Err(err) => error!(
                owner = %task.owner,
                count = task.codes.len(),
                error = %err,
                "deletion failed"
            ),
        }
    }

    info!("deletion worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use snip_core::{Deriver, ReadRepository, Sha256Deriver, UrlRecord};
    use snip_storage::InMemoryRepository;

    async fn seeded(url: &str, owner: &str) -> (Arc<InMemoryRepository>, ShortCode) {
        let repository = Arc::new(InMemoryRepository::new());
        let code = Sha256Deriver.derive(url);
        repository
            .add(UrlRecord::new(code.clone(), url, OwnerId::new(owner)))
            .await
            .unwrap();
        (repository, code)
    }

    #[tokio::test]
    async fn worker_applies_submitted_tasks() {
        let (repository, code) = seeded("https://example.com", "alice").await;
        let (queue, worker) = DeletionWorker::spawn(Arc::clone(&repository), 8);

        queue
            .submit(DeletionTask::new(vec![code.clone()], OwnerId::new("alice")))
            .unwrap();
        drop(queue);
        worker.join().await;

        let record = repository.read_by_id(&code).await.unwrap().unwrap();
        assert!(record.deleted);
    }

    #[tokio::test]
    async fn cancelled_task_is_skipped() {
        let (repository, code) = seeded("https://example.com", "alice").await;
        let (queue, worker) = DeletionWorker::spawn(Arc::clone(&repository), 8);

        let task = DeletionTask::new(vec![code.clone()], OwnerId::new("alice"));
        task.cancel.cancel();
        queue.submit(task).unwrap();
        drop(queue);
        worker.join().await;

        let record = repository.read_by_id(&code).await.unwrap().unwrap();
        assert!(!record.deleted);
    }

    #[tokio::test]
    async fn worker_drains_all_tasks_before_stopping() {
        let repository = Arc::new(InMemoryRepository::new());
        let owner = OwnerId::new("alice");
        let mut codes = Vec::new();
        for i in 0..10 {
            let url = format!("https://example{i}.com");
            let code = Sha256Deriver.derive(&url);
            repository
                .add(UrlRecord::new(code.clone(), url, owner.clone()))
                .await
                .unwrap();
            codes.push(code);
        }

        let (queue, worker) = DeletionWorker::spawn(Arc::clone(&repository), 16);
        for code in &codes {
            queue
                .submit(DeletionTask::new(vec![code.clone()], owner.clone()))
                .unwrap();
        }
        drop(queue);
        worker.join().await;

        assert!(repository.get_user_urls(&owner).await.unwrap().is_empty());
    }

    #[test]
    fn full_queue_is_reported() {
        let (tx, _rx) = mpsc::channel(1);
        let queue = DeletionQueue { tx };
        let task = DeletionTask::new(vec![], OwnerId::new("alice"));

        queue.submit(task.clone()).unwrap();
        let err = queue.submit(task).unwrap_err();
        assert!(matches!(err, ShortenerError::DeletionQueueFull));
    }

    #[test]
    fn stopped_worker_is_reported() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let queue = DeletionQueue { tx };

        let err = queue
            .submit(DeletionTask::new(vec![], OwnerId::new("alice")))
            .unwrap_err();
        assert!(matches!(err, ShortenerError::DeletionQueueClosed));
    }
}
