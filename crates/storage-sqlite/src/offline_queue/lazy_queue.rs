//! Queue that opens its database on first use.
//!
//! If the database cannot be opened, the session continues on an in-memory
//! queue: offline writes stay visible but do not survive a restart.

use async_trait::async_trait;
use chrono::Duration;
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::OnceCell;

use pocketledger_core::errors::{Error, Result};
use pocketledger_core::sync::{MemoryOfflineQueue, OfflineQueueTrait, QueueEntry};

use crate::SqliteStorage;

type QueueOpener = Arc<dyn Fn() -> Result<Arc<dyn OfflineQueueTrait>> + Send + Sync>;

pub struct LazyOfflineQueue {
    opener: QueueOpener,
    claim_ttl: Duration,
    inner: OnceCell<Arc<dyn OfflineQueueTrait>>,
}

impl LazyOfflineQueue {
    pub fn new(app_data_dir: impl Into<String>, claim_ttl: Duration) -> Self {
        let app_data_dir = app_data_dir.into();
        Self::with_opener(
            move || {
                let storage = SqliteStorage::open(&app_data_dir)?;
                let queue = storage.offline_queue().with_claim_ttl(claim_ttl);
                Ok(Arc::new(queue) as Arc<dyn OfflineQueueTrait>)
            },
            claim_ttl,
        )
    }

    pub fn with_opener<F>(opener: F, claim_ttl: Duration) -> Self
    where
        F: Fn() -> Result<Arc<dyn OfflineQueueTrait>> + Send + Sync + 'static,
    {
        Self {
            opener: Arc::new(opener),
            claim_ttl,
            inner: OnceCell::new(),
        }
    }

    async fn open(&self) -> Result<Arc<dyn OfflineQueueTrait>> {
        let opener = Arc::clone(&self.opener);
        tokio::task::spawn_blocking(move || opener())
            .await
            .map_err(|e| Error::storage(format!("Queue initialisation task failed: {}", e)))?
    }

    async fn queue(&self) -> &Arc<dyn OfflineQueueTrait> {
        self.inner
            .get_or_init(|| async {
                match self.open().await {
                    Ok(queue) => {
                        info!("[OfflineQueue] Durable queue ready");
                        queue
                    }
                    Err(err) => {
                        warn!(
                            "[OfflineQueue] Local storage unavailable, offline writes will not survive a restart: {}",
                            err
                        );
                        Arc::new(MemoryOfflineQueue::with_claim_ttl(self.claim_ttl))
                    }
                }
            })
            .await
    }
}

#[async_trait]
impl OfflineQueueTrait for LazyOfflineQueue {
    async fn enqueue(&self, entry: QueueEntry) -> Result<()> {
        self.queue().await.enqueue(entry).await
    }

    async fn list_pending(&self) -> Result<Vec<QueueEntry>> {
        self.queue().await.list_pending().await
    }

    async fn claim(&self, local_id: &str, owner: &str) -> Result<bool> {
        self.queue().await.claim(local_id, owner).await
    }

    async fn release(&self, local_id: &str, owner: &str) -> Result<()> {
        self.queue().await.release(local_id, owner).await
    }

    async fn remove(&self, local_id: &str) -> Result<()> {
        self.queue().await.remove(local_id).await
    }

    async fn clear(&self) -> Result<()> {
        self.queue().await.clear().await
    }

    async fn is_durable(&self) -> bool {
        self.queue().await.is_durable().await
    }
}
