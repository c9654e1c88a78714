//! Non-durable offline queue used when local storage cannot be opened.
//!
//! Same semantics as the SQLite queue, but entries are lost when the process exits.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::{Mutex, MutexGuard};

use super::offline_queue_model::{OfflineQueueTrait, QueueEntry};
use super::sync_scheduler::QUEUE_CLAIM_TTL_SECS;
use crate::errors::{Error, Result};

#[derive(Debug, Clone)]
struct MemoryRecord {
    entry: QueueEntry,
    claimed_by: Option<String>,
    claimed_at: Option<DateTime<Utc>>,
}

pub struct MemoryOfflineQueue {
    records: Mutex<Vec<MemoryRecord>>,
    claim_ttl: Duration,
}

impl Default for MemoryOfflineQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryOfflineQueue {
    pub fn new() -> Self {
        Self::with_claim_ttl(Duration::seconds(QUEUE_CLAIM_TTL_SECS))
    }

    pub fn with_claim_ttl(claim_ttl: Duration) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            claim_ttl,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<MemoryRecord>>> {
        self.records
            .lock()
            .map_err(|_| Error::storage("In-memory offline queue is poisoned"))
    }
}

#[async_trait]
impl OfflineQueueTrait for MemoryOfflineQueue {
    async fn enqueue(&self, entry: QueueEntry) -> Result<()> {
        let mut records = self.lock()?;
        if records.iter().any(|r| r.entry.local_id == entry.local_id) {
            return Err(Error::storage(format!(
                "Queue entry {} already exists",
                entry.local_id
            )));
        }
        records.push(MemoryRecord {
            entry,
            claimed_by: None,
            claimed_at: None,
        });
        Ok(())
    }

    async fn list_pending(&self) -> Result<Vec<QueueEntry>> {
        // Records are kept in enqueue order.
        Ok(self.lock()?.iter().map(|r| r.entry.clone()).collect())
    }

    async fn claim(&self, local_id: &str, owner: &str) -> Result<bool> {
        let now = Utc::now();
        let mut records = self.lock()?;
        let Some(record) = records.iter_mut().find(|r| r.entry.local_id == local_id) else {
            return Ok(false);
        };
        let claimable = match (&record.claimed_by, record.claimed_at) {
            (None, _) => true,
            (Some(holder), _) if holder == owner => true,
            (Some(_), Some(at)) => at < now - self.claim_ttl,
            (Some(_), None) => true,
        };
        if claimable {
            record.claimed_by = Some(owner.to_string());
            record.claimed_at = Some(now);
        }
        Ok(claimable)
    }

    async fn release(&self, local_id: &str, owner: &str) -> Result<()> {
        let mut records = self.lock()?;
        if let Some(record) = records
            .iter_mut()
            .find(|r| r.entry.local_id == local_id && r.claimed_by.as_deref() == Some(owner))
        {
            record.claimed_by = None;
            record.claimed_at = None;
        }
        Ok(())
    }

    async fn remove(&self, local_id: &str) -> Result<()> {
        self.lock()?.retain(|r| r.entry.local_id != local_id);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.lock()?.clear();
        Ok(())
    }

    async fn is_durable(&self) -> bool {
        false
    }
}
