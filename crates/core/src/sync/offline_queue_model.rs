//! Offline queue records and the queue contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::transactions::{Category, NewTransaction};

/// A creation that could not reach the remote store yet.
///
/// `local_id` is the id the tentative transaction was shown under and is never
/// reused for another entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub local_id: String,
    pub description: String,
    pub category: Category,
    pub amount: Decimal,
    pub date: DateTime<Utc>,
    pub enqueued_at: DateTime<Utc>,
}

impl QueueEntry {
    pub fn from_draft(
        local_id: impl Into<String>,
        draft: &NewTransaction,
        enqueued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            local_id: local_id.into(),
            description: draft.description.clone(),
            category: draft.category,
            amount: draft.amount,
            date: draft.date,
            enqueued_at,
        }
    }

    /// Draft to replay. Keeps the original `date`, not the replay time.
    pub fn to_draft(&self) -> NewTransaction {
        NewTransaction {
            description: self.description.clone(),
            category: self.category,
            amount: self.amount,
            date: self.date,
        }
    }
}

/// Durable queue of pending creations, shared by every session of an installation.
///
/// Every call is a single atomic operation on the backing store; nothing is
/// atomic across two calls.
#[async_trait]
pub trait OfflineQueueTrait: Send + Sync {
    /// Persists an entry keyed by its `local_id`.
    async fn enqueue(&self, entry: QueueEntry) -> Result<()>;

    /// All entries, oldest enqueue first. Read-only.
    async fn list_pending(&self) -> Result<Vec<QueueEntry>>;

    /// Compare-and-set claim on an entry for a replaying session.
    ///
    /// Succeeds when the entry exists and is unclaimed, already claimed by
    /// `owner`, or held by a claim older than the claim TTL.
    async fn claim(&self, local_id: &str, owner: &str) -> Result<bool>;

    /// Drops `owner`'s claim so the entry is picked up by a later replay.
    async fn release(&self, local_id: &str, owner: &str) -> Result<()>;

    /// Deletes the entry. Removing a missing entry is not an error.
    async fn remove(&self, local_id: &str) -> Result<()>;

    /// Drops every entry. Only for destructive resets.
    async fn clear(&self) -> Result<()>;

    /// Whether entries survive a restart.
    async fn is_durable(&self) -> bool;
}
