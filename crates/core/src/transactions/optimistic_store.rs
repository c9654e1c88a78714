//! In-memory, UI-facing transaction list holding tentative and confirmed entries.

use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::watch;
use uuid::Uuid;

use super::transactions_model::{NewTransaction, Transaction, TransactionUpdate};
use super::transactions_traits::RemoteStoreTrait;
use crate::errors::{Error, Result};
use crate::sync::QueueEntry;

/// Generates a fresh local id. UUIDv7 keeps ids unique and time-ordered.
pub fn new_local_id() -> String {
    Uuid::now_v7().to_string()
}

/// Lifecycle of an entry in the visible list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    /// Shown optimistically, remote write not settled yet.
    Tentative,
    /// Persisted in the offline queue, waiting for replay.
    Queued,
    /// Accepted by the remote store.
    Confirmed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreEntry {
    pub transaction: Transaction,
    pub state: EntryState,
    /// Local id the entry was created under, if it was created in this session.
    pub local_id: Option<String>,
}

impl StoreEntry {
    fn is_pending_for(&self, local_id: &str) -> bool {
        self.state != EntryState::Confirmed && self.transaction.id == local_id
    }
}

/// Ordered newest-first by write order (not by `date`).
pub struct OptimisticTransactionStore {
    remote: Arc<dyn RemoteStoreTrait>,
    entries: RwLock<Vec<StoreEntry>>,
    revision: watch::Sender<u64>,
}

impl OptimisticTransactionStore {
    pub fn new(remote: Arc<dyn RemoteStoreTrait>) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            remote,
            entries: RwLock::new(Vec::new()),
            revision,
        }
    }

    fn read_entries(&self) -> RwLockReadGuard<'_, Vec<StoreEntry>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, Vec<StoreEntry>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }

    fn bump_revision(&self) {
        self.revision.send_modify(|rev| *rev = rev.wrapping_add(1));
    }

    /// Receiver that changes whenever the visible list changes.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Replaces local state with the remote store's confirmed transactions.
    ///
    /// A failed read leaves an empty list rather than surfacing an error.
    pub async fn load(&self) -> Vec<Transaction> {
        let loaded = match self.remote.list_all().await {
            Ok(transactions) => transactions,
            Err(err) => {
                error!("[Sync] Failed to load transactions from remote store: {}", err);
                Vec::new()
            }
        };

        {
            let mut entries = self.write_entries();
            *entries = loaded
                .iter()
                .cloned()
                .map(|transaction| StoreEntry {
                    transaction,
                    state: EntryState::Confirmed,
                    local_id: None,
                })
                .collect();
        }
        self.bump_revision();
        debug!("[Sync] Loaded {} confirmed transactions", loaded.len());
        loaded
    }

    /// Inserts a tentative transaction at the head and returns its local id.
    pub fn insert_optimistic(&self, draft: NewTransaction) -> String {
        let local_id = new_local_id();
        self.insert_tentative(local_id.clone(), draft, EntryState::Tentative);
        local_id
    }

    fn insert_tentative(&self, local_id: String, draft: NewTransaction, state: EntryState) {
        {
            let mut entries = self.write_entries();
            entries.insert(
                0,
                StoreEntry {
                    transaction: draft.into_transaction(local_id.clone()),
                    state,
                    local_id: Some(local_id),
                },
            );
        }
        self.bump_revision();
    }

    /// Re-surfaces a queued entry after a reload. No-op if it is already shown.
    pub fn restore_queued(&self, entry: &QueueEntry) -> bool {
        if self
            .read_entries()
            .iter()
            .any(|e| e.is_pending_for(&entry.local_id))
        {
            return false;
        }
        self.insert_tentative(entry.local_id.clone(), entry.to_draft(), EntryState::Queued);
        true
    }

    /// Marks a tentative entry as persisted in the offline queue.
    pub fn mark_queued(&self, local_id: &str) -> bool {
        let updated = {
            let mut entries = self.write_entries();
            match entries.iter_mut().find(|e| e.is_pending_for(local_id)) {
                Some(entry) => {
                    entry.state = EntryState::Queued;
                    true
                }
                None => false,
            }
        };
        if updated {
            self.bump_revision();
        }
        updated
    }

    /// Replaces the tentative entry for `local_id` in place with the confirmed one.
    pub fn confirm(&self, local_id: &str, confirmed: Transaction) -> Result<()> {
        {
            let mut entries = self.write_entries();
            let Some(entry) = entries.iter_mut().find(|e| e.is_pending_for(local_id)) else {
                return Err(Error::ReplayConflict(local_id.to_string()));
            };
            entry.transaction = confirmed;
            entry.state = EntryState::Confirmed;
        }
        self.bump_revision();
        Ok(())
    }

    /// Drops the tentative entry for `local_id`. Returns whether one was found.
    pub fn revert(&self, local_id: &str) -> bool {
        let removed = {
            let mut entries = self.write_entries();
            let before = entries.len();
            entries.retain(|e| !e.is_pending_for(local_id));
            entries.len() != before
        };
        if removed {
            self.bump_revision();
        }
        removed
    }

    /// Deletes a transaction remotely, then locally. Not queued when offline.
    pub async fn remove(&self, id: &str) -> Result<()> {
        if let Err(err) = self.remote.delete(id).await {
            error!("[Sync] Failed to delete transaction {}: {}", id, err);
            return Err(err);
        }
        {
            let mut entries = self.write_entries();
            entries.retain(|e| e.transaction.id != id);
        }
        self.bump_revision();
        Ok(())
    }

    /// Updates a transaction remotely, then applies the same fields locally.
    pub async fn update(&self, id: &str, fields: TransactionUpdate) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }
        if let Err(err) = self.remote.update(id, &fields).await {
            error!("[Sync] Failed to update transaction {}: {}", id, err);
            return Err(err);
        }
        {
            let mut entries = self.write_entries();
            match entries.iter_mut().find(|e| e.transaction.id == id) {
                Some(entry) => fields.apply_to(&mut entry.transaction),
                None => warn!("[Sync] Updated transaction {} is not in the local list", id),
            }
        }
        self.bump_revision();
        Ok(())
    }

    pub fn entries(&self) -> Vec<StoreEntry> {
        self.read_entries().clone()
    }

    pub fn transactions(&self) -> Vec<Transaction> {
        self.read_entries()
            .iter()
            .map(|e| e.transaction.clone())
            .collect()
    }

    pub fn confirmed_transactions(&self) -> Vec<Transaction> {
        self.read_entries()
            .iter()
            .filter(|e| e.state == EntryState::Confirmed)
            .map(|e| e.transaction.clone())
            .collect()
    }

    pub fn state_of(&self, id: &str) -> Option<EntryState> {
        self.read_entries()
            .iter()
            .find(|e| e.transaction.id == id)
            .map(|e| e.state)
    }

    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_entries().is_empty()
    }
}
