//! Sync coordinator: decides between remote writes and the offline queue, and
//! replays the queue when connectivity returns.

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::connectivity::{ConnectivityMonitor, ConnectivityState};
use super::memory_queue::MemoryOfflineQueue;
use super::offline_queue_model::{OfflineQueueTrait, QueueEntry};
use super::sync_messages::{
    BackgroundMessage, CreateOutcome, ReplaySummary, ReplayTrigger, SyncEvent,
};
use super::sync_scheduler::SYNC_EVENT_CHANNEL_CAPACITY;
use crate::errors::{Error, Result, RetryClass};
use crate::transactions::{
    NewTransaction, OptimisticTransactionStore, RemoteStoreTrait, Transaction,
};

/// Observer told about the confirmed list after every confirmed write.
#[async_trait]
pub trait ConfirmedWriteListener: Send + Sync {
    async fn on_confirmed_write(&self, confirmed: &[Transaction]);
}

/// Background listener task handle.
#[derive(Debug, Default)]
pub struct SyncRuntimeState {
    pub background_task: Mutex<Option<JoinHandle<()>>>,
}

enum EntryReplay {
    Confirmed { removed: bool },
    Skipped,
    Failed(RetryClass),
}

/// Which queue holds an entry during replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueueSource {
    Primary,
    /// Session-local queue for writes the primary queue refused.
    Fallback,
}

/// Clears the in-flight flag when a replay pass ends, including on early return.
struct ReplayGuard<'a>(&'a AtomicBool);

impl Drop for ReplayGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct SyncCoordinator {
    store: Arc<OptimisticTransactionStore>,
    queue: Arc<dyn OfflineQueueTrait>,
    fallback: MemoryOfflineQueue,
    remote: Arc<dyn RemoteStoreTrait>,
    connectivity: ConnectivityMonitor,
    session_id: String,
    replay_in_flight: AtomicBool,
    listeners: RwLock<Vec<Arc<dyn ConfirmedWriteListener>>>,
    events: broadcast::Sender<SyncEvent>,
    runtime: SyncRuntimeState,
}

impl SyncCoordinator {
    pub fn new(
        store: Arc<OptimisticTransactionStore>,
        queue: Arc<dyn OfflineQueueTrait>,
        remote: Arc<dyn RemoteStoreTrait>,
        connectivity: ConnectivityMonitor,
    ) -> Self {
        let (events, _) = broadcast::channel(SYNC_EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            queue,
            fallback: MemoryOfflineQueue::new(),
            remote,
            connectivity,
            session_id: Uuid::new_v4().to_string(),
            replay_in_flight: AtomicBool::new(false),
            listeners: RwLock::new(Vec::new()),
            events,
            runtime: SyncRuntimeState::default(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Entries that only live in this session because the offline queue
    /// refused them.
    pub async fn session_only_pending(&self) -> Result<Vec<QueueEntry>> {
        self.fallback.list_pending().await
    }

    pub fn store(&self) -> Arc<OptimisticTransactionStore> {
        Arc::clone(&self.store)
    }

    pub fn connectivity(&self) -> ConnectivityMonitor {
        self.connectivity.clone()
    }

    pub fn add_listener(&self, listener: Arc<dyn ConfirmedWriteListener>) {
        self.listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(listener);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: SyncEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Loads the confirmed list, re-surfaces queued entries, and replays if online.
    pub async fn start(&self) -> Result<()> {
        self.store.load().await;
        match self.queue.list_pending().await {
            Ok(pending) => {
                let restored = pending
                    .iter()
                    .filter(|entry| self.store.restore_queued(entry))
                    .count();
                if restored > 0 {
                    info!("[Sync] Restored {} queued transactions into the view", restored);
                }
            }
            Err(err) => warn!("[Sync] Could not read offline queue on startup: {}", err),
        }

        if self.connectivity.is_online() {
            self.replay(ReplayTrigger::Startup).await?;
        }
        Ok(())
    }

    /// Inserts optimistically and settles the write before returning.
    pub async fn create(&self, draft: NewTransaction) -> CreateOutcome {
        let local_id = self.store.insert_optimistic(draft.clone());
        self.settle(local_id, draft).await
    }

    /// Inserts optimistically and settles in a background task.
    ///
    /// Returns the local id immediately; the outcome arrives as a [`SyncEvent`].
    pub fn submit(self: &Arc<Self>, draft: NewTransaction) -> String {
        let local_id = self.store.insert_optimistic(draft.clone());
        let this = Arc::clone(self);
        let id = local_id.clone();
        tokio::spawn(async move {
            this.settle(id, draft).await;
        });
        local_id
    }

    async fn settle(&self, local_id: String, draft: NewTransaction) -> CreateOutcome {
        let outcome = match self.connectivity.current() {
            ConnectivityState::Online => self.write_online(local_id, &draft).await,
            ConnectivityState::Offline => self.write_offline(local_id, &draft).await,
        };
        self.publish(SyncEvent::from(&outcome));
        outcome
    }

    async fn write_online(&self, local_id: String, draft: &NewTransaction) -> CreateOutcome {
        match self.remote.insert(&local_id, draft).await {
            Ok(confirmed) => {
                if let Err(err) = self.store.confirm(&local_id, confirmed.clone()) {
                    warn!("[Sync] {}", err);
                }
                self.notify_confirmed().await;
                CreateOutcome::Confirmed {
                    local_id,
                    transaction: confirmed,
                }
            }
            Err(err) => {
                error!("[Sync] Failed to save transaction {}: {}", local_id, err);
                self.store.revert(&local_id);
                CreateOutcome::RolledBack {
                    local_id,
                    message: err.to_string(),
                }
            }
        }
    }

    async fn write_offline(&self, local_id: String, draft: &NewTransaction) -> CreateOutcome {
        let entry = QueueEntry::from_draft(local_id.clone(), draft, Utc::now());
        match self.queue.enqueue(entry.clone()).await {
            Ok(()) => {
                self.store.mark_queued(&local_id);
                let durable = self.queue.is_durable().await;
                debug!("[Sync] Queued transaction {} (durable={})", local_id, durable);
                CreateOutcome::Queued { local_id, durable }
            }
            Err(err) => {
                warn!(
                    "[Sync] Could not queue transaction {}, keeping it for this session only: {}",
                    local_id, err
                );
                match self.fallback.enqueue(entry).await {
                    Ok(()) => {
                        self.store.mark_queued(&local_id);
                    }
                    Err(err) => error!(
                        "[Sync] Transaction {} cannot be queued at all: {}",
                        local_id, err
                    ),
                }
                CreateOutcome::Queued {
                    local_id,
                    durable: false,
                }
            }
        }
    }

    /// Replays every queued entry in enqueue order.
    ///
    /// One pass at a time per coordinator; a concurrent call returns
    /// immediately with `already_running` set.
    pub async fn replay(&self, trigger: ReplayTrigger) -> Result<ReplaySummary> {
        if self
            .replay_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("[Sync] Replay already in flight, skipping {:?}", trigger);
            return Ok(ReplaySummary::already_running(trigger));
        }
        let _guard = ReplayGuard(&self.replay_in_flight);
        let started_at = Instant::now();

        let session_only = self.fallback.list_pending().await?;
        let durable = match self.queue.list_pending().await {
            Ok(entries) => entries,
            // A broken queue only aborts the pass when there is nothing else to send.
            Err(err) if session_only.is_empty() => return Err(err),
            Err(err) => {
                warn!(
                    "[Sync] Could not read offline queue, replaying {} session entries only: {}",
                    session_only.len(),
                    err
                );
                Vec::new()
            }
        };
        let pending = merge_by_enqueue_time(durable, session_only);
        let mut summary = ReplaySummary::new(trigger);
        summary.pending = pending.len();

        for (entry, source) in &pending {
            match self.replay_entry(entry, *source).await {
                EntryReplay::Confirmed { removed } => {
                    summary.confirmed += 1;
                    if !removed {
                        summary.left_queued += 1;
                    }
                }
                EntryReplay::Skipped => summary.skipped += 1,
                EntryReplay::Failed(class) => {
                    summary.failed += 1;
                    if class == RetryClass::Permanent {
                        summary.permanent_failures += 1;
                    }
                }
            }
        }

        summary.duration_ms = started_at.elapsed().as_millis() as i64;
        if summary.pending > 0 {
            info!(
                "[Sync] Replay ({:?}) finished: pending={} confirmed={} failed={} (permanent={}) skipped={} left_queued={}",
                trigger,
                summary.pending,
                summary.confirmed,
                summary.failed,
                summary.permanent_failures,
                summary.skipped,
                summary.left_queued
            );
        }
        self.publish(SyncEvent::ReplayFinished(summary.clone()));
        Ok(summary)
    }

    fn queue_for(&self, source: QueueSource) -> &dyn OfflineQueueTrait {
        match source {
            QueueSource::Primary => self.queue.as_ref(),
            QueueSource::Fallback => &self.fallback,
        }
    }

    async fn replay_entry(&self, entry: &QueueEntry, source: QueueSource) -> EntryReplay {
        let queue = self.queue_for(source);
        match queue.claim(&entry.local_id, &self.session_id).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(
                    "[Sync] Queue entry {} is gone or claimed by another session",
                    entry.local_id
                );
                return EntryReplay::Skipped;
            }
            Err(err) => {
                warn!("[Sync] Could not claim queue entry {}: {}", entry.local_id, err);
                return EntryReplay::Failed(err.retry_class());
            }
        }

        let confirmed = match self.remote.insert(&entry.local_id, &entry.to_draft()).await {
            Ok(confirmed) => confirmed,
            Err(err) => {
                let class = err.retry_class();
                warn!(
                    "[Sync] Replay of {} failed ({:?}), keeping it queued: {}",
                    entry.local_id, class, err
                );
                if let Err(err) = queue.release(&entry.local_id, &self.session_id).await {
                    warn!("[Sync] Could not release claim on {}: {}", entry.local_id, err);
                }
                return EntryReplay::Failed(class);
            }
        };

        let removed = match queue.remove(&entry.local_id).await {
            Ok(()) => true,
            Err(err) => {
                error!(
                    "[Sync] Transaction {} was saved but could not be removed from the queue: {}",
                    entry.local_id, err
                );
                false
            }
        };

        match self.store.confirm(&entry.local_id, confirmed.clone()) {
            Ok(()) => {}
            Err(Error::ReplayConflict(local_id)) => {
                info!(
                    "[Sync] Replayed {} has no tentative entry; it appears after the next load",
                    local_id
                );
            }
            Err(err) => warn!("[Sync] {}", err),
        }
        self.notify_confirmed().await;
        self.publish(SyncEvent::Confirmed {
            local_id: entry.local_id.clone(),
            transaction: confirmed,
        });
        EntryReplay::Confirmed { removed }
    }

    async fn notify_confirmed(&self) {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if listeners.is_empty() {
            return;
        }
        let confirmed = self.store.confirmed_transactions();
        for listener in listeners {
            listener.on_confirmed_write(&confirmed).await;
        }
    }

    async fn replay_logged(&self, trigger: ReplayTrigger) {
        if let Err(err) = self.replay(trigger).await {
            warn!("[Sync] Replay ({:?}) could not read the queue: {}", trigger, err);
        }
    }

    /// Starts the listener that replays on reconnect and on background signals.
    /// Calling it while the listener runs is a no-op.
    pub async fn ensure_background_started(
        self: &Arc<Self>,
        signals: Option<broadcast::Receiver<BackgroundMessage>>,
    ) {
        let mut guard = self.runtime.background_task.lock().await;
        if let Some(handle) = guard.as_ref() {
            if !handle.is_finished() {
                return;
            }
            guard.take();
        }

        // Subscribe before spawning so a transition right after this call is not missed.
        let connectivity = self.connectivity.subscribe();
        let this = Arc::clone(self);
        *guard = Some(tokio::spawn(async move {
            this.run_listener(connectivity, signals).await;
        }));
    }

    pub async fn ensure_background_stopped(&self) {
        let mut guard = self.runtime.background_task.lock().await;
        if let Some(handle) = guard.take() {
            handle.abort();
        }
    }

    async fn run_listener(
        &self,
        mut connectivity: watch::Receiver<ConnectivityState>,
        mut signals: Option<broadcast::Receiver<BackgroundMessage>>,
    ) {
        let mut last = *connectivity.borrow();

        loop {
            tokio::select! {
                changed = connectivity.changed() => {
                    if changed.is_err() {
                        info!("[Sync] Connectivity source closed. Stopping listener.");
                        break;
                    }
                    let current = *connectivity.borrow_and_update();
                    let regained = last == ConnectivityState::Offline
                        && current == ConnectivityState::Online;
                    last = current;
                    if regained {
                        self.replay_logged(ReplayTrigger::ConnectivityRestored).await;
                    }
                }
                message = next_signal(&mut signals) => {
                    if let Some(BackgroundMessage::SyncTransactions) = message {
                        self.replay_logged(ReplayTrigger::BackgroundSignal).await;
                    }
                }
            }
        }
    }
}

/// Interleaves session-only entries into the durable queue's order by
/// enqueue time; ties keep the durable entry first.
fn merge_by_enqueue_time(
    durable: Vec<QueueEntry>,
    session_only: Vec<QueueEntry>,
) -> Vec<(QueueEntry, QueueSource)> {
    let mut merged = Vec::with_capacity(durable.len() + session_only.len());
    let mut durable = durable.into_iter().peekable();
    let mut session_only = session_only.into_iter().peekable();
    loop {
        let take_session = match (durable.peek(), session_only.peek()) {
            (Some(d), Some(s)) => s.enqueued_at < d.enqueued_at,
            (None, Some(_)) => true,
            (Some(_), None) => false,
            (None, None) => break,
        };
        if take_session {
            if let Some(entry) = session_only.next() {
                merged.push((entry, QueueSource::Fallback));
            }
        } else if let Some(entry) = durable.next() {
            merged.push((entry, QueueSource::Primary));
        }
    }
    merged
}

async fn next_signal(
    signals: &mut Option<broadcast::Receiver<BackgroundMessage>>,
) -> Option<BackgroundMessage> {
    let Some(rx) = signals.as_mut() else {
        return std::future::pending().await;
    };
    match rx.recv().await {
        Ok(message) => Some(message),
        Err(RecvError::Lagged(missed)) => {
            debug!("[Sync] Missed {} background messages", missed);
            Some(BackgroundMessage::SyncTransactions)
        }
        Err(RecvError::Closed) => {
            info!("[Sync] Background context channel closed");
            *signals = None;
            None
        }
    }
}
