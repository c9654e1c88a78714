//! Messages exchanged between the sync coordinator, UI sessions and the
//! background cache context.

use serde::{Deserialize, Serialize};

use crate::transactions::Transaction;

/// Message relayed from the background cache context to every open session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackgroundMessage {
    /// Connectivity is back; attempt a queue replay.
    SyncTransactions,
}

/// What caused a replay pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayTrigger {
    Startup,
    ConnectivityRestored,
    BackgroundSignal,
    Manual,
}

/// Result of one replay pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaySummary {
    pub trigger: ReplayTrigger,
    /// The pass did not run because another one was in flight.
    pub already_running: bool,
    pub pending: usize,
    pub confirmed: usize,
    pub failed: usize,
    /// Failures the remote store will keep refusing; the entry stays queued.
    pub permanent_failures: usize,
    /// Saved remotely but still in the queue; the next pass re-sends them.
    pub left_queued: usize,
    /// Entries claimed by another session or already removed.
    pub skipped: usize,
    pub duration_ms: i64,
}

impl ReplaySummary {
    pub fn new(trigger: ReplayTrigger) -> Self {
        Self {
            trigger,
            already_running: false,
            pending: 0,
            confirmed: 0,
            failed: 0,
            permanent_failures: 0,
            left_queued: 0,
            skipped: 0,
            duration_ms: 0,
        }
    }

    pub fn already_running(trigger: ReplayTrigger) -> Self {
        Self {
            already_running: true,
            ..Self::new(trigger)
        }
    }
}

/// Settled state of one optimistic creation.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    /// The remote store accepted the write.
    Confirmed {
        local_id: String,
        transaction: Transaction,
    },
    /// Offline: the entry stays tentative and waits in the queue.
    /// `durable` is false when the queue cannot survive a restart.
    Queued { local_id: String, durable: bool },
    /// Online write failed; the optimistic entry was removed.
    RolledBack { local_id: String, message: String },
}

impl CreateOutcome {
    pub fn local_id(&self) -> &str {
        match self {
            Self::Confirmed { local_id, .. }
            | Self::Queued { local_id, .. }
            | Self::RolledBack { local_id, .. } => local_id,
        }
    }
}

/// Notifications published by the coordinator for UI sessions.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Confirmed {
        local_id: String,
        transaction: Transaction,
    },
    Queued {
        local_id: String,
        durable: bool,
    },
    /// User-visible failure notice: the entry must be re-entered.
    RolledBack {
        local_id: String,
        message: String,
    },
    ReplayFinished(ReplaySummary),
}

impl From<&CreateOutcome> for SyncEvent {
    fn from(outcome: &CreateOutcome) -> Self {
        match outcome.clone() {
            CreateOutcome::Confirmed {
                local_id,
                transaction,
            } => SyncEvent::Confirmed {
                local_id,
                transaction,
            },
            CreateOutcome::Queued { local_id, durable } => SyncEvent::Queued { local_id, durable },
            CreateOutcome::RolledBack { local_id, message } => {
                SyncEvent::RolledBack { local_id, message }
            }
        }
    }
}
