use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use log::{debug, warn};
use rust_decimal::Decimal;
use std::sync::Arc;

use super::notification_scheduler::{system_clock, LocalClock};
use super::notifications_model::{NotificationSnapshot, NOTIFICATION_SNAPSHOT_KEY};
use super::notifications_traits::{set_json, KeyValueStoreTrait};
use crate::errors::Result;
use crate::sync::ConfirmedWriteListener;
use crate::transactions::Transaction;

/// Overwrites the [`NotificationSnapshot`] after every confirmed write.
pub struct SnapshotRecorder {
    store: Arc<dyn KeyValueStoreTrait>,
    clock: LocalClock,
}

impl SnapshotRecorder {
    pub fn new(store: Arc<dyn KeyValueStoreTrait>) -> Self {
        Self::with_clock(store, system_clock())
    }

    pub fn with_clock(store: Arc<dyn KeyValueStoreTrait>, clock: LocalClock) -> Self {
        Self { store, clock }
    }

    /// Today's total over `confirmed`, by local calendar day.
    pub fn snapshot_for(confirmed: &[Transaction], now: DateTime<Local>) -> NotificationSnapshot {
        let today = now.date_naive();
        let today_total: Decimal = confirmed
            .iter()
            .filter(|t| t.date.with_timezone(&Local).date_naive() == today)
            .map(|t| t.amount)
            .sum();
        NotificationSnapshot {
            date_key: NotificationSnapshot::date_key_for(today),
            today_total,
            last_write_timestamp: now.with_timezone(&Utc),
        }
    }

    pub async fn record(&self, confirmed: &[Transaction]) -> Result<NotificationSnapshot> {
        let snapshot = Self::snapshot_for(confirmed, (self.clock)());
        set_json(self.store.as_ref(), NOTIFICATION_SNAPSHOT_KEY, &snapshot).await?;
        debug!(
            "[Notifications] Snapshot {} total {}",
            snapshot.date_key, snapshot.today_total
        );
        Ok(snapshot)
    }
}

#[async_trait]
impl ConfirmedWriteListener for SnapshotRecorder {
    async fn on_confirmed_write(&self, confirmed: &[Transaction]) {
        if let Err(err) = self.record(confirmed).await {
            warn!("[Notifications] Could not store spending snapshot: {}", err);
        }
    }
}
