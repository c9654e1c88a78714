//! Daily summary and expense reminder timers.
//!
//! Each enabled reminder is one task: sleep until the next configured time of
//! day, fire, then fire again every 24 hours. Changing the settings aborts the
//! running tasks and arms new ones, so a disabled reminder never fires again.

use chrono::{DateTime, Local, NaiveDateTime, NaiveTime};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::notifications_model::{
    parse_time_of_day, Notification, NotificationKind, NotificationSettings,
    NotificationSnapshot, PermissionState, NOTIFICATION_SETTINGS_KEY, NOTIFICATION_SNAPSHOT_KEY,
};
use super::notifications_traits::{get_json, set_json, KeyValueStoreTrait, NotificationChannel};
use crate::errors::Result;

/// Interval between two firings of the same reminder.
pub const REMINDER_REPEAT_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Source of the local wall-clock time.
pub type LocalClock = Arc<dyn Fn() -> DateTime<Local> + Send + Sync>;

pub fn system_clock() -> LocalClock {
    Arc::new(Local::now)
}

/// Delay from `now` until the next occurrence of `time`.
///
/// A time equal to or earlier than `now` is scheduled for tomorrow.
pub fn delay_until_next(time: NaiveTime, now: NaiveDateTime) -> Duration {
    let mut target = now.date().and_time(time);
    if target <= now {
        target += chrono::Duration::days(1);
    }
    (target - now).to_std().unwrap_or(Duration::ZERO)
}

/// Everything a reminder task needs once it is detached from the scheduler.
#[derive(Clone)]
struct ReminderContext {
    channel: Arc<dyn NotificationChannel>,
    store: Arc<dyn KeyValueStoreTrait>,
    clock: LocalClock,
}

impl ReminderContext {
    fn snapshot(&self) -> Option<NotificationSnapshot> {
        match get_json::<NotificationSnapshot>(self.store.as_ref(), NOTIFICATION_SNAPSHOT_KEY) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!("[Notifications] Could not read spending snapshot: {}", err);
                None
            }
        }
    }

    /// The notification `kind` should show right now, if any.
    fn due_notification(&self, kind: NotificationKind) -> Option<Notification> {
        let now = (self.clock)();
        let today = now.date_naive();
        let snapshot = self.snapshot();
        match kind {
            NotificationKind::DailySummary => {
                let total = snapshot
                    .map(|s| s.total_for(today))
                    .unwrap_or_default();
                Some(Notification::daily_summary(total))
            }
            NotificationKind::ExpenseReminder => {
                let logged_today = snapshot.is_some_and(|s| {
                    s.last_write_timestamp.with_timezone(&Local).date_naive() == today
                });
                (!logged_today).then(Notification::expense_reminder)
            }
            NotificationKind::Test => Some(Notification::test()),
        }
    }

    async fn fire(&self, kind: NotificationKind) {
        let Some(notification) = self.due_notification(kind) else {
            debug!("[Notifications] Nothing to show for {}", kind.tag());
            return;
        };
        if let Err(err) = self.channel.show(notification).await {
            error!("[Notifications] Failed to show {}: {}", kind.tag(), err);
        }
    }
}

async fn run_reminder(kind: NotificationKind, first_delay: Duration, ctx: ReminderContext) {
    tokio::time::sleep(first_delay).await;
    loop {
        ctx.fire(kind).await;
        tokio::time::sleep(REMINDER_REPEAT_INTERVAL).await;
    }
}

pub struct NotificationScheduler {
    ctx: ReminderContext,
    permission: Mutex<Option<PermissionState>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl NotificationScheduler {
    pub fn new(channel: Arc<dyn NotificationChannel>, store: Arc<dyn KeyValueStoreTrait>) -> Self {
        Self::with_clock(channel, store, system_clock())
    }

    pub fn with_clock(
        channel: Arc<dyn NotificationChannel>,
        store: Arc<dyn KeyValueStoreTrait>,
        clock: LocalClock,
    ) -> Self {
        Self {
            ctx: ReminderContext {
                channel,
                store,
                clock,
            },
            permission: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Stored settings merged over the defaults.
    pub fn settings(&self) -> NotificationSettings {
        match get_json::<NotificationSettings>(self.ctx.store.as_ref(), NOTIFICATION_SETTINGS_KEY) {
            Ok(Some(settings)) => settings,
            Ok(None) => NotificationSettings::default(),
            Err(err) => {
                error!("[Notifications] Error loading notification settings: {}", err);
                NotificationSettings::default()
            }
        }
    }

    /// Persists new settings and re-arms the reminders.
    pub async fn update_settings(&self, settings: NotificationSettings) -> Result<()> {
        settings.validate()?;
        set_json(self.ctx.store.as_ref(), NOTIFICATION_SETTINGS_KEY, &settings).await?;
        self.reschedule().await;
        Ok(())
    }

    /// Asks for permission (once per scheduler) and arms the reminders.
    ///
    /// Returns false when permission is not granted; the scheduler then stays idle.
    pub async fn start(&self) -> bool {
        if !self.ensure_permission().await {
            info!("[Notifications] Permission not granted, reminders stay off");
            self.stop().await;
            return false;
        }
        self.reschedule().await;
        true
    }

    async fn ensure_permission(&self) -> bool {
        let mut cached = self.permission.lock().await;
        let state = match *cached {
            Some(state) => state,
            None => {
                let state = match self.ctx.channel.permission() {
                    PermissionState::Default => self.ctx.channel.request_permission().await,
                    state => state,
                };
                *cached = Some(state);
                state
            }
        };
        state == PermissionState::Granted
    }

    async fn permission_granted(&self) -> bool {
        *self.permission.lock().await == Some(PermissionState::Granted)
    }

    /// Aborts running reminder tasks and arms one per enabled reminder.
    ///
    /// Returns the number of armed reminders.
    pub async fn reschedule(&self) -> usize {
        let mut tasks = self.tasks.lock().await;
        for task in tasks.drain(..) {
            task.abort();
        }
        if !self.permission_granted().await {
            return 0;
        }

        let settings = self.settings();
        let now = (self.ctx.clock)().naive_local();
        let reminders = [
            (
                NotificationKind::DailySummary,
                settings.summary_enabled,
                &settings.summary_time,
            ),
            (
                NotificationKind::ExpenseReminder,
                settings.reminder_enabled,
                &settings.reminder_time,
            ),
        ];
        for (kind, enabled, time) in reminders {
            if !enabled {
                continue;
            }
            let at = match parse_time_of_day(time) {
                Ok(at) => at,
                Err(err) => {
                    warn!("[Notifications] Skipping {}: {}", kind.tag(), err);
                    continue;
                }
            };
            let delay = delay_until_next(at, now);
            debug!(
                "[Notifications] {} armed in {}s",
                kind.tag(),
                delay.as_secs()
            );
            tasks.push(tokio::spawn(run_reminder(kind, delay, self.ctx.clone())));
        }
        info!("[Notifications] {} daily notifications scheduled", tasks.len());
        tasks.len()
    }

    pub async fn stop(&self) {
        for task in self.tasks.lock().await.drain(..) {
            task.abort();
        }
    }

    /// Shows a test notification right away. Returns false without permission.
    pub async fn send_test_notification(&self) -> Result<bool> {
        if !self.ensure_permission().await {
            return Ok(false);
        }
        self.ctx.channel.show(Notification::test()).await?;
        Ok(true)
    }
}
