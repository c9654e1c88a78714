use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, ValidationError};

/// Key of the persisted [`NotificationSettings`].
pub const NOTIFICATION_SETTINGS_KEY: &str = "notificationSettings";

/// Key of the persisted [`NotificationSnapshot`].
pub const NOTIFICATION_SNAPSHOT_KEY: &str = "notificationSnapshot";

pub const DEFAULT_SUMMARY_TIME: &str = "21:00";
pub const DEFAULT_REMINDER_TIME: &str = "20:00";

const TIME_OF_DAY_FORMAT: &str = "%H:%M";
const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

/// Enabled/time pair per reminder. Missing fields fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationSettings {
    pub summary_enabled: bool,
    pub summary_time: String,
    pub reminder_enabled: bool,
    pub reminder_time: String,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            summary_enabled: true,
            summary_time: DEFAULT_SUMMARY_TIME.to_string(),
            reminder_enabled: true,
            reminder_time: DEFAULT_REMINDER_TIME.to_string(),
        }
    }
}

impl NotificationSettings {
    /// Rejects times that are not `HH:MM`.
    pub fn validate(&self) -> Result<()> {
        parse_time_of_day(&self.summary_time)?;
        parse_time_of_day(&self.reminder_time)?;
        Ok(())
    }
}

/// Parses a 24h `HH:MM` time of day.
pub fn parse_time_of_day(raw: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), TIME_OF_DAY_FORMAT).map_err(|_| {
        ValidationError::InvalidInput(format!("Invalid time of day '{}', expected HH:MM", raw))
            .into()
    })
}

/// What the reminders read: today's confirmed total and the last confirmed write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSnapshot {
    pub date_key: String,
    pub today_total: Decimal,
    pub last_write_timestamp: DateTime<Utc>,
}

impl NotificationSnapshot {
    pub fn date_key_for(date: NaiveDate) -> String {
        date.format(DATE_KEY_FORMAT).to_string()
    }

    /// Total for `today`, zero when the snapshot was taken on another day.
    pub fn total_for(&self, today: NaiveDate) -> Decimal {
        if self.date_key == Self::date_key_for(today) {
            self.today_total
        } else {
            Decimal::ZERO
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    /// Not asked yet.
    Default,
    Granted,
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    DailySummary,
    ExpenseReminder,
    Test,
}

impl NotificationKind {
    /// Replacement tag; a newer notification with the same tag replaces the old one.
    pub fn tag(self) -> &'static str {
        match self {
            Self::DailySummary => "daily-summary",
            Self::ExpenseReminder => "expense-reminder",
            Self::Test => "test",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
}

impl Notification {
    pub fn daily_summary(total: Decimal) -> Self {
        Self {
            kind: NotificationKind::DailySummary,
            title: "Daily Spending Summary".to_string(),
            body: format!("Total spent today: £{:.2}", total.round_dp(2)),
        }
    }

    pub fn expense_reminder() -> Self {
        Self {
            kind: NotificationKind::ExpenseReminder,
            title: "Expense Reminder".to_string(),
            body: "Don't forget to log your expenses for today!".to_string(),
        }
    }

    pub fn test() -> Self {
        Self {
            kind: NotificationKind::Test,
            title: "Test Notification".to_string(),
            body: "Notifications are working! You'll receive daily updates.".to_string(),
        }
    }

    pub fn tag(&self) -> &'static str {
        self.kind.tag()
    }
}
