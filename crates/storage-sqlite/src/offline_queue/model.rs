//! Database models for the offline queue.

use chrono::{DateTime, SecondsFormat, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;

use pocketledger_core::sync::QueueEntry;
use pocketledger_core::transactions::Category;

use crate::errors::StorageError;

#[derive(Queryable, Identifiable, Selectable, Debug, Clone)]
#[diesel(primary_key(seq))]
#[diesel(table_name = crate::schema::offline_queue)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct OfflineQueueDB {
    pub seq: i32,
    pub local_id: String,
    pub description: String,
    pub category: String,
    pub amount: String,
    pub date: String,
    pub enqueued_at: String,
    pub claimed_by: Option<String>,
    pub claimed_at: Option<String>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::offline_queue)]
pub struct NewOfflineQueueDB {
    pub local_id: String,
    pub description: String,
    pub category: String,
    pub amount: String,
    pub date: String,
    pub enqueued_at: String,
}

/// Fixed-width UTC timestamps so text comparison matches time order.
pub(crate) fn to_db_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_db_timestamp(field: &str, raw: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::InvalidValue(format!("{} '{}': {}", field, raw, e)))
}

impl From<&QueueEntry> for NewOfflineQueueDB {
    fn from(entry: &QueueEntry) -> Self {
        Self {
            local_id: entry.local_id.clone(),
            description: entry.description.clone(),
            category: entry.category.to_string(),
            amount: entry.amount.to_string(),
            date: to_db_timestamp(entry.date),
            enqueued_at: to_db_timestamp(entry.enqueued_at),
        }
    }
}

impl TryFrom<OfflineQueueDB> for QueueEntry {
    type Error = StorageError;

    fn try_from(row: OfflineQueueDB) -> Result<Self, Self::Error> {
        let amount = Decimal::from_str(&row.amount).map_err(|e| {
            StorageError::InvalidValue(format!("amount '{}' for {}: {}", row.amount, row.local_id, e))
        })?;
        Ok(QueueEntry {
            category: Category::parse_lenient(&row.category),
            amount,
            date: parse_db_timestamp("date", &row.date)?,
            enqueued_at: parse_db_timestamp("enqueued_at", &row.enqueued_at)?,
            local_id: row.local_id,
            description: row.description,
        })
    }
}
