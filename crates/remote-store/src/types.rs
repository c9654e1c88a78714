//! Wire shapes of the remote expense table.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;

use pocketledger_core::transactions::{Category, NewTransaction, Transaction, TransactionUpdate};

/// Row as returned by the remote store. Ids and amounts arrive as numbers or
/// strings depending on the column types.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionRow {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub description: String,
    pub category: String,
    #[serde(deserialize_with = "decimal_from_json")]
    pub amount: Decimal,
    #[serde(deserialize_with = "flexible_date")]
    pub date: DateTime<Utc>,
}

impl From<TransactionRow> for Transaction {
    fn from(row: TransactionRow) -> Self {
        Transaction {
            id: row.id,
            description: row.description,
            category: Category::parse_lenient(&row.category),
            amount: row.amount,
            date: row.date,
        }
    }
}

/// Body of an insert. Amounts are sent as decimal strings to keep them exact.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionRowInsert {
    pub description: String,
    pub category: String,
    pub amount: String,
    pub date: DateTime<Utc>,
}

impl From<&NewTransaction> for TransactionRowInsert {
    fn from(draft: &NewTransaction) -> Self {
        Self {
            description: draft.description.clone(),
            category: draft.category.to_string(),
            amount: draft.amount.to_string(),
            date: draft.date,
        }
    }
}

/// Body of a partial update; absent fields are left untouched remotely.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TransactionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
}

impl From<&TransactionUpdate> for TransactionPatch {
    fn from(update: &TransactionUpdate) -> Self {
        Self {
            description: update.description.clone(),
            category: update.category.map(|c| c.to_string()),
            amount: update.amount.map(|a| a.to_string()),
            date: update.date,
        }
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!("unexpected id {}", other))),
    }
}

fn decimal_from_json<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
    let raw = match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        other => return Err(D::Error::custom(format!("unexpected amount {}", other))),
    };
    Decimal::from_str(&raw).map_err(D::Error::custom)
}

/// Accepts RFC 3339, a timestamp without zone, or a bare date. Zoneless
/// values are taken as UTC.
fn flexible_date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_flexible_date(&raw)
        .ok_or_else(|| D::Error::custom(format!("unrecognized date '{}'", raw)))
}

fn parse_flexible_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
