//! Expense transaction domain models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::{Result, ValidationError};

/// Spending category. Unknown names fall back to [`Category::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    Food,
    Transport,
    Housing,
    Utilities,
    Entertainment,
    Health,
    Shopping,
    Other,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Food,
        Category::Transport,
        Category::Housing,
        Category::Utilities,
        Category::Entertainment,
        Category::Health,
        Category::Shopping,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Food => "Food",
            Category::Transport => "Transport",
            Category::Housing => "Housing",
            Category::Utilities => "Utilities",
            Category::Entertainment => "Entertainment",
            Category::Health => "Health",
            Category::Shopping => "Shopping",
            Category::Other => "Other",
        }
    }

    /// Lenient parse used for remote rows and queued records.
    pub fn parse_lenient(value: &str) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == value.trim())
            .unwrap_or(Category::Other)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::parse_lenient(s))
    }
}

impl From<String> for Category {
    fn from(value: String) -> Self {
        Self::parse_lenient(&value)
    }
}

impl From<Category> for String {
    fn from(value: Category) -> Self {
        value.as_str().to_string()
    }
}

/// A transaction as shown to the user, either confirmed or tentative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub description: String,
    pub category: Category,
    pub amount: Decimal,
    pub date: DateTime<Utc>,
}

/// A validated draft for a transaction that has no identity yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTransaction {
    pub description: String,
    pub category: Category,
    pub amount: Decimal,
    pub date: DateTime<Utc>,
}

impl NewTransaction {
    /// Builds a draft, trimming the description and rounding the amount to cents.
    pub fn new(
        description: impl Into<String>,
        category: Category,
        amount: Decimal,
        date: DateTime<Utc>,
    ) -> Result<Self> {
        let description = description.into().trim().to_string();
        if description.is_empty() {
            return Err(ValidationError::MissingField("description".to_string()).into());
        }
        let amount = amount.round_dp(2);
        if amount <= Decimal::ZERO {
            return Err(ValidationError::InvalidInput(format!(
                "amount must be greater than zero, got {}",
                amount
            ))
            .into());
        }
        Ok(Self {
            description,
            category,
            amount,
            date,
        })
    }

    /// Parses a user-entered amount, accepting a comma as decimal separator.
    pub fn parse_amount(raw: &str) -> Result<Decimal> {
        let normalized = raw.trim().replace(',', ".");
        Decimal::from_str(&normalized).map_err(|_| {
            ValidationError::InvalidInput(format!("'{}' is not a valid amount", raw)).into()
        })
    }

    pub fn into_transaction(self, id: impl Into<String>) -> Transaction {
        Transaction {
            id: id.into(),
            description: self.description,
            category: self.category,
            amount: self.amount,
            date: self.date,
        }
    }
}

/// Partial update for an existing transaction; `None` fields are untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
}

impl TransactionUpdate {
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.category.is_none()
            && self.amount.is_none()
            && self.date.is_none()
    }

    pub fn apply_to(&self, transaction: &mut Transaction) {
        if let Some(description) = &self.description {
            transaction.description = description.clone();
        }
        if let Some(category) = self.category {
            transaction.category = category;
        }
        if let Some(amount) = self.amount {
            transaction.amount = amount;
        }
        if let Some(date) = self.date {
            transaction.date = date;
        }
    }
}
