use async_trait::async_trait;

use super::transactions_model::{NewTransaction, Transaction, TransactionUpdate};
use crate::errors::Result;

/// Contract for the remote store holding confirmed transactions.
///
/// The remote store is authoritative for identity: the id returned by
/// `insert` may differ from any locally generated id.
#[async_trait]
pub trait RemoteStoreTrait: Send + Sync {
    /// Inserts a transaction. `client_id` is the locally generated id of the
    /// user action, which implementations may use as an idempotency key.
    async fn insert(&self, client_id: &str, transaction: &NewTransaction) -> Result<Transaction>;

    async fn update(&self, id: &str, fields: &TransactionUpdate) -> Result<()>;

    async fn delete(&self, id: &str) -> Result<()>;

    /// Lists every confirmed transaction, newest `date` first.
    async fn list_all(&self) -> Result<Vec<Transaction>>;

    /// Cheap reachability check used by the connectivity probe.
    async fn ping(&self) -> Result<()>;
}
