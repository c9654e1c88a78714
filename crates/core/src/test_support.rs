//! Shared fakes for unit tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::errors::{Error, Result};
use crate::transactions::{NewTransaction, RemoteStoreTrait, Transaction, TransactionUpdate};

/// In-memory remote store with switchable reachability and rejections.
pub struct MockRemoteStore {
    rows: Mutex<Vec<Transaction>>,
    reachable: AtomicBool,
    reject_inserts: AtomicBool,
    rejected_descriptions: Mutex<HashSet<String>>,
    next_id: AtomicUsize,
    insert_calls: AtomicUsize,
    insert_delay: Mutex<Option<Duration>>,
    idempotent: AtomicBool,
    ids_by_client: Mutex<HashMap<String, String>>,
}

impl MockRemoteStore {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            reachable: AtomicBool::new(true),
            reject_inserts: AtomicBool::new(false),
            rejected_descriptions: Mutex::new(HashSet::new()),
            next_id: AtomicUsize::new(1),
            insert_calls: AtomicUsize::new(0),
            insert_delay: Mutex::new(None),
            idempotent: AtomicBool::new(false),
            ids_by_client: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn set_reject_inserts(&self, reject: bool) {
        self.reject_inserts.store(reject, Ordering::SeqCst);
    }

    pub fn reject_description(&self, description: &str) {
        self.rejected_descriptions
            .lock()
            .unwrap()
            .insert(description.to_string());
    }

    /// Makes every insert wait before answering.
    pub fn set_insert_delay(&self, delay: Duration) {
        *self.insert_delay.lock().unwrap() = Some(delay);
    }

    /// Upserts on the client id: a repeated insert returns the stored row.
    pub fn set_idempotent(&self, idempotent: bool) {
        self.idempotent.store(idempotent, Ordering::SeqCst);
    }

    pub fn seed(&self, transaction: Transaction) {
        self.rows.lock().unwrap().push(transaction);
    }

    /// Rows in insertion order.
    pub fn rows(&self) -> Vec<Transaction> {
        self.rows.lock().unwrap().clone()
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    fn check_reachable(&self) -> Result<()> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::network("connection refused"))
        }
    }
}

#[async_trait]
impl RemoteStoreTrait for MockRemoteStore {
    async fn insert(&self, client_id: &str, transaction: &NewTransaction) -> Result<Transaction> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.insert_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check_reachable()?;
        if self.reject_inserts.load(Ordering::SeqCst)
            || self
                .rejected_descriptions
                .lock()
                .unwrap()
                .contains(&transaction.description)
        {
            return Err(Error::rejected(Some(400), "insert rejected"));
        }
        let idempotent = self.idempotent.load(Ordering::SeqCst);
        if idempotent {
            let known = self.ids_by_client.lock().unwrap().get(client_id).cloned();
            if let Some(id) = known {
                if let Some(row) = self.rows().into_iter().find(|t| t.id == id) {
                    return Ok(row);
                }
            }
        }
        let id = format!("remote-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let confirmed = transaction.clone().into_transaction(id.clone());
        self.rows.lock().unwrap().push(confirmed.clone());
        if idempotent {
            self.ids_by_client
                .lock()
                .unwrap()
                .insert(client_id.to_string(), id);
        }
        Ok(confirmed)
    }

    async fn update(&self, id: &str, fields: &TransactionUpdate) -> Result<()> {
        self.check_reachable()?;
        let mut rows = self.rows.lock().unwrap();
        match rows.iter_mut().find(|t| t.id == id) {
            Some(row) => {
                fields.apply_to(row);
                Ok(())
            }
            None => Err(Error::rejected(Some(404), "not found")),
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.check_reachable()?;
        self.rows.lock().unwrap().retain(|t| t.id != id);
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Transaction>> {
        self.check_reachable()?;
        let mut rows = self.rows();
        rows.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(rows)
    }

    async fn ping(&self) -> Result<()> {
        self.check_reachable()
    }
}
