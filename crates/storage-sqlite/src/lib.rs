//! SQLite storage for PocketLedger: the Durable Local Queue and a small
//! key/value store for settings and notification snapshots.

pub mod db;
pub mod errors;
pub mod offline_queue;
pub mod schema;
pub mod settings;

use log::info;
use std::sync::Arc;

use pocketledger_core::errors::Result;

use db::{create_pool, init, run_migrations, spawn_writer, DbPool, WriteHandle};

pub use errors::StorageError;
pub use offline_queue::{LazyOfflineQueue, OfflineQueueRepository};
pub use settings::SqliteKeyValueStore;

/// Opened database: connection pool plus the single writer.
#[derive(Clone)]
pub struct SqliteStorage {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl SqliteStorage {
    /// Creates the data directory and database if needed, then migrates.
    pub fn open(app_data_dir: &str) -> Result<Self> {
        let db_path = init(app_data_dir)?;
        run_migrations(&db_path)?;
        let pool = create_pool(&db_path)?;
        let writer = spawn_writer(pool.as_ref().clone());
        info!("Opened local database at {}", db_path);
        Ok(Self { pool, writer })
    }

    pub fn pool(&self) -> Arc<DbPool> {
        Arc::clone(&self.pool)
    }

    pub fn writer(&self) -> WriteHandle {
        self.writer.clone()
    }

    pub fn offline_queue(&self) -> OfflineQueueRepository {
        OfflineQueueRepository::new(self.pool(), self.writer())
    }

    pub fn key_value_store(&self) -> SqliteKeyValueStore {
        SqliteKeyValueStore::new(self.pool(), self.writer())
    }
}
