//! Single writer thread.
//!
//! Every write runs on one dedicated connection inside an immediate
//! transaction, so writes from this process never interleave. Reads go
//! through the pool.

use diesel::sqlite::SqliteConnection;
use diesel::Connection;
use log::error;
use tokio::sync::{mpsc, oneshot};

use pocketledger_core::errors::{Error, Result};

use super::DbPool;
use crate::errors::StorageError;

type Job = Box<dyn FnOnce(&mut SqliteConnection) + Send + 'static>;

#[derive(Clone)]
pub struct WriteHandle {
    tx: mpsc::UnboundedSender<Job>,
}

/// Bridges diesel's transaction error with the closure's own error.
enum TxError {
    Diesel(diesel::result::Error),
    App(Error),
}

impl From<diesel::result::Error> for TxError {
    fn from(err: diesel::result::Error) -> Self {
        TxError::Diesel(err)
    }
}

pub fn spawn_writer(pool: DbPool) -> WriteHandle {
    let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
    let spawned = std::thread::Builder::new()
        .name("pocketledger-db-writer".to_string())
        .spawn(move || {
            let mut conn = match pool.get() {
                Ok(conn) => conn,
                Err(err) => {
                    error!("Database writer could not get a connection: {}", err);
                    return;
                }
            };
            while let Some(job) = rx.blocking_recv() {
                job(&mut *conn);
            }
        });
    if let Err(err) = spawned {
        error!("Failed to start database writer thread: {}", err);
    }
    WriteHandle { tx }
}

impl WriteHandle {
    /// Runs `job` in a write transaction. An `Err` from `job` rolls it back.
    pub async fn exec<T, F>(&self, job: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel::<Result<T>>();
        let boxed: Job = Box::new(move |conn| {
            let result = conn
                .immediate_transaction::<T, TxError, _>(|tx_conn| job(tx_conn).map_err(TxError::App))
                .map_err(|err| match err {
                    TxError::App(e) => e,
                    TxError::Diesel(e) => StorageError::from(e).into(),
                });
            // The caller may have gone away; nothing to do then.
            let _ = reply_tx.send(result);
        });
        self.tx
            .send(boxed)
            .map_err(|_| Error::storage("Database writer is not running"))?;
        reply_rx
            .await
            .map_err(|_| Error::storage("Database writer dropped the request"))?
    }
}
