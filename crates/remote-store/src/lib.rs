//! HTTP client for the remote expense table (PostgREST-style REST surface).

mod client;
mod error;
mod types;

pub use client::{RemoteStoreClient, RemoteStoreConfig, DEFAULT_TABLE, DEFAULT_TIMEOUT_SECS};
pub use error::{RemoteStoreError, Result};
pub use types::{TransactionPatch, TransactionRow, TransactionRowInsert};
