//! Domain core for the PocketLedger expense tracker: transactions, the
//! optimistic view, offline sync and daily notifications.

pub mod errors;
pub mod notifications;
pub mod sync;
pub mod transactions;

pub use errors::{Error, Result};

#[cfg(test)]
mod test_support;
