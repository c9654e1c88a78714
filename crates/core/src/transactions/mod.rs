//! Transactions domain: models, remote store contract and the optimistic store.

mod optimistic_store;
mod transactions_model;
mod transactions_traits;

pub use optimistic_store::*;
pub use transactions_model::*;
pub use transactions_traits::*;
