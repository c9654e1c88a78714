//! SQLite-backed Durable Local Queue.

mod lazy_queue;
mod model;
mod repository;

pub use lazy_queue::LazyOfflineQueue;
pub use model::{NewOfflineQueueDB, OfflineQueueDB};
pub use repository::OfflineQueueRepository;
