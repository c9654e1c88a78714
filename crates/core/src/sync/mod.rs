//! Offline-first sync: queue contract, connectivity, coordinator.

mod connectivity;
mod memory_queue;
mod offline_queue_model;
mod sync_coordinator;
mod sync_messages;
mod sync_scheduler;

pub use connectivity::*;
pub use memory_queue::*;
pub use offline_queue_model::*;
pub use sync_coordinator::*;
pub use sync_messages::*;
pub use sync_scheduler::*;

#[cfg(test)]
mod tests;
