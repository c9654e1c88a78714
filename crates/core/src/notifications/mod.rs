//! Daily spending summary and expense reminder.

mod memory_store;
mod notification_scheduler;
mod notifications_model;
mod notifications_traits;
mod snapshot_recorder;

pub use memory_store::*;
pub use notification_scheduler::*;
pub use notifications_model::*;
pub use notifications_traits::*;
pub use snapshot_recorder::*;
