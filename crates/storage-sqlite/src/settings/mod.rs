//! Key/value settings table.

mod model;
mod repository;

pub use model::AppSettingDB;
pub use repository::SqliteKeyValueStore;
