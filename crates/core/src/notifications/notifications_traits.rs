use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::notifications_model::{Notification, PermissionState};
use crate::errors::Result;

/// Simple non-transactional key/value storage for small JSON documents.
#[async_trait]
pub trait KeyValueStoreTrait: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Reads and deserializes a JSON value stored under `key`.
pub fn get_json<T: DeserializeOwned>(store: &dyn KeyValueStoreTrait, key: &str) -> Result<Option<T>> {
    match store.get(key)? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

pub async fn set_json<T: Serialize + Sync>(
    store: &dyn KeyValueStoreTrait,
    key: &str,
    value: &T,
) -> Result<()> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw).await
}

/// Host-provided, permission-gated notification delivery.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn permission(&self) -> PermissionState;

    /// Shows the platform prompt. Returns the resulting state.
    async fn request_permission(&self) -> PermissionState;

    async fn show(&self, notification: Notification) -> Result<()>;
}
