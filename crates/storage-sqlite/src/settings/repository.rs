use async_trait::async_trait;
use diesel::prelude::*;
use std::sync::Arc;

use pocketledger_core::errors::Result;
use pocketledger_core::notifications::KeyValueStoreTrait;

use super::model::AppSettingDB;
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::schema::app_settings::dsl::*;

pub struct SqliteKeyValueStore {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl SqliteKeyValueStore {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl KeyValueStoreTrait for SqliteKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = get_connection(&self.pool)?;
        let value = app_settings
            .find(key)
            .select(setting_value)
            .first::<String>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let row = AppSettingDB {
            setting_key: key.to_string(),
            setting_value: value.to_string(),
        };
        self.writer
            .exec(move |conn| {
                diesel::insert_into(app_settings)
                    .values(&row)
                    .on_conflict(setting_key)
                    .do_update()
                    .set(setting_value.eq(&row.setting_value))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    use crate::SqliteStorage;

    #[tokio::test]
    async fn set_overwrites_and_get_reads_back() {
        let dir = tempdir().unwrap();
        let storage = SqliteStorage::open(&dir.path().to_string_lossy()).unwrap();
        let store = storage.key_value_store();

        assert_eq!(store.get("notificationSettings").unwrap(), None);

        store.set("notificationSettings", r#"{"summaryEnabled":false}"#).await.unwrap();
        store.set("notificationSettings", r#"{"summaryEnabled":true}"#).await.unwrap();

        assert_eq!(
            store.get("notificationSettings").unwrap().as_deref(),
            Some(r#"{"summaryEnabled":true}"#)
        );
    }
}
