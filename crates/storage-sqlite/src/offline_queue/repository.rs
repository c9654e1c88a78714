use async_trait::async_trait;
use chrono::{Duration, Utc};
use diesel::prelude::*;
use diesel::sql_types::Text;
use diesel::sqlite::SqliteConnection;
use log::{debug, warn};
use std::sync::Arc;

use pocketledger_core::errors::Result;
use pocketledger_core::sync::{OfflineQueueTrait, QueueEntry, QUEUE_CLAIM_TTL_SECS};

use super::model::{to_db_timestamp, NewOfflineQueueDB, OfflineQueueDB};
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::schema::offline_queue;

/// Claim succeeds when the row is free, already ours, or held by a stale claim.
const CLAIM_SQL: &str = "UPDATE offline_queue \
     SET claimed_by = ?, claimed_at = ? \
     WHERE local_id = ? \
       AND (claimed_by IS NULL OR claimed_by = ? OR claimed_at IS NULL OR claimed_at < ?)";

pub struct OfflineQueueRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
    claim_ttl: Duration,
}

impl OfflineQueueRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self {
            pool,
            writer,
            claim_ttl: Duration::seconds(QUEUE_CLAIM_TTL_SECS),
        }
    }

    pub fn with_claim_ttl(mut self, claim_ttl: Duration) -> Self {
        self.claim_ttl = claim_ttl;
        self
    }

    pub fn list_pending_impl(&self) -> Result<Vec<QueueEntry>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = offline_queue::table
            .order(offline_queue::seq.asc())
            .select(OfflineQueueDB::as_select())
            .load::<OfflineQueueDB>(&mut conn)
            .map_err(StorageError::from)?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let local_id = row.local_id.clone();
            match QueueEntry::try_from(row) {
                Ok(entry) => entries.push(entry),
                // Left in place so nothing is deleted on a bad read.
                Err(err) => warn!("[OfflineQueue] Skipping unreadable entry {}: {}", local_id, err),
            }
        }
        Ok(entries)
    }
}

fn claim_row(
    conn: &mut SqliteConnection,
    local_id: &str,
    owner: &str,
    claim_ttl: Duration,
) -> Result<bool> {
    let now = Utc::now();
    let affected = diesel::sql_query(CLAIM_SQL)
        .bind::<Text, _>(owner)
        .bind::<Text, _>(to_db_timestamp(now))
        .bind::<Text, _>(local_id)
        .bind::<Text, _>(owner)
        .bind::<Text, _>(to_db_timestamp(now - claim_ttl))
        .execute(conn)
        .map_err(StorageError::from)?;
    Ok(affected == 1)
}

#[async_trait]
impl OfflineQueueTrait for OfflineQueueRepository {
    async fn enqueue(&self, entry: QueueEntry) -> Result<()> {
        let row = NewOfflineQueueDB::from(&entry);
        self.writer
            .exec(move |conn| {
                diesel::insert_into(offline_queue::table)
                    .values(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await?;
        debug!("[OfflineQueue] Enqueued {}", entry.local_id);
        Ok(())
    }

    async fn list_pending(&self) -> Result<Vec<QueueEntry>> {
        self.list_pending_impl()
    }

    async fn claim(&self, local_id: &str, owner: &str) -> Result<bool> {
        let local_id = local_id.to_string();
        let owner = owner.to_string();
        let claim_ttl = self.claim_ttl;
        self.writer
            .exec(move |conn| claim_row(conn, &local_id, &owner, claim_ttl))
            .await
    }

    async fn release(&self, local_id: &str, owner: &str) -> Result<()> {
        let local_id = local_id.to_string();
        let owner = owner.to_string();
        self.writer
            .exec(move |conn| {
                diesel::update(
                    offline_queue::table
                        .filter(offline_queue::local_id.eq(local_id))
                        .filter(offline_queue::claimed_by.eq(owner)),
                )
                .set((
                    offline_queue::claimed_by.eq(None::<String>),
                    offline_queue::claimed_at.eq(None::<String>),
                ))
                .execute(conn)
                .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    async fn remove(&self, local_id: &str) -> Result<()> {
        let local_id = local_id.to_string();
        let removed = self
            .writer
            .exec(move |conn| {
                let affected = diesel::delete(
                    offline_queue::table.filter(offline_queue::local_id.eq(local_id)),
                )
                .execute(conn)
                .map_err(StorageError::from)?;
                Ok(affected)
            })
            .await?;
        if removed == 0 {
            debug!("[OfflineQueue] Remove found nothing to delete");
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let removed = self
            .writer
            .exec(|conn| {
                let removed = diesel::delete(offline_queue::table)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(removed)
            })
            .await?;
        warn!("[OfflineQueue] Cleared {} queued entries", removed);
        Ok(())
    }

    async fn is_durable(&self) -> bool {
        true
    }
}
