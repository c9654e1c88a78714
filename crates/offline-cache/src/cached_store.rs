//! Remote store whose listings go through the background cache context.

use async_trait::async_trait;
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;

use pocketledger_core::errors::{Error, Result as CoreResult};
use pocketledger_core::transactions::{
    NewTransaction, RemoteStoreTrait, Transaction, TransactionUpdate,
};
use pocketledger_remote_store::RemoteStoreClient;

use crate::context::CacheConfig;
use crate::error::{CacheError, Result};
use crate::fetcher::HttpFetcher;
use crate::runtime::BackgroundCacheHandle;
use crate::types::{CacheRequest, ResponseSource};

/// Reads are network-first through the context; writes and pings go
/// straight to the client and are never answered from cache.
#[derive(Clone)]
pub struct CachedRemoteStore {
    client: RemoteStoreClient,
    cache: BackgroundCacheHandle,
}

impl CachedRemoteStore {
    pub fn new(client: RemoteStoreClient, cache: BackgroundCacheHandle) -> Self {
        Self { client, cache }
    }

    /// Spawns a context that fetches from the client's origin with its credentials.
    pub fn spawn(client: RemoteStoreClient, timeout: Duration) -> Result<Self> {
        let headers = client
            .headers()
            .map_err(|e| CacheError::Install(e.to_string()))?;
        let fetcher = HttpFetcher::with_headers(client.origin(), timeout, headers)?;
        let config = CacheConfig {
            static_assets: Vec::new(),
            ..CacheConfig::default()
        };
        let cache = BackgroundCacheHandle::spawn(config, Arc::new(fetcher));
        Ok(Self::new(client, cache))
    }

    pub fn cache(&self) -> &BackgroundCacheHandle {
        &self.cache
    }
}

#[async_trait]
impl RemoteStoreTrait for CachedRemoteStore {
    async fn insert(&self, client_id: &str, draft: &NewTransaction) -> CoreResult<Transaction> {
        self.client.insert(client_id, draft).await
    }

    async fn update(&self, id: &str, fields: &TransactionUpdate) -> CoreResult<()> {
        self.client.update(id, fields).await
    }

    async fn delete(&self, id: &str) -> CoreResult<()> {
        self.client.delete(id).await
    }

    async fn list_all(&self) -> CoreResult<Vec<Transaction>> {
        let response = match self.cache.fetch(CacheRequest::get(self.client.list_path())).await {
            Ok(response) => response,
            Err(CacheError::ContextStopped) => {
                warn!("[BackgroundCache] Context stopped, listing from the remote store directly");
                return self.client.list_all().await;
            }
            Err(err) => return Err(Error::network(err.to_string())),
        };
        if response.source == ResponseSource::Cache {
            info!("[BackgroundCache] Remote store unreachable, serving the last loaded list");
        }
        let rows = RemoteStoreClient::rows_from_response(response.status, &response.body)?;
        Ok(rows.into_iter().map(Transaction::from).collect())
    }

    async fn ping(&self) -> CoreResult<()> {
        self.client.ping().await
    }
}
