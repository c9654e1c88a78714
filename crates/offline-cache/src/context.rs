use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::broadcast;

use pocketledger_core::sync::BackgroundMessage;

use crate::cache_storage::ResponseCache;
use crate::error::{CacheError, Result};
use crate::fetcher::ResourceFetcher;
use crate::types::{CacheRequest, CachedResponse};

/// Page served when a navigation fails offline.
pub const OFFLINE_PAGE: &str = "/offline";
pub const DEFAULT_CACHE_VERSION: &str = "v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Remote-store API calls: the network answer wins, cache only when offline.
    NetworkFirst,
    /// Application shell and static assets.
    CacheFirst,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Bumping the version makes `activate` drop every older cache.
    pub version: String,
    pub static_assets: Vec<String>,
    /// Path prefixes handled network-first.
    pub api_prefixes: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            version: DEFAULT_CACHE_VERSION.to_string(),
            static_assets: vec![
                "/".to_string(),
                OFFLINE_PAGE.to_string(),
                "/manifest.json".to_string(),
            ],
            api_prefixes: vec!["/api/".to_string(), "/rest/v1/".to_string()],
        }
    }
}

impl CacheConfig {
    pub fn static_cache_name(&self) -> String {
        format!("pocketledger-static-{}", self.version)
    }

    pub fn dynamic_cache_name(&self) -> String {
        format!("pocketledger-dynamic-{}", self.version)
    }

    pub fn policy_for(&self, request: &CacheRequest) -> CachePolicy {
        let path = request.pathname();
        if self.api_prefixes.iter().any(|p| path.starts_with(p.as_str())) {
            CachePolicy::NetworkFirst
        } else {
            CachePolicy::CacheFirst
        }
    }
}

/// State owned by the context task. Nothing here is shared with sessions;
/// they talk to it through [`crate::BackgroundCacheHandle`].
pub struct BackgroundCacheContext {
    config: CacheConfig,
    cache: ResponseCache,
    fetcher: Arc<dyn ResourceFetcher>,
    clients: broadcast::Sender<BackgroundMessage>,
}

impl BackgroundCacheContext {
    pub fn new(
        config: CacheConfig,
        fetcher: Arc<dyn ResourceFetcher>,
        clients: broadcast::Sender<BackgroundMessage>,
    ) -> Self {
        Self {
            config,
            cache: ResponseCache::new(),
            fetcher,
            clients,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Pre-caches every static asset. All or nothing: one failure fails the install.
    pub async fn install(&mut self) -> Result<usize> {
        info!("[BackgroundCache] Installing, caching static assets");
        let mut fetched = Vec::with_capacity(self.config.static_assets.len());
        for path in &self.config.static_assets {
            let request = CacheRequest::get(path.clone());
            let response = self
                .fetcher
                .fetch(&request)
                .await
                .map_err(|e| CacheError::Install(format!("{}: {}", path, e)))?;
            if !response.is_ok() {
                return Err(CacheError::Install(format!(
                    "{} answered {}",
                    path, response.status
                )));
            }
            fetched.push((request, response));
        }

        let cache_name = self.config.static_cache_name();
        let count = fetched.len();
        for (request, response) in fetched {
            self.cache.put(&cache_name, &request, response);
        }
        Ok(count)
    }

    /// Deletes every cache that is not the current static or dynamic cache.
    pub fn activate(&mut self) -> Vec<String> {
        info!("[BackgroundCache] Activating");
        let keep = [
            self.config.static_cache_name(),
            self.config.dynamic_cache_name(),
        ];
        let stale: Vec<String> = self
            .cache
            .cache_names()
            .into_iter()
            .filter(|name| !keep.contains(name))
            .collect();
        for name in &stale {
            self.cache.delete(name);
            debug!("[BackgroundCache] Deleted old cache {}", name);
        }
        stale
    }

    /// Seeds a cache directly, e.g. with entries carried over from an older version.
    pub fn put(&mut self, cache_name: &str, request: &CacheRequest, response: CachedResponse) {
        self.cache.put(cache_name, request, response);
    }

    pub async fn handle_fetch(&mut self, request: &CacheRequest) -> Result<CachedResponse> {
        match self.config.policy_for(request) {
            CachePolicy::NetworkFirst => self.network_first(request).await,
            CachePolicy::CacheFirst => self.cache_first(request).await,
        }
    }

    fn store_if_cacheable(&mut self, request: &CacheRequest, response: &CachedResponse) {
        if request.is_get() && response.is_ok() {
            let cache_name = self.config.dynamic_cache_name();
            self.cache.put(&cache_name, request, response.clone());
        }
    }

    async fn network_first(&mut self, request: &CacheRequest) -> Result<CachedResponse> {
        match self.fetcher.fetch(request).await {
            Ok(response) => {
                self.store_if_cacheable(request, &response);
                Ok(response)
            }
            Err(err) => {
                // Writes never get a stale answer.
                if !request.is_get() {
                    return Err(err);
                }
                match self.cache.match_request(request) {
                    Some(cached) => {
                        debug!("[BackgroundCache] Offline, serving cached {}", request.path);
                        Ok(cached)
                    }
                    None => Err(err),
                }
            }
        }
    }

    async fn cache_first(&mut self, request: &CacheRequest) -> Result<CachedResponse> {
        if let Some(cached) = self.cache.match_request(request) {
            return Ok(cached);
        }
        match self.fetcher.fetch(request).await {
            Ok(response) => {
                self.store_if_cacheable(request, &response);
                Ok(response)
            }
            Err(err) => {
                if request.navigate {
                    if let Some(offline) = self.cache.match_path(OFFLINE_PAGE) {
                        return Ok(offline);
                    }
                }
                warn!("[BackgroundCache] {} unavailable: {}", request.path, err);
                Err(CacheError::NotCached(request.path.clone()))
            }
        }
    }

    /// Tells every open session to replay its queue. Returns how many were reached.
    pub fn connectivity_restored(&self) -> usize {
        info!("[BackgroundCache] Connectivity restored, asking sessions to sync");
        self.clients
            .send(BackgroundMessage::SyncTransactions)
            .unwrap_or(0)
    }
}
