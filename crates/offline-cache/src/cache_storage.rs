//! Named response caches, owned by the context task.

use std::collections::BTreeMap;

use crate::types::{CacheRequest, CachedResponse};

#[derive(Debug, Default)]
pub struct ResponseCache {
    caches: BTreeMap<String, BTreeMap<String, CachedResponse>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a GET response under its path. Other methods are ignored.
    pub fn put(&mut self, cache_name: &str, request: &CacheRequest, response: CachedResponse) {
        if !request.is_get() {
            return;
        }
        self.caches
            .entry(cache_name.to_string())
            .or_default()
            .insert(request.path.clone(), response);
    }

    /// Looks the request up in every cache.
    pub fn match_request(&self, request: &CacheRequest) -> Option<CachedResponse> {
        if !request.is_get() {
            return None;
        }
        self.match_path(&request.path)
    }

    pub fn match_path(&self, path: &str) -> Option<CachedResponse> {
        self.caches
            .values()
            .find_map(|entries| entries.get(path))
            .map(CachedResponse::from_cache)
    }

    pub fn cache_names(&self) -> Vec<String> {
        self.caches.keys().cloned().collect()
    }

    pub fn delete(&mut self, cache_name: &str) -> bool {
        self.caches.remove(cache_name).is_some()
    }

    pub fn len(&self, cache_name: &str) -> usize {
        self.caches.get(cache_name).map_or(0, BTreeMap::len)
    }
}
