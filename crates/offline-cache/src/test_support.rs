//! Shared fakes for unit tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{CacheError, Result};
use crate::fetcher::ResourceFetcher;
use crate::types::{CacheRequest, CachedResponse, ResponseSource};

/// Serves fixed bodies while online; fails every request while offline.
pub struct FakeFetcher {
    pub online: AtomicBool,
    pub calls: AtomicUsize,
    pub pages: Mutex<HashMap<String, (u16, String)>>,
}

impl FakeFetcher {
    pub fn new(pages: &[(&str, u16, &str)]) -> Arc<Self> {
        Arc::new(Self {
            online: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
            pages: Mutex::new(
                pages
                    .iter()
                    .map(|(p, s, b)| (p.to_string(), (*s, b.to_string())))
                    .collect(),
            ),
        })
    }

    /// The application shell: `/`, `/offline` and the manifest.
    pub fn shell() -> Arc<Self> {
        Self::new(&[
            ("/", 200, "<app>"),
            ("/offline", 200, "<offline>"),
            ("/manifest.json", 200, "{}"),
        ])
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn set_page(&self, path: &str, status: u16, body: &str) {
        self.pages
            .lock()
            .unwrap()
            .insert(path.to_string(), (status, body.to_string()));
    }
}

#[async_trait]
impl ResourceFetcher for FakeFetcher {
    async fn fetch(&self, request: &CacheRequest) -> Result<CachedResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.online.load(Ordering::SeqCst) {
            return Err(CacheError::Network("offline".to_string()));
        }
        let (status, body) = self
            .pages
            .lock()
            .unwrap()
            .get(&request.path)
            .cloned()
            .unwrap_or((404, "not found".to_string()));
        Ok(CachedResponse {
            status,
            content_type: None,
            body: body.into_bytes(),
            source: ResponseSource::Network,
        })
    }
}
