//! Background Cache Context.
//!
//! Runs as its own task with its own event queue, independent of any UI
//! session. It answers resource requests with a network-first policy for API
//! calls and a cache-first policy for static resources, and relays
//! "connectivity restored" to every session as a replay request.
//! [`CachedRemoteStore`] routes remote-store listings through it so the last
//! loaded list survives going offline.

mod cache_storage;
mod cached_store;
mod context;
mod error;
mod fetcher;
mod runtime;
mod types;

pub use cache_storage::ResponseCache;
pub use cached_store::CachedRemoteStore;
pub use context::{BackgroundCacheContext, CacheConfig, CachePolicy};
pub use error::{CacheError, Result};
pub use fetcher::{HttpFetcher, ResourceFetcher};
pub use runtime::{register_background_cache, BackgroundCacheHandle};
pub use types::{CacheRequest, CachedResponse, ResponseSource};

#[cfg(test)]
mod test_support;
