//! The context's own task and the handle sessions use to reach it.

use log::{debug, error, info};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::{AbortHandle, JoinHandle};

use pocketledger_core::sync::{BackgroundMessage, ConnectivityMonitor};

use crate::context::{BackgroundCacheContext, CacheConfig};
use crate::error::{CacheError, Result};
use crate::fetcher::ResourceFetcher;
use crate::types::{CacheRequest, CachedResponse};

const EVENT_QUEUE_CAPACITY: usize = 64;
const CLIENT_CHANNEL_CAPACITY: usize = 16;

enum CacheEvent {
    Install(oneshot::Sender<Result<usize>>),
    Activate(oneshot::Sender<Vec<String>>),
    Fetch {
        request: CacheRequest,
        reply: oneshot::Sender<Result<CachedResponse>>,
    },
    ConnectivityRestored,
}

/// Cloneable handle to a running context. Events are processed one at a
/// time, in arrival order.
#[derive(Clone)]
pub struct BackgroundCacheHandle {
    events: mpsc::Sender<CacheEvent>,
    clients: broadcast::Sender<BackgroundMessage>,
    abort: AbortHandle,
}

impl BackgroundCacheHandle {
    pub fn spawn(config: CacheConfig, fetcher: Arc<dyn ResourceFetcher>) -> Self {
        let (clients, _) = broadcast::channel(CLIENT_CHANNEL_CAPACITY);
        let (events, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let context = BackgroundCacheContext::new(config, fetcher, clients.clone());
        let task = tokio::spawn(run_context(context, rx));
        Self {
            events,
            clients,
            abort: task.abort_handle(),
        }
    }

    async fn request<T>(&self, event: impl FnOnce(oneshot::Sender<T>) -> CacheEvent) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.events
            .send(event(reply))
            .await
            .map_err(|_| CacheError::ContextStopped)?;
        response.await.map_err(|_| CacheError::ContextStopped)
    }

    pub async fn install(&self) -> Result<usize> {
        self.request(CacheEvent::Install).await?
    }

    pub async fn activate(&self) -> Result<Vec<String>> {
        self.request(CacheEvent::Activate).await
    }

    pub async fn fetch(&self, request: CacheRequest) -> Result<CachedResponse> {
        self.request(|reply| CacheEvent::Fetch { request, reply })
            .await?
    }

    /// Platform signal that the network is back.
    pub async fn connectivity_restored(&self) -> Result<()> {
        self.events
            .send(CacheEvent::ConnectivityRestored)
            .await
            .map_err(|_| CacheError::ContextStopped)
    }

    /// Channel on which a session receives messages from the context.
    pub fn subscribe_clients(&self) -> broadcast::Receiver<BackgroundMessage> {
        self.clients.subscribe()
    }

    /// Forwards every offline to online transition of `monitor` to the context.
    pub fn follow_connectivity(&self, monitor: &ConnectivityMonitor) -> JoinHandle<()> {
        let mut states = monitor.subscribe();
        let mut last = *states.borrow();
        let handle = self.clone();
        tokio::spawn(async move {
            while states.changed().await.is_ok() {
                let current = *states.borrow_and_update();
                let restored = !last.is_online() && current.is_online();
                last = current;
                if restored && handle.connectivity_restored().await.is_err() {
                    break;
                }
            }
        })
    }

    pub fn shutdown(&self) {
        self.abort.abort();
    }

    pub fn is_running(&self) -> bool {
        !self.events.is_closed()
    }
}

async fn run_context(mut context: BackgroundCacheContext, mut events: mpsc::Receiver<CacheEvent>) {
    while let Some(event) = events.recv().await {
        // A dropped reply receiver just means the requester stopped waiting.
        match event {
            CacheEvent::Install(reply) => {
                let _ = reply.send(context.install().await);
            }
            CacheEvent::Activate(reply) => {
                let _ = reply.send(context.activate());
            }
            CacheEvent::Fetch { request, reply } => {
                let _ = reply.send(context.handle_fetch(&request).await);
            }
            CacheEvent::ConnectivityRestored => {
                let reached = context.connectivity_restored();
                debug!("[BackgroundCache] Sync request sent to {} sessions", reached);
            }
        }
    }
    debug!("[BackgroundCache] Event queue closed, context stopped");
}

/// Starts the context, pre-caches the shell and drops stale caches.
///
/// Returns `None` when installation fails; the application then runs
/// without offline resource caching.
pub async fn register_background_cache(
    config: CacheConfig,
    fetcher: Arc<dyn ResourceFetcher>,
) -> Option<BackgroundCacheHandle> {
    let handle = BackgroundCacheHandle::spawn(config, fetcher);
    match handle.install().await {
        Ok(count) => info!("[BackgroundCache] Registered, {} static assets cached", count),
        Err(err) => {
            error!(
                "[BackgroundCache] Registration failed, continuing without offline caching: {}",
                err
            );
            handle.shutdown();
            return None;
        }
    }
    match handle.activate().await {
        Ok(deleted) if !deleted.is_empty() => {
            info!("[BackgroundCache] Removed old caches: {:?}", deleted)
        }
        Ok(_) => {}
        Err(err) => error!("[BackgroundCache] Activation failed: {}", err),
    }
    Some(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeFetcher;
    use crate::types::ResponseSource;
    use pocketledger_core::sync::ConnectivityState;
    use std::time::Duration;

    #[tokio::test]
    async fn registered_context_serves_shell_offline() {
        let fetcher = FakeFetcher::shell();
        let handle = register_background_cache(CacheConfig::default(), fetcher.clone())
            .await
            .unwrap();
        fetcher.set_online(false);

        let page = handle
            .fetch(CacheRequest::navigation("/settings"))
            .await
            .unwrap();
        assert_eq!(page.source, ResponseSource::Cache);
        assert_eq!(page.body, b"<offline>".to_vec());
        assert!(handle.is_running());
    }

    #[tokio::test]
    async fn failed_registration_degrades_to_no_caching() {
        let fetcher = FakeFetcher::shell();
        fetcher.set_online(false);
        assert!(register_background_cache(CacheConfig::default(), fetcher)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn reconnect_is_relayed_to_every_session() {
        let handle = BackgroundCacheHandle::spawn(CacheConfig::default(), FakeFetcher::shell());
        let mut tab_one = handle.subscribe_clients();
        let mut tab_two = handle.subscribe_clients();
        let monitor = ConnectivityMonitor::new(ConnectivityState::Offline);
        let follower = handle.follow_connectivity(&monitor);

        monitor.set(ConnectivityState::Online);

        for tab in [&mut tab_one, &mut tab_two] {
            let message = tokio::time::timeout(Duration::from_secs(5), tab.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(message, BackgroundMessage::SyncTransactions);
        }
        follower.abort();
    }

    #[tokio::test]
    async fn stopped_context_reports_it() {
        let handle = BackgroundCacheHandle::spawn(CacheConfig::default(), FakeFetcher::shell());
        handle.shutdown();

        let result = handle.fetch(CacheRequest::get("/")).await;
        assert!(matches!(result, Err(CacheError::ContextStopped)));
    }
}
