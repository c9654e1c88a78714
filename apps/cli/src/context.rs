use log::{info, warn};
use std::sync::Arc;

use pocketledger_core::notifications::{
    KeyValueStoreTrait, MemoryKeyValueStore, NotificationScheduler, SnapshotRecorder,
};
use pocketledger_core::sync::{
    ConnectivityMonitor, ConnectivityState, OfflineQueueTrait, SyncCoordinator,
};
use pocketledger_core::transactions::{OptimisticTransactionStore, RemoteStoreTrait};
use pocketledger_offline_cache::{BackgroundCacheHandle, CachedRemoteStore};
use pocketledger_remote_store::RemoteStoreClient;
use pocketledger_storage_sqlite::{LazyOfflineQueue, SqliteStorage};

use crate::config::AppConfig;
use crate::notifier::LogNotificationChannel;

/// Queue and key/value store of this installation.
pub struct LocalStorage {
    pub offline_queue: Arc<dyn OfflineQueueTrait>,
    pub key_value_store: Arc<dyn KeyValueStoreTrait>,
}

impl LocalStorage {
    /// Opens the local database. When it cannot be opened, settings live in
    /// memory and the queue retries on first use before degrading as well.
    pub fn open(config: &AppConfig) -> anyhow::Result<Self> {
        let app_data_dir = config.app_data_dir()?;
        let claim_ttl = config.claim_ttl();

        let local = match SqliteStorage::open(&app_data_dir) {
            Ok(storage) => {
                let key_value_store = Arc::new(storage.key_value_store());
                let queue = LazyOfflineQueue::with_opener(
                    move || {
                        let queue = storage.offline_queue().with_claim_ttl(claim_ttl);
                        Ok(Arc::new(queue) as Arc<dyn OfflineQueueTrait>)
                    },
                    claim_ttl,
                );
                Self {
                    offline_queue: Arc::new(queue),
                    key_value_store,
                }
            }
            Err(err) => {
                warn!(
                    "Local database at {} unavailable, settings are kept in memory: {}",
                    app_data_dir, err
                );
                Self {
                    offline_queue: Arc::new(LazyOfflineQueue::new(app_data_dir, claim_ttl)),
                    key_value_store: Arc::new(MemoryKeyValueStore::new()),
                }
            }
        };
        Ok(local)
    }
}

pub struct ServiceContext {
    pub remote_store: Arc<dyn RemoteStoreTrait>,
    /// Context answering remote-store listings; absent when it could not start.
    pub api_cache: Option<BackgroundCacheHandle>,
    pub offline_queue: Arc<dyn OfflineQueueTrait>,
    pub connectivity: ConnectivityMonitor,
    pub sync_coordinator: Arc<SyncCoordinator>,
    pub notification_scheduler: Arc<NotificationScheduler>,
}

impl ServiceContext {
    /// Wires storage, the remote client and the sync services together.
    ///
    /// Connectivity starts from a single ping of the remote store.
    pub async fn initialize(config: &AppConfig) -> anyhow::Result<Self> {
        let local = LocalStorage::open(config)?;
        let client = RemoteStoreClient::new(config.remote_store_config()?)?;
        let (remote_store, api_cache): (Arc<dyn RemoteStoreTrait>, Option<BackgroundCacheHandle>) =
            match CachedRemoteStore::spawn(client.clone(), config.request_timeout()) {
                Ok(cached) => {
                    let handle = cached.cache().clone();
                    (Arc::new(cached) as Arc<dyn RemoteStoreTrait>, Some(handle))
                }
                Err(err) => {
                    warn!("Listings will not be cached for offline use: {}", err);
                    (Arc::new(client) as Arc<dyn RemoteStoreTrait>, None)
                }
            };

        let online = match remote_store.ping().await {
            Ok(()) => true,
            Err(err) => {
                info!("Remote store unreachable, starting offline: {}", err);
                false
            }
        };
        let connectivity = ConnectivityMonitor::new(ConnectivityState::from_online(online));

        let transaction_store = Arc::new(OptimisticTransactionStore::new(Arc::clone(
            &remote_store,
        )));
        let sync_coordinator = Arc::new(SyncCoordinator::new(
            transaction_store,
            Arc::clone(&local.offline_queue),
            Arc::clone(&remote_store),
            connectivity.clone(),
        ));
        sync_coordinator.add_listener(Arc::new(SnapshotRecorder::new(Arc::clone(
            &local.key_value_store,
        ))));

        let notification_scheduler = Arc::new(notification_scheduler(&local));

        Ok(Self {
            remote_store,
            api_cache,
            offline_queue: local.offline_queue,
            connectivity,
            sync_coordinator,
            notification_scheduler,
        })
    }

    pub fn sync_coordinator(&self) -> Arc<SyncCoordinator> {
        Arc::clone(&self.sync_coordinator)
    }

    pub fn remote_store(&self) -> Arc<dyn RemoteStoreTrait> {
        Arc::clone(&self.remote_store)
    }

    pub fn offline_queue(&self) -> Arc<dyn OfflineQueueTrait> {
        Arc::clone(&self.offline_queue)
    }

    pub fn notification_scheduler(&self) -> Arc<NotificationScheduler> {
        Arc::clone(&self.notification_scheduler)
    }
}

pub fn notification_scheduler(local: &LocalStorage) -> NotificationScheduler {
    NotificationScheduler::new(
        Arc::new(LogNotificationChannel),
        Arc::clone(&local.key_value_store),
    )
}
