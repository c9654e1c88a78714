//! Process-wide connectivity state.
//!
//! Initialised once at startup and never persisted. Transitions are published
//! on a watch channel so the coordinator and the background cache context can
//! react to them.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::transactions::RemoteStoreTrait;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityState {
    Online,
    Offline,
}

impl ConnectivityState {
    pub fn from_online(online: bool) -> Self {
        if online {
            Self::Online
        } else {
            Self::Offline
        }
    }

    pub fn is_online(self) -> bool {
        self == Self::Online
    }
}

/// Cloneable handle to the shared connectivity value.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    sender: Arc<watch::Sender<ConnectivityState>>,
}

impl ConnectivityMonitor {
    pub fn new(initial: ConnectivityState) -> Self {
        let (sender, _) = watch::channel(initial);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn current(&self) -> ConnectivityState {
        *self.sender.borrow()
    }

    pub fn is_online(&self) -> bool {
        self.current().is_online()
    }

    /// Publishes a new state. Returns true when it differs from the previous one.
    pub fn set(&self, state: ConnectivityState) -> bool {
        self.sender.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.sender.subscribe()
    }
}

/// Pings the remote store every `interval` and publishes the result.
pub fn spawn_connectivity_probe(
    monitor: ConnectivityMonitor,
    remote: Arc<dyn RemoteStoreTrait>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let state = match remote.ping().await {
                Ok(()) => ConnectivityState::Online,
                Err(err) => {
                    debug!("[Sync] Connectivity probe failed: {}", err);
                    ConnectivityState::Offline
                }
            };
            if monitor.set(state) {
                info!("[Sync] Connectivity changed: {:?}", state);
            }
            tokio::time::sleep(interval).await;
        }
    })
}
