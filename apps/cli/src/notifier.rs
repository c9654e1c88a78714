use async_trait::async_trait;
use tracing::info;

use pocketledger_core::notifications::{Notification, NotificationChannel, PermissionState};
use pocketledger_core::Result;

/// Terminal stand-in for system notifications: always permitted, written to the log.
pub struct LogNotificationChannel;

#[async_trait]
impl NotificationChannel for LogNotificationChannel {
    fn permission(&self) -> PermissionState {
        PermissionState::Granted
    }

    async fn request_permission(&self) -> PermissionState {
        PermissionState::Granted
    }

    async fn show(&self, notification: Notification) -> Result<()> {
        info!(
            tag = notification.kind.tag(),
            "{}: {}", notification.title, notification.body
        );
        Ok(())
    }
}
