//! In-process alert buses

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::info;

use super::{AlertBus, NotificationAlert, PublishError};

/// Writes every alert to the log; used when no broker is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct LogBus;

#[async_trait]
impl AlertBus for LogBus {
    async fn publish(&self, alert: &NotificationAlert) -> Result<(), PublishError> {
        info!(
            monitor_id = alert.monitor_id,
            notification_id = alert.notification_id,
            success = alert.success,
            "{}",
            alert.message
        );
        Ok(())
    }
}

/// Fan-out over a `tokio::sync::broadcast` channel
///
/// Publishing with no live subscriber is a [`PublishError::NoSubscribers`].
#[derive(Debug, Clone)]
pub struct BroadcastBus {
    sender: broadcast::Sender<NotificationAlert>,
}

impl BroadcastBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotificationAlert> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl AlertBus for BroadcastBus {
    async fn publish(&self, alert: &NotificationAlert) -> Result<(), PublishError> {
        self.sender
            .send(alert.clone())
            .map(|_| ())
            .map_err(|_| PublishError::NoSubscribers)
    }
}
