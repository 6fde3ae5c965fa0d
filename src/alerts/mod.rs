//! Alert emission on status transitions
//!
//! The tracker hands every `WentDown`/`Recovered` transition to the
//! [`AlertEmitter`], which fans it out as one [`NotificationAlert`] per
//! notification target registered for the monitor.
//!
//! ```text
//! StatusTracker ──transition──▶ AlertEmitter ──NotificationAlert──▶ AlertBus
//!                                    │                                │
//!                          load_notification_targets         LogBus / BroadcastBus
//!                                                            / WebhookBus
//! ```
//!
//! Delivery is fire-and-forget and at-least-once: a failed publish is logged
//! and never reverts the status already persisted. Consumers must be
//! idempotent. Each publish is bounded by the emitter's timeout, so a stalled
//! bus only delays the check that produced the alert and never holds it.

pub mod bus;
pub mod webhook;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument, warn};

use crate::model::{Environment, Monitor, MonitorId, Outcome, Region};
use crate::storage::StorageBackend;

pub use bus::{BroadcastBus, LogBus};
pub use webhook::WebhookBus;

/// Event published to the message bus for a single notification target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAlert {
    pub notification_id: i64,
    pub monitor_id: MonitorId,
    pub message: String,
    pub reason_phrase: Option<String>,
    pub status_code: Option<u16>,
    pub timestamp: DateTime<Utc>,
    pub success: bool,

    pub monitor_name: String,
    pub url: String,
    pub region: Option<Region>,
    pub environment: Environment,
}

impl NotificationAlert {
    /// Build the event for `notification_id` from a completed check
    pub fn for_target(notification_id: i64, monitor: &Monitor, outcome: &Outcome) -> Self {
        Self {
            notification_id,
            monitor_id: monitor.id,
            message: alert_message(&monitor.name, outcome),
            reason_phrase: outcome.reason_phrase.clone(),
            status_code: outcome.status_code,
            timestamp: outcome.checked_at,
            success: outcome.success,
            monitor_name: monitor.name.clone(),
            url: monitor.probe.target(),
            region: monitor.region,
            environment: monitor.environment,
        }
    }
}

/// `"Error calling <name>, Response StatusCode: <code>"` and its success twin
///
/// Checks without a status code (TCP, network errors) carry the probe message
/// instead.
pub fn alert_message(monitor_name: &str, outcome: &Outcome) -> String {
    let verb = if outcome.success { "Success" } else { "Error" };

    match outcome.status_code {
        Some(code) => format!("{verb} calling {monitor_name}, Response StatusCode: {code}"),
        None => format!("{verb} calling {monitor_name}: {}", outcome.message),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("message bus rejected alert with status {0}")]
    Rejected(u16),

    #[error("failed to reach message bus: {0}")]
    Transport(String),

    #[error("no subscribers for alert channel")]
    NoSubscribers,

    #[error("message bus did not answer within {0:?}")]
    TimedOut(Duration),
}

/// Outbound message bus for alert events
#[async_trait]
pub trait AlertBus: Send + Sync {
    async fn publish(&self, alert: &NotificationAlert) -> Result<(), PublishError>;
}

pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);

/// Fans a transition out to every notification target of a monitor
#[derive(Clone)]
pub struct AlertEmitter {
    storage: Arc<dyn StorageBackend>,
    bus: Arc<dyn AlertBus>,
    publish_timeout: Duration,
}

impl AlertEmitter {
    pub fn new(storage: Arc<dyn StorageBackend>, bus: Arc<dyn AlertBus>) -> Self {
        Self {
            storage,
            bus,
            publish_timeout: DEFAULT_PUBLISH_TIMEOUT,
        }
    }

    pub fn with_publish_timeout(mut self, publish_timeout: Duration) -> Self {
        self.publish_timeout = publish_timeout;
        self
    }

    async fn publish(&self, alert: &NotificationAlert) -> Result<(), PublishError> {
        tokio::time::timeout(self.publish_timeout, self.bus.publish(alert))
            .await
            .unwrap_or_else(|_| Err(PublishError::TimedOut(self.publish_timeout)))
    }

    /// Publish one event per notification target, returning how many were accepted
    #[instrument(skip(self, monitor, outcome), fields(monitor_id = monitor.id, success = outcome.success))]
    pub async fn emit(&self, monitor: &Monitor, outcome: &Outcome) -> usize {
        let targets = match self.storage.load_notification_targets(monitor.id).await {
            Ok(targets) => targets,
            Err(e) => {
                error!("failed to load notification targets: {e}");
                return 0;
            }
        };

        if targets.is_empty() {
            debug!("no notification targets registered");
            return 0;
        }

        let mut published = 0;
        for target in targets {
            let alert = NotificationAlert::for_target(target.notification_id, monitor, outcome);
            match self.publish(&alert).await {
                Ok(()) => published += 1,
                Err(e) => warn!(
                    notification_id = target.notification_id,
                    "failed to publish alert: {e}"
                ),
            }
        }

        debug!("published {published} alert(s)");
        published
    }
}
