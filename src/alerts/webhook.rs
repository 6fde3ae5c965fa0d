//! HTTP ingestion endpoint of an external message broker

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, error, instrument};

use super::{AlertBus, NotificationAlert, PublishError};

/// POSTs each alert as JSON to a broker ingestion URL
#[derive(Debug, Clone)]
pub struct WebhookBus {
    client: Client,
    url: String,
    token: Option<String>,
}

impl WebhookBus {
    /// Every POST is abandoned after `timeout`, so a broker that accepts the
    /// connection but never answers surfaces as a transport error
    pub fn new(
        url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url: url.into(),
            token,
        })
    }
}

#[async_trait]
impl AlertBus for WebhookBus {
    #[instrument(skip(self, alert), fields(monitor_id = alert.monitor_id, notification_id = alert.notification_id))]
    async fn publish(&self, alert: &NotificationAlert) -> Result<(), PublishError> {
        let mut request = self.client.post(&self.url).json(alert);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                debug!("alert accepted by broker");
                Ok(())
            }
            Ok(response) => {
                error!("broker rejected alert with status: {}", response.status());
                Err(PublishError::Rejected(response.status().as_u16()))
            }
            Err(e) => {
                error!("failed to send alert to broker: {}", e);
                Err(PublishError::Transport(e.to_string()))
            }
        }
    }
}
