//! Probe runner - executes one HTTP or TCP check with retries
//!
//! The runner is a pure function of the monitor definition: it performs network
//! attempts and returns an [`Outcome`], with no persistence or notification side
//! effects. Network errors never surface as `Err`; they are folded into a failed
//! attempt and consumed by the retry loop.
//!
//! ## Flow
//!
//! ```text
//! Monitor → validate → attempt #1 → (fail) sleep → attempt #2 → ... → Outcome
//!                           └── (success) ──────────────────────────→ Outcome
//! ```
//!
//! Only the final attempt's code, time and message are reported upward.

pub mod cert;
pub mod http;
pub mod retry;
pub mod tcp;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument, trace};

use crate::model::{Monitor, MonitorId, Outcome, ProbeConfig};

pub use retry::RetryPolicy;

/// Errors that prevent a check from running at all
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    /// Malformed monitor definition; isolated to that monitor
    #[error("monitor {monitor_id}: invalid configuration: {reason}")]
    Configuration { monitor_id: MonitorId, reason: String },
}

impl ProbeError {
    pub fn configuration(monitor_id: MonitorId, reason: impl Into<String>) -> Self {
        ProbeError::Configuration {
            monitor_id,
            reason: reason.into(),
        }
    }
}

/// Result of a single network attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub success: bool,
    pub status_code: Option<u16>,
    pub reason_phrase: Option<String>,
    pub response_time_ms: u64,
    pub cert_days_remaining: Option<i64>,
    pub message: String,
}

impl Attempt {
    /// Attempt that never produced a response (connect error, timeout, ...)
    pub fn failed(response_time_ms: u64, message: impl Into<String>) -> Self {
        Self {
            success: false,
            status_code: None,
            reason_phrase: None,
            response_time_ms,
            cert_days_remaining: None,
            message: message.into(),
        }
    }

    pub fn into_outcome(self, attempts: u32, checked_at: DateTime<Utc>) -> Outcome {
        Outcome {
            success: self.success,
            status_code: self.status_code,
            reason_phrase: self.reason_phrase,
            response_time_ms: self.response_time_ms,
            cert_days_remaining: self.cert_days_remaining,
            message: self.message,
            attempts,
            checked_at,
        }
    }
}

/// Executes checks for any monitor definition
#[derive(Debug, Clone, Default)]
pub struct ProbeRunner {
    retry: RetryPolicy,
}

impl ProbeRunner {
    pub fn new(retry: RetryPolicy) -> Self {
        Self { retry }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Run one check cycle for `monitor`
    ///
    /// Performs at most `monitor.retries` attempts, stopping at the first success.
    /// Returns `Err` only for configuration errors.
    #[instrument(skip(self, monitor), fields(monitor_id = monitor.id, target = %monitor.probe.target()))]
    pub async fn check(&self, monitor: &Monitor) -> Result<Outcome, ProbeError> {
        monitor.validate()?;

        let (attempt, attempts) = match &monitor.probe {
            ProbeConfig::Http(probe) => {
                let client = http::build_client(monitor.id, probe)?;
                let headers = http::build_headers(monitor.id, probe)?;
                let (client, headers) = (&client, &headers);

                self.retry
                    .run(
                        monitor.retries,
                        move |n| {
                            trace!("http attempt {n}/{}", monitor.retries);
                            http::attempt(client, probe, headers)
                        },
                        |attempt| attempt.success,
                    )
                    .await
            }
            ProbeConfig::Tcp(probe) => {
                self.retry
                    .run(
                        monitor.retries,
                        move |n| {
                            trace!("tcp attempt {n}/{}", monitor.retries);
                            tcp::attempt(probe)
                        },
                        |attempt| attempt.success,
                    )
                    .await
            }
        };

        debug!(
            success = attempt.success,
            attempts,
            status_code = ?attempt.status_code,
            "check finished: {}",
            attempt.message
        );

        Ok(attempt.into_outcome(attempts, Utc::now()))
    }
}
