//! Status tracking for completed checks
//!
//! Every completed check cycle is compared with the monitor's persisted
//! status. The comparison is a pure function ([`Transition::evaluate`]); the
//! [`StatusTracker`] then applies its side effects in a fixed order:
//!
//! ```text
//! append_history ─▶ (flip only) append_alert ─▶ update_monitor_status ─▶ (flip only) AlertEmitter
//! ```
//!
//! A storage failure at any step abandons the remaining writes for this
//! monitor. The status goes last so that a failed cycle leaves the previous
//! status in place, and the next cycle sees the same flip again. A flip may
//! then produce a second alert record, never none.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::alerts::AlertEmitter;
use crate::model::{AlertRecord, HistoryRecord, Monitor, Outcome};
use crate::storage::{StorageBackend, StorageResult};

/// Result of comparing a check outcome with the previous status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Up before, failed now
    WentDown,

    /// Down before, succeeded now
    Recovered,

    StillUp,

    StillDown,
}

impl Transition {
    pub fn evaluate(previous: bool, success: bool) -> Transition {
        match (previous, success) {
            (true, false) => Transition::WentDown,
            (false, true) => Transition::Recovered,
            (true, true) => Transition::StillUp,
            (false, false) => Transition::StillDown,
        }
    }

    /// Status persisted after this transition
    pub fn status(self) -> bool {
        matches!(self, Transition::Recovered | Transition::StillUp)
    }

    /// Whether this transition produces an alert record
    pub fn is_flip(self) -> bool {
        matches!(self, Transition::WentDown | Transition::Recovered)
    }
}

pub struct StatusTracker {
    storage: Arc<dyn StorageBackend>,
    emitter: AlertEmitter,
}

impl StatusTracker {
    pub fn new(storage: Arc<dyn StorageBackend>, emitter: AlertEmitter) -> Self {
        Self { storage, emitter }
    }

    /// Persist the outcome of one check cycle and alert on a status flip
    #[instrument(skip(self, monitor, outcome), fields(monitor_id = monitor.id, success = outcome.success))]
    pub async fn record(&self, monitor: &Monitor, outcome: &Outcome) -> StorageResult<Transition> {
        let transition = Transition::evaluate(monitor.status, outcome.success);

        let history = HistoryRecord::from_outcome(monitor.id, outcome);
        self.storage.append_history(&history).await?;

        if transition.is_flip() {
            self.storage
                .append_alert(&AlertRecord::from(&history))
                .await?;
        }

        self.storage
            .update_monitor_status(monitor.id, transition.status(), outcome.cert_days_remaining)
            .await?;

        if !transition.is_flip() {
            debug!("status unchanged ({transition:?})");
            return Ok(transition);
        }

        match transition {
            Transition::WentDown => warn!("monitor '{}' went down: {}", monitor.name, outcome.message),
            _ => info!("monitor '{}' recovered: {}", monitor.name, outcome.message),
        }

        self.emitter.emit(monitor, outcome).await;

        Ok(transition)
    }
}
