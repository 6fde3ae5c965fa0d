//! Check scheduler - runs due checks for this agent's assigned monitors
//!
//! Each cycle loads the monitors assigned to this agent, picks those whose
//! check interval has elapsed since their last dispatch, and runs every one
//! in its own task. A semaphore caps how many checks hit the network at once.
//!
//! ```text
//! run_cycle ─▶ load AssignedTo(agent) ─▶ due? ─▶ JoinSet ─▶ [permit ─▶ probe ─▶ tracker]
//!                                                    │
//!                                                    └─▶ CycleReport
//! ```
//!
//! A monitor still in flight from an earlier, overlapping cycle is skipped
//! rather than checked twice. Errors stay inside their own task: a
//! configuration or storage failure is logged and counted, never propagated
//! to sibling checks.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, instrument, warn};

use crate::model::{Monitor, MonitorId};
use crate::probe::ProbeRunner;
use crate::storage::{MonitorFilter, StorageBackend, StorageResult};
use crate::tracker::StatusTracker;

/// Counts for one scheduler cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub dispatched: usize,
    pub up: usize,
    pub down: usize,

    /// Checks that ended without a recorded outcome (bad config, storage error)
    pub failed: usize,
}

#[derive(Debug, Clone, Copy)]
enum CheckResult {
    Up,
    Down,
    Failed,
}

#[derive(Default)]
struct DispatchState {
    last_dispatch: HashMap<MonitorId, DateTime<Utc>>,
    in_flight: HashSet<MonitorId>,
}

/// Clears the in-flight mark when the check task ends, panics included
struct InFlight {
    state: Arc<Mutex<DispatchState>>,
    monitor_id: MonitorId,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        lock(&self.state).in_flight.remove(&self.monitor_id);
    }
}

fn lock(state: &Mutex<DispatchState>) -> MutexGuard<'_, DispatchState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct CheckScheduler {
    storage: Arc<dyn StorageBackend>,
    runner: Arc<ProbeRunner>,
    tracker: Arc<StatusTracker>,
    permits: Arc<Semaphore>,
    state: Arc<Mutex<DispatchState>>,
}

impl CheckScheduler {
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        runner: ProbeRunner,
        tracker: StatusTracker,
        max_concurrent_checks: usize,
    ) -> Self {
        Self {
            storage,
            runner: Arc::new(runner),
            tracker: Arc::new(tracker),
            permits: Arc::new(Semaphore::new(max_concurrent_checks.max(1))),
            state: Arc::default(),
        }
    }

    /// Run every due check for `agent_id` and wait for all of them
    ///
    /// Only loading the assignments can fail the cycle as a whole.
    #[instrument(skip(self))]
    pub async fn run_cycle(&self, agent_id: &str, now: DateTime<Utc>) -> StorageResult<CycleReport> {
        let monitors = self
            .storage
            .load_monitors(MonitorFilter::AssignedTo(agent_id.to_string()))
            .await?;

        let due = self.claim_due(monitors, now);
        let mut report = CycleReport {
            dispatched: due.len(),
            ..CycleReport::default()
        };

        if due.is_empty() {
            debug!("no checks due");
            return Ok(report);
        }

        let mut checks = JoinSet::new();
        for monitor in due {
            let guard = InFlight {
                state: self.state.clone(),
                monitor_id: monitor.id,
            };
            let permits = self.permits.clone();
            let runner = self.runner.clone();
            let tracker = self.tracker.clone();

            checks.spawn(async move {
                let _guard = guard;
                let Ok(_permit) = permits.acquire_owned().await else {
                    return CheckResult::Failed;
                };
                run_check(&runner, &tracker, &monitor).await
            });
        }

        while let Some(joined) = checks.join_next().await {
            match joined {
                Ok(CheckResult::Up) => report.up += 1,
                Ok(CheckResult::Down) => report.down += 1,
                Ok(CheckResult::Failed) => report.failed += 1,
                Err(e) => {
                    error!("check task aborted: {e}");
                    report.failed += 1;
                }
            }
        }

        debug!(
            dispatched = report.dispatched,
            up = report.up,
            down = report.down,
            failed = report.failed,
            "check cycle finished"
        );

        Ok(report)
    }

    /// Select due monitors and mark them in flight
    ///
    /// Dispatch times of monitors no longer assigned here are dropped.
    fn claim_due(&self, monitors: Vec<Monitor>, now: DateTime<Utc>) -> Vec<Monitor> {
        let mut state = lock(&self.state);

        let assigned: HashSet<MonitorId> = monitors.iter().map(|m| m.id).collect();
        state.last_dispatch.retain(|id, _| assigned.contains(id));

        let mut due = Vec::new();
        for monitor in monitors {
            if monitor.paused || state.in_flight.contains(&monitor.id) {
                continue;
            }

            let Some(interval) = check_interval(&monitor) else {
                warn!(
                    monitor_id = monitor.id,
                    "skipping check: interval of {}s is out of range", monitor.heartbeat_interval_secs
                );
                continue;
            };

            let is_due = state
                .last_dispatch
                .get(&monitor.id)
                .is_none_or(|last| now.signed_duration_since(*last) >= interval);

            if is_due {
                state.last_dispatch.insert(monitor.id, now);
                state.in_flight.insert(monitor.id);
                due.push(monitor);
            }
        }

        due
    }
}

fn check_interval(monitor: &Monitor) -> Option<Duration> {
    i64::try_from(monitor.heartbeat_interval_secs)
        .ok()
        .and_then(Duration::try_seconds)
}

async fn run_check(runner: &ProbeRunner, tracker: &StatusTracker, monitor: &Monitor) -> CheckResult {
    let outcome = match runner.check(monitor).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(monitor_id = monitor.id, "skipping check: {e}");
            return CheckResult::Failed;
        }
    };

    match tracker.record(monitor, &outcome).await {
        Ok(transition) if transition.status() => CheckResult::Up,
        Ok(_) => CheckResult::Down,
        Err(e) => {
            error!(monitor_id = monitor.id, "failed to record check outcome: {e}");
            CheckResult::Failed
        }
    }
}
