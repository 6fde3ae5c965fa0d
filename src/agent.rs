//! Agent runtime - the entry points driven by the binary's timers
//!
//! ```text
//!            ┌──────────── every 6s ────────────┐
//!            │ run_heartbeat                    │──▶ agents table (own row)
//!            ├──────────── every 10s ───────────┤
//!            │ run_master_election_and_distrib. │──▶ snapshot ─▶ (master) assignments table
//!            ├──────────── every 25s ───────────┤
//!            │ run_check_cycle                  │──▶ probes ─▶ history / alerts
//!            └──────────────────────────────────┘
//! ```
//!
//! Every entry point is idempotent and safe to call again after a failure.
//! The only state carried between calls is the latest [`CoordinationSnapshot`]
//! and the scheduler's dispatch bookkeeping.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::alerts::{AlertBus, AlertEmitter};
use crate::config::Config;
use crate::coordination::{CoordinationSnapshot, HeartbeatRegistry, TaskDistributor};
use crate::model::{Agent, AgentId, MonitorId, Region};
use crate::probe::{ProbeRunner, RetryPolicy};
use crate::scheduler::{CheckScheduler, CycleReport};
use crate::storage::{StorageBackend, StorageResult};
use crate::tracker::StatusTracker;

/// Who this agent is
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentIdentity {
    pub id: AgentId,
    pub hostname: String,
    pub version: String,
    pub region: Option<Region>,
}

impl AgentIdentity {
    /// Identity from config, falling back to the hostname as id
    pub fn from_config(config: &Config) -> Self {
        let hostname = crate::util::get_hostname();
        Self {
            id: config.agent.id.clone().unwrap_or_else(|| hostname.clone()),
            hostname,
            version: crate::util::get_version().to_string(),
            region: config.agent.region,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeOptions {
    pub freshness_window: Duration,
    pub retry_delay: std::time::Duration,
    pub max_concurrent_checks: usize,

    /// Upper bound for one alert publish inside a check
    pub publish_timeout: std::time::Duration,
}

impl RuntimeOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            freshness_window: config.freshness_window(),
            retry_delay: config.retry_delay(),
            max_concurrent_checks: config.checks.max_concurrent_checks,
            publish_timeout: config.publish_timeout(),
        }
    }
}

/// Read-only view answered by the status query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentStatus {
    pub agent_id: AgentId,
    pub master: Option<AgentId>,
    pub is_master: bool,
    pub assigned_monitors: Vec<MonitorId>,
    pub fresh_agents: Vec<AgentId>,
    pub evaluated_at: DateTime<Utc>,
}

pub struct AgentRuntime {
    identity: AgentIdentity,
    options: RuntimeOptions,
    storage: Arc<dyn StorageBackend>,
    heartbeat: HeartbeatRegistry,
    distributor: TaskDistributor,
    scheduler: CheckScheduler,
    snapshot: RwLock<CoordinationSnapshot>,
}

impl AgentRuntime {
    pub fn new(
        identity: AgentIdentity,
        options: RuntimeOptions,
        storage: Arc<dyn StorageBackend>,
        bus: Arc<dyn AlertBus>,
    ) -> Self {
        let heartbeat = HeartbeatRegistry::new(
            storage.clone(),
            identity.id.clone(),
            identity.hostname.clone(),
            identity.version.clone(),
            identity.region,
        );

        let emitter =
            AlertEmitter::new(storage.clone(), bus).with_publish_timeout(options.publish_timeout);
        let tracker = StatusTracker::new(storage.clone(), emitter);
        let runner = ProbeRunner::new(RetryPolicy::fixed(options.retry_delay));
        let scheduler = CheckScheduler::new(
            storage.clone(),
            runner,
            tracker,
            options.max_concurrent_checks,
        );

        Self {
            snapshot: RwLock::new(CoordinationSnapshot::empty(&identity.id, Utc::now())),
            distributor: TaskDistributor::new(storage.clone()),
            identity,
            options,
            storage,
            heartbeat,
            scheduler,
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.identity.id
    }

    pub fn storage(&self) -> &Arc<dyn StorageBackend> {
        &self.storage
    }

    pub fn freshness_window(&self) -> Duration {
        self.options.freshness_window
    }

    pub async fn run_heartbeat(&self) -> StorageResult<Agent> {
        self.run_heartbeat_at(Utc::now()).await
    }

    /// Write this agent's heartbeat stamped with `now`
    #[instrument(skip(self), fields(agent_id = %self.identity.id))]
    pub async fn run_heartbeat_at(&self, now: DateTime<Utc>) -> StorageResult<Agent> {
        let declared_master = self.snapshot.read().await.is_master();

        let assigned_tasks = match self.storage.load_assignments(&self.identity.id).await {
            Ok(assigned) => assigned.len(),
            Err(e) => {
                warn!("failed to count assigned monitors: {e}");
                0
            }
        };

        self.heartbeat.beat(now, declared_master, assigned_tasks).await
    }

    pub async fn run_master_election_and_distribution(&self) -> StorageResult<CoordinationSnapshot> {
        self.run_master_election_and_distribution_at(Utc::now())
            .await
    }

    /// Re-elect the master from the agents table and, if master, redistribute
    #[instrument(skip(self), fields(agent_id = %self.identity.id))]
    pub async fn run_master_election_and_distribution_at(
        &self,
        now: DateTime<Utc>,
    ) -> StorageResult<CoordinationSnapshot> {
        let agents = self.storage.load_agents().await?;
        let snapshot = CoordinationSnapshot::evaluate(
            &self.identity.id,
            &agents,
            now,
            self.options.freshness_window,
        );

        {
            let mut current = self.snapshot.write().await;
            if current.is_master() != snapshot.is_master() {
                if snapshot.is_master() {
                    info!("this agent is now master");
                } else {
                    info!("this agent is no longer master (master: {:?})", snapshot.master);
                }
            }
            *current = snapshot.clone();
        }

        debug!(
            master = ?snapshot.master,
            fresh = snapshot.fresh_agents.len(),
            "election finished"
        );

        self.distributor.distribute(&snapshot).await?;

        Ok(snapshot)
    }

    pub async fn run_check_cycle(&self) -> StorageResult<CycleReport> {
        self.run_check_cycle_at(Utc::now()).await
    }

    /// Run all checks assigned to this agent that are due at `now`
    pub async fn run_check_cycle_at(&self, now: DateTime<Utc>) -> StorageResult<CycleReport> {
        self.scheduler.run_cycle(&self.identity.id, now).await
    }

    /// Current coordination view of this agent
    pub async fn status(&self) -> StorageResult<AgentStatus> {
        let snapshot = self.snapshot.read().await.clone();
        let assigned_monitors = self.storage.load_assignments(&self.identity.id).await?;

        Ok(AgentStatus {
            agent_id: self.identity.id.clone(),
            is_master: snapshot.is_master(),
            fresh_agents: snapshot.fresh_ids().into_iter().map(String::from).collect(),
            master: snapshot.master,
            assigned_monitors,
            evaluated_at: snapshot.evaluated_at,
        })
    }
}
