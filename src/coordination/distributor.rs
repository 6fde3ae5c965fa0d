//! Assignment of monitors to live agents
//!
//! Planning is pure ([`plan_assignments`]); only the master persists a plan,
//! and it always replaces the whole table.
//!
//! ## Placement
//!
//! Monitors are visited in id order and agents are considered in id order:
//!
//! - a monitor with a region goes round-robin over the agents reporting that
//!   region, when there is at least one;
//! - every other monitor goes round-robin over all agents.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use super::election::CoordinationSnapshot;
use crate::model::{Agent, AssignmentPlan, Monitor, Region};
use crate::storage::{MonitorFilter, StorageBackend, StorageResult};

/// Spread active monitors over `agents`, each monitor on exactly one agent
pub fn plan_assignments(monitors: &[Monitor], agents: &[Agent]) -> AssignmentPlan {
    let mut plan = AssignmentPlan::new();
    if agents.is_empty() {
        return plan;
    }

    let mut agents: Vec<&Agent> = agents.iter().collect();
    agents.sort_by(|a, b| a.id.cmp(&b.id));
    agents.dedup_by(|a, b| a.id == b.id);
    for agent in &agents {
        plan.ensure_agent(&agent.id);
    }

    let mut by_region: HashMap<Region, Vec<&Agent>> = HashMap::new();
    for agent in agents.iter().copied() {
        if let Some(region) = agent.region {
            by_region.entry(region).or_default().push(agent);
        }
    }

    let mut monitors: Vec<&Monitor> = monitors.iter().filter(|m| !m.paused).collect();
    monitors.sort_by_key(|m| m.id);

    let mut region_cursor: HashMap<Region, usize> = HashMap::new();
    let mut global_cursor = 0;

    for monitor in monitors {
        let regional = monitor
            .region
            .and_then(|region| by_region.get(&region).map(|pool| (region, pool)));

        let agent = match regional {
            Some((region, pool)) => {
                let cursor = region_cursor.entry(region).or_default();
                let agent = pool[*cursor % pool.len()];
                *cursor += 1;
                agent
            }
            None => {
                let agent = agents[global_cursor % agents.len()];
                global_cursor += 1;
                agent
            }
        };

        plan.assign(&agent.id, monitor.id);
    }

    plan
}

/// Persists assignment plans when this agent is the master
pub struct TaskDistributor {
    storage: Arc<dyn StorageBackend>,
}

impl TaskDistributor {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    /// Rebuild and store the assignment table
    ///
    /// Returns the written plan, or `None` when this agent is not the master or
    /// no agent is fresh.
    #[instrument(skip(self, snapshot), fields(agent_id = %snapshot.self_id))]
    pub async fn distribute(
        &self,
        snapshot: &CoordinationSnapshot,
    ) -> StorageResult<Option<AssignmentPlan>> {
        if !snapshot.is_master() {
            debug!("not master, skipping distribution");
            return Ok(None);
        }

        if snapshot.fresh_agents.is_empty() {
            debug!("no fresh agents, leaving assignments untouched");
            return Ok(None);
        }

        let monitors = self.storage.load_monitors(MonitorFilter::Active).await?;
        let plan = plan_assignments(&monitors, &snapshot.fresh_agents);

        self.storage.replace_assignments(&plan).await?;

        info!(
            "distributed {} monitors over {} agents",
            plan.total_assigned(),
            snapshot.fresh_agents.len()
        );

        Ok(Some(plan))
    }
}
