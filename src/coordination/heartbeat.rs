//! Liveness reporting for this agent

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{instrument, trace};

use crate::model::{Agent, AgentId, Region};
use crate::storage::{StorageBackend, StorageResult};

/// Writes this agent's row in the agents table
///
/// The agent is the only writer of its own row, so no lock is taken.
pub struct HeartbeatRegistry {
    storage: Arc<dyn StorageBackend>,
    agent_id: AgentId,
    hostname: String,
    version: String,
    region: Option<Region>,
}

impl HeartbeatRegistry {
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        agent_id: impl Into<AgentId>,
        hostname: impl Into<String>,
        version: impl Into<String>,
        region: Option<Region>,
    ) -> Self {
        Self {
            storage,
            agent_id: agent_id.into(),
            hostname: hostname.into(),
            version: version.into(),
            region,
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Upsert the heartbeat row stamped with `now`
    #[instrument(skip(self), fields(agent_id = %self.agent_id))]
    pub async fn beat(
        &self,
        now: DateTime<Utc>,
        declared_master: bool,
        assigned_tasks: usize,
    ) -> StorageResult<Agent> {
        let agent = Agent {
            id: self.agent_id.clone(),
            hostname: self.hostname.clone(),
            last_heartbeat: now,
            is_master: declared_master,
            version: self.version.clone(),
            region: self.region,
            assigned_tasks,
        };

        self.storage.upsert_heartbeat(&agent).await?;
        trace!("heartbeat written");

        Ok(agent)
    }
}
