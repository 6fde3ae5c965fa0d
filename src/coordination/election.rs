//! Deterministic master election
//!
//! The master is the lexicographically smallest id among agents whose last
//! heartbeat lies within the freshness window. Every agent evaluating the same
//! agents table at the same instant reaches the same answer, so no lock or
//! vote is needed. The `is_master` flag agents write into their own rows is
//! informational and never consulted here.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::model::{Agent, AgentId};

/// Result of one election round, held by the runtime until the next one
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoordinationSnapshot {
    pub self_id: AgentId,

    /// `None` when no agent is fresh
    pub master: Option<AgentId>,

    /// Fresh agents sorted by id
    pub fresh_agents: Vec<Agent>,

    pub evaluated_at: DateTime<Utc>,
}

impl CoordinationSnapshot {
    pub fn evaluate(
        self_id: &str,
        agents: &[Agent],
        now: DateTime<Utc>,
        freshness_window: Duration,
    ) -> Self {
        let mut fresh_agents: Vec<Agent> = agents
            .iter()
            .filter(|agent| agent.is_fresh(now, freshness_window))
            .cloned()
            .collect();
        fresh_agents.sort_by(|a, b| a.id.cmp(&b.id));

        let master = fresh_agents.first().map(|agent| agent.id.clone());

        Self {
            self_id: self_id.to_string(),
            master,
            fresh_agents,
            evaluated_at: now,
        }
    }

    /// Snapshot used before the first election round
    pub fn empty(self_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            self_id: self_id.to_string(),
            master: None,
            fresh_agents: Vec::new(),
            evaluated_at: now,
        }
    }

    pub fn is_master(&self) -> bool {
        self.master.as_deref() == Some(self.self_id.as_str())
    }

    pub fn fresh_ids(&self) -> Vec<&str> {
        self.fresh_agents.iter().map(|a| a.id.as_str()).collect()
    }
}
