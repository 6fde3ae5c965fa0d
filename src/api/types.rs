//! API response types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{HistoryRecord, MonitorId, Region};

/// Response for GET /api/v1/health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub storage_healthy: bool,
    pub storage_message: String,
}

/// One row of GET /api/v1/agents
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentInfo {
    pub id: String,
    pub hostname: String,
    pub version: String,
    pub region: Option<Region>,
    pub last_heartbeat: DateTime<Utc>,

    /// Within the freshness window at request time
    pub fresh: bool,

    /// Self-reported, as of the agent's last heartbeat
    pub is_master: bool,
    pub assigned_tasks: usize,
}

/// Response for GET /api/v1/agents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentsResponse {
    pub agents: Vec<AgentInfo>,
    pub count: usize,
}

/// Response for GET /api/v1/monitors/:id/history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub monitor_id: MonitorId,
    pub history: Vec<HistoryRecord>,
    pub count: usize,
}
