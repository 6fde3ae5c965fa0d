//! Registered agents

use axum::{Json, extract::State};
use chrono::Utc;

use crate::api::{
    error::ApiResult,
    state::ApiState,
    types::{AgentInfo, AgentsResponse},
};

/// GET /api/v1/agents
///
/// Every agent row, stale ones included, flagged with current freshness
pub async fn list_agents(State(state): State<ApiState>) -> ApiResult<Json<AgentsResponse>> {
    let now = Utc::now();
    let window = state.runtime.freshness_window();

    let agents: Vec<AgentInfo> = state
        .runtime
        .storage()
        .load_agents()
        .await?
        .into_iter()
        .map(|agent| AgentInfo {
            fresh: agent.is_fresh(now, window),
            id: agent.id,
            hostname: agent.hostname,
            version: agent.version,
            region: agent.region,
            last_heartbeat: agent.last_heartbeat,
            is_master: agent.is_master,
            assigned_tasks: agent.assigned_tasks,
        })
        .collect();

    Ok(Json(AgentsResponse {
        count: agents.len(),
        agents,
    }))
}
