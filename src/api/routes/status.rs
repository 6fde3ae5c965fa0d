//! Coordination status of this agent

use axum::{Json, extract::State};

use crate::agent::AgentStatus;
use crate::api::{error::ApiResult, state::ApiState};

/// GET /api/v1/status
pub async fn get_status(State(state): State<ApiState>) -> ApiResult<Json<AgentStatus>> {
    Ok(Json(state.runtime.status().await?))
}
