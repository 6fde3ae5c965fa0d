//! Monitor history endpoint

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

use crate::api::{
    error::{ApiError, ApiResult},
    state::ApiState,
    types::HistoryResponse,
};
use crate::model::MonitorId;

const DEFAULT_LIMIT: usize = 100;
const MAX_LIMIT: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Max rows (default: 100, max: 1000)
    limit: Option<usize>,
}

/// GET /api/v1/monitors/:id/history
///
/// Most recent rows first
pub async fn get_history(
    State(state): State<ApiState>,
    Path(monitor_id): Path<MonitorId>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<HistoryResponse>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    if limit == 0 || limit > MAX_LIMIT {
        return Err(ApiError::InvalidRequest(format!(
            "limit must be between 1 and {MAX_LIMIT}"
        )));
    }

    let history = state
        .runtime
        .storage()
        .load_history(monitor_id, limit)
        .await?;

    Ok(Json(HistoryResponse {
        monitor_id,
        count: history.len(),
        history,
    }))
}
