//! Read-only HTTP API over the agent's coordination state and history
//!
//! ## Endpoints
//!
//! - `GET /api/v1/health` - Liveness plus storage health
//! - `GET /api/v1/status` - This agent's coordination view
//! - `GET /api/v1/agents` - Registered agents with freshness
//! - `GET /api/v1/monitors/:id/history` - Recent check history
//!
//! Nothing here writes; monitors are managed by the external config API.

pub mod error;
pub mod routes;
pub mod state;
pub mod types;

pub use error::{ApiError, ApiResult};
pub use state::ApiState;

use std::net::SocketAddr;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Build the router with all routes
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .route("/api/v1/status", get(routes::status::get_status))
        .route("/api/v1/agents", get(routes::agents::list_agents))
        .route(
            "/api/v1/monitors/:id/history",
            get(routes::history::get_history),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Spawn the API server
///
/// Starts an Axum HTTP server in a background task and returns the bound
/// address.
pub async fn spawn_api_server(bind_addr: SocketAddr, state: ApiState) -> anyhow::Result<SocketAddr> {
    info!("starting API server on {}", bind_addr);

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(addr)
}
