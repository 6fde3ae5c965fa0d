//! Integration tests for API endpoints
//!
//! These tests verify that:
//! - All REST endpoints return correct responses
//! - Agent freshness is reported from the heartbeat table
//! - Error handling is correct

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{Duration, Utc};
use reqwest::StatusCode;
use serde_json::Value;
use uptime_mesh::{
    agent::AgentRuntime,
    alerts::LogBus,
    api::{ApiState, spawn_api_server},
    model::HistoryRecord,
    storage::{MemoryBackend, StorageBackend},
};

use crate::helpers::*;

async fn spawn_test_api(runtime: Arc<AgentRuntime>) -> SocketAddr {
    spawn_api_server("127.0.0.1:0".parse().unwrap(), ApiState::new(runtime))
        .await
        .unwrap()
}

async fn get_json(addr: SocketAddr, path: &str) -> (StatusCode, Value) {
    let response = reqwest::get(format!("http://{addr}{path}")).await.unwrap();
    let status = response.status();
    (status, response.json().await.unwrap())
}

#[tokio::test]
async fn test_health_endpoint() {
    let storage = Arc::new(MemoryBackend::new());
    let runtime = Arc::new(create_runtime("agent-a", storage, Arc::new(LogBus)));
    let addr = spawn_test_api(runtime).await;

    let (status, body) = get_json(addr, "/api/v1/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["storage_healthy"], true);
}

#[tokio::test]
async fn test_status_endpoint_reflects_election() {
    let storage = Arc::new(MemoryBackend::new());
    storage
        .insert_monitor(create_http_monitor(1, "https://example.com", 1))
        .await;
    let runtime = Arc::new(create_runtime("agent-a", storage, Arc::new(LogBus)));

    let now = Utc::now();
    runtime.run_heartbeat_at(now).await.unwrap();
    runtime
        .run_master_election_and_distribution_at(now)
        .await
        .unwrap();

    let addr = spawn_test_api(runtime).await;
    let (status, body) = get_json(addr, "/api/v1/status").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["agent_id"], "agent-a");
    assert_eq!(body["master"], "agent-a");
    assert_eq!(body["is_master"], true);
    assert_eq!(body["assigned_monitors"], serde_json::json!([1]));
}

#[tokio::test]
async fn test_agents_endpoint_flags_stale_agents() {
    let storage = Arc::new(MemoryBackend::new());
    let now = Utc::now();
    storage
        .upsert_heartbeat(&create_agent("agent-old", now - Duration::minutes(10), None))
        .await
        .unwrap();
    storage
        .upsert_heartbeat(&create_agent("agent-new", now, None))
        .await
        .unwrap();

    let runtime = Arc::new(create_runtime("agent-new", storage, Arc::new(LogBus)));
    let addr = spawn_test_api(runtime).await;

    let (status, body) = get_json(addr, "/api/v1/agents").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);

    let agents = body["agents"].as_array().unwrap();
    let fresh_of = |id: &str| {
        agents
            .iter()
            .find(|a| a["id"] == id)
            .map(|a| a["fresh"].clone())
            .unwrap()
    };
    assert_eq!(fresh_of("agent-new"), true);
    assert_eq!(fresh_of("agent-old"), false);
}

#[tokio::test]
async fn test_history_endpoint() {
    let storage = Arc::new(MemoryBackend::new());
    for code in [200u16, 500] {
        storage
            .append_history(&HistoryRecord {
                monitor_id: 3,
                status: code == 200,
                status_code: Some(code),
                response_time_ms: 15,
                message: format!("{code}"),
                timestamp: Utc::now(),
            })
            .await
            .unwrap();
    }

    let runtime = Arc::new(create_runtime("agent-a", storage, Arc::new(LogBus)));
    let addr = spawn_test_api(runtime).await;

    let (status, body) = get_json(addr, "/api/v1/monitors/3/history?limit=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["monitor_id"], 3);
    assert_eq!(body["count"], 1);
    assert_eq!(body["history"][0]["status_code"], 500);

    let (status, body) = get_json(addr, "/api/v1/monitors/3/history?limit=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("limit"));
}
