//! Integration tests for SQLite persistence
//!
//! These tests verify that:
//! - A full check cycle persists status, history and alerts
//! - Data survives reopening the database
//! - Assignments written by the master are visible to other agents

use std::sync::Arc;

use chrono::Utc;
use tempfile::tempdir;
use uptime_mesh::alerts::LogBus;
use uptime_mesh::storage::{MonitorFilter, StorageBackend, sqlite::SqliteBackend};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

#[tokio::test]
async fn test_full_persistence_pipeline() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let temp_dir = tempdir().unwrap();
    let db_path = temp_dir.path().join("uptime.db");

    {
        let backend = SqliteBackend::new(&db_path).await.unwrap();
        backend
            .insert_monitor(&create_http_monitor(1, &mock_server.uri(), 2))
            .await
            .unwrap();
        backend.add_notification_target(1, 5).await.unwrap();

        let backend = Arc::new(backend);
        let runtime = create_runtime("agent-a", backend.clone(), Arc::new(LogBus));

        let now = Utc::now();
        runtime.run_heartbeat_at(now).await.unwrap();
        runtime
            .run_master_election_and_distribution_at(now)
            .await
            .unwrap();
        let report = runtime.run_check_cycle_at(now).await.unwrap();
        assert_eq!(report.down, 1);

        backend.close().await.unwrap();
    }

    let reopened = SqliteBackend::new(&db_path).await.unwrap();

    let monitors = reopened.load_monitors(MonitorFilter::All).await.unwrap();
    assert_eq!(monitors.len(), 1);
    assert!(!monitors[0].status);

    let history = reopened.load_history(1, 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status_code, Some(503));
    assert_eq!(history[0].message, "503 - Service Unavailable");

    let alerts = reopened.load_alerts(1).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert!(!alerts[0].status);

    assert_eq!(reopened.load_assignments("agent-a").await.unwrap(), vec![1]);

    let agents = reopened.load_agents().await.unwrap();
    assert_eq!(agents.len(), 1);
    assert_eq!(agents[0].id, "agent-a");
}

#[tokio::test]
async fn test_assignments_visible_to_second_agent() {
    let temp_dir = tempdir().unwrap();
    let backend = Arc::new(SqliteBackend::new(temp_dir.path().join("shared.db")).await.unwrap());
    for id in 1..=4 {
        backend
            .insert_monitor(&create_http_monitor(id, "http://127.0.0.1:9/", 1))
            .await
            .unwrap();
    }

    let a = create_runtime("agent-a", backend.clone(), Arc::new(LogBus));
    let b = create_runtime("agent-b", backend.clone(), Arc::new(LogBus));

    let now = Utc::now();
    a.run_heartbeat_at(now).await.unwrap();
    b.run_heartbeat_at(now).await.unwrap();
    a.run_master_election_and_distribution_at(now).await.unwrap();

    let status = b.status().await.unwrap();
    assert_eq!(status.assigned_monitors, vec![2, 4]);
}
