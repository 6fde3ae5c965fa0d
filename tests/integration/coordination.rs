//! Heartbeat, election and distribution across several agents sharing storage

use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use uptime_mesh::alerts::LogBus;
use uptime_mesh::model::Region;
use uptime_mesh::storage::{MemoryBackend, StorageBackend};

use crate::helpers::*;

async fn storage_with_monitors(ids: &[i64]) -> Arc<MemoryBackend> {
    let storage = Arc::new(MemoryBackend::new());
    for id in ids {
        storage
            .insert_monitor(create_http_monitor(*id, "http://127.0.0.1:9/health", 1))
            .await;
    }
    storage
}

#[tokio::test]
async fn test_two_agents_split_four_monitors() {
    let storage = storage_with_monitors(&[1, 2, 3, 4]).await;
    let a = create_runtime("agent-a", storage.clone(), Arc::new(LogBus));
    let b = create_runtime("agent-b", storage.clone(), Arc::new(LogBus));

    let now = Utc::now();
    a.run_heartbeat_at(now).await.unwrap();
    b.run_heartbeat_at(now).await.unwrap();

    let snapshot_b = b.run_master_election_and_distribution_at(now).await.unwrap();
    assert_eq!(snapshot_b.master.as_deref(), Some("agent-a"));
    assert!(storage.assignments().await.is_empty(), "non-master must not write");

    let snapshot_a = a.run_master_election_and_distribution_at(now).await.unwrap();
    assert!(snapshot_a.is_master());

    let plan = storage.assignments().await;
    assert_eq!(plan.monitors_for("agent-a"), &[1, 3]);
    assert_eq!(plan.monitors_for("agent-b"), &[2, 4]);
    assert_eq!(plan.total_assigned(), 4);

    let status = b.status().await.unwrap();
    assert_eq!(status.assigned_monitors, vec![2, 4]);
    assert!(!status.is_master);
    assert_eq!(status.fresh_agents, vec!["agent-a".to_string(), "agent-b".to_string()]);
}

#[tokio::test]
async fn test_stale_agent_excluded_from_election_and_distribution() {
    let storage = storage_with_monitors(&[1, 2, 3]).await;
    let now = Utc::now();

    storage
        .upsert_heartbeat(&create_agent("agent-a", now - Duration::seconds(120), None))
        .await
        .unwrap();

    let b = create_runtime("agent-b", storage.clone(), Arc::new(LogBus));
    b.run_heartbeat_at(now).await.unwrap();

    let snapshot = b.run_master_election_and_distribution_at(now).await.unwrap();
    assert_eq!(snapshot.master.as_deref(), Some("agent-b"));
    assert_eq!(snapshot.fresh_ids(), vec!["agent-b"]);

    let plan = storage.assignments().await;
    assert!(plan.monitors_for("agent-a").is_empty());
    assert_eq!(plan.monitors_for("agent-b"), &[1, 2, 3]);
}

#[tokio::test]
async fn test_master_failover_reassigns_everything() {
    let storage = storage_with_monitors(&[1, 2]).await;
    let a = create_runtime("agent-a", storage.clone(), Arc::new(LogBus));
    let b = create_runtime("agent-b", storage.clone(), Arc::new(LogBus));

    let now = Utc::now();
    a.run_heartbeat_at(now).await.unwrap();
    b.run_heartbeat_at(now).await.unwrap();
    a.run_master_election_and_distribution_at(now).await.unwrap();
    assert_eq!(storage.assignments().await.monitors_for("agent-b"), &[2]);

    // agent-a stops beating
    let later = now + Duration::seconds(45);
    b.run_heartbeat_at(later).await.unwrap();
    let snapshot = b.run_master_election_and_distribution_at(later).await.unwrap();

    assert!(snapshot.is_master());
    let plan = storage.assignments().await;
    assert_eq!(plan.monitors_for("agent-b"), &[1, 2]);
    assert!(plan.monitors_for("agent-a").is_empty());
}

#[tokio::test]
async fn test_no_fresh_agents_leaves_assignments_untouched() {
    let storage = storage_with_monitors(&[1]).await;
    let a = create_runtime("agent-a", storage.clone(), Arc::new(LogBus));

    let now = Utc::now();
    a.run_heartbeat_at(now).await.unwrap();
    a.run_master_election_and_distribution_at(now).await.unwrap();
    let before = storage.assignments().await;

    let snapshot = a
        .run_master_election_and_distribution_at(now + Duration::seconds(300))
        .await
        .unwrap();
    assert_matches!(snapshot.master, None);
    assert_eq!(storage.assignments().await, before);
}

#[tokio::test]
async fn test_heartbeat_reports_master_flag_and_task_count() {
    let storage = storage_with_monitors(&[1, 2, 3]).await;
    let a = create_runtime("agent-a", storage.clone(), Arc::new(LogBus));

    let now = Utc::now();
    let first = a.run_heartbeat_at(now).await.unwrap();
    assert!(!first.is_master);
    assert_eq!(first.assigned_tasks, 0);

    a.run_master_election_and_distribution_at(now).await.unwrap();

    let second = a.run_heartbeat_at(now + Duration::seconds(6)).await.unwrap();
    assert!(second.is_master);
    assert_eq!(second.assigned_tasks, 3);
}

#[tokio::test]
async fn test_region_affinity_through_runtime() {
    let storage = Arc::new(MemoryBackend::new());
    let mut eu_monitor = create_http_monitor(1, "https://eu.example.com", 1);
    eu_monitor.region = Some(Region::Europe);
    storage.insert_monitor(eu_monitor).await;

    let now = Utc::now();
    storage
        .upsert_heartbeat(&create_agent("agent-z-eu", now, Some(Region::Europe)))
        .await
        .unwrap();

    let a = create_runtime("agent-a", storage.clone(), Arc::new(LogBus));
    a.run_heartbeat_at(now).await.unwrap();
    a.run_master_election_and_distribution_at(now).await.unwrap();

    assert_eq!(storage.assignments().await.agent_for(1), Some("agent-z-eu"));
}
