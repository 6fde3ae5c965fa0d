//! End-to-end check cycles through the agent runtime
//!
//! heartbeat → election → distribution → check → status / history / alerts

use std::sync::Arc;

use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use uptime_mesh::storage::{MemoryBackend, StorageBackend};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

struct Pipeline {
    storage: Arc<MemoryBackend>,
    bus: Arc<RecordingBus>,
    runtime: uptime_mesh::agent::AgentRuntime,
}

async fn pipeline(url: &str, previous_status: bool, targets: &[i64]) -> Pipeline {
    let storage = Arc::new(MemoryBackend::new());
    let mut monitor = create_http_monitor(1, url, 3);
    monitor.status = previous_status;
    storage.insert_monitor(monitor).await;
    for target in targets {
        storage.add_notification_target(1, *target).await;
    }

    let bus = Arc::new(RecordingBus::default());
    let runtime = create_runtime("agent-a", storage.clone(), bus.clone());

    Pipeline {
        storage,
        bus,
        runtime,
    }
}

#[tokio::test]
async fn test_up_monitor_failing_three_times_goes_down_with_one_alert() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&mock_server)
        .await;

    let p = pipeline(&mock_server.uri(), true, &[10, 11]).await;
    let now = Utc::now();
    p.runtime.run_heartbeat_at(now).await.unwrap();
    p.runtime
        .run_master_election_and_distribution_at(now)
        .await
        .unwrap();

    let report = p.runtime.run_check_cycle_at(now).await.unwrap();
    assert_eq!(report.dispatched, 1);
    assert_eq!(report.down, 1);

    let history = p.storage.all_history().await;
    assert_eq!(history.len(), 1);
    assert!(!history[0].status);
    assert_eq!(history[0].status_code, Some(500));

    assert_eq!(p.storage.all_alerts().await.len(), 1);
    assert!(!p.storage.monitor(1).await.unwrap().status);

    let published = p.bus.published();
    assert_eq!(published.len(), 2);
    assert_eq!(
        published[0].message,
        "Error calling service-1, Response StatusCode: 500"
    );
    assert_eq!(
        published.iter().map(|a| a.notification_id).collect::<Vec<_>>(),
        vec![10, 11]
    );
}

#[tokio::test]
async fn test_down_monitor_failing_again_writes_history_only() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&mock_server)
        .await;

    let p = pipeline(&mock_server.uri(), false, &[10]).await;
    let now = Utc::now();
    p.runtime.run_heartbeat_at(now).await.unwrap();
    p.runtime
        .run_master_election_and_distribution_at(now)
        .await
        .unwrap();
    p.runtime.run_check_cycle_at(now).await.unwrap();

    let history = p.storage.all_history().await;
    assert_eq!(history.len(), 1);
    assert!(!history[0].status);
    assert_eq!(history[0].status_code, Some(500));

    assert!(p.storage.all_alerts().await.is_empty());
    assert!(p.bus.published().is_empty());
}

#[tokio::test]
async fn test_down_monitor_recovers_on_first_success() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let p = pipeline(&mock_server.uri(), false, &[10]).await;
    let now = Utc::now();
    p.runtime.run_heartbeat_at(now).await.unwrap();
    p.runtime
        .run_master_election_and_distribution_at(now)
        .await
        .unwrap();

    let report = p.runtime.run_check_cycle_at(now).await.unwrap();
    assert_eq!(report.up, 1);

    let history = p.storage.all_history().await;
    assert_eq!(history.len(), 1);
    assert!(history[0].status);

    let alerts = p.storage.all_alerts().await;
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].status);

    let published = p.bus.published();
    assert_eq!(published.len(), 1);
    assert!(published[0].success);
    assert_eq!(
        published[0].message,
        "Success calling service-1, Response StatusCode: 200"
    );
}

#[tokio::test]
async fn test_flip_down_then_up_across_cycles() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(3)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let p = pipeline(&mock_server.uri(), true, &[]).await;
    let now = Utc::now();
    p.runtime.run_heartbeat_at(now).await.unwrap();
    p.runtime
        .run_master_election_and_distribution_at(now)
        .await
        .unwrap();

    p.runtime.run_check_cycle_at(now).await.unwrap();
    let later = now + Duration::seconds(60);
    p.runtime.run_check_cycle_at(later).await.unwrap();
    // not due yet: interval is measured from the last dispatch
    let report = p
        .runtime
        .run_check_cycle_at(later + Duration::seconds(5))
        .await
        .unwrap();
    assert_eq!(report.dispatched, 0);

    let alerts = p.storage.load_alerts(1).await.unwrap();
    assert_eq!(
        alerts.iter().map(|a| a.status).collect::<Vec<_>>(),
        vec![false, true]
    );
    assert_eq!(p.storage.all_history().await.len(), 2);
    assert!(p.storage.monitor(1).await.unwrap().status);
}

#[tokio::test]
async fn test_paused_monitor_is_never_checked() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let p = pipeline(&mock_server.uri(), true, &[]).await;
    p.storage.set_paused(1, true).await;

    let now = Utc::now();
    p.runtime.run_heartbeat_at(now).await.unwrap();
    p.runtime
        .run_master_election_and_distribution_at(now)
        .await
        .unwrap();

    let report = p.runtime.run_check_cycle_at(now).await.unwrap();
    assert_eq!(report.dispatched, 0);
    assert!(p.storage.all_history().await.is_empty());
}
