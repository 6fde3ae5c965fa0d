//! Helper functions for integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uptime_mesh::{
    agent::{AgentIdentity, AgentRuntime, RuntimeOptions},
    alerts::{AlertBus, NotificationAlert, PublishError},
    model::{
        Agent, AlertRecord, AssignmentPlan, HistoryRecord, HttpProbe, Monitor, MonitorId,
        NotificationTarget, ProbeConfig, Region, TcpProbe,
    },
    storage::{
        HealthStatus, MemoryBackend, MonitorFilter, StorageBackend, StorageError, StorageResult,
    },
};

pub fn create_http_monitor(id: MonitorId, url: &str, retries: u32) -> Monitor {
    let mut monitor = Monitor::new(id, format!("service-{id}"), ProbeConfig::Http(HttpProbe::get(url)));
    monitor.retries = retries;
    monitor
}

pub fn create_tcp_monitor(id: MonitorId, port: u16) -> Monitor {
    let mut monitor = Monitor::new(
        id,
        format!("tcp-{id}"),
        ProbeConfig::Tcp(TcpProbe {
            host: "127.0.0.1".to_string(),
            port,
            timeout_secs: 2,
        }),
    );
    monitor.retries = 1;
    monitor
}

pub fn create_agent(id: &str, last_heartbeat: DateTime<Utc>, region: Option<Region>) -> Agent {
    Agent {
        id: id.to_string(),
        hostname: format!("{id}.local"),
        last_heartbeat,
        is_master: false,
        version: "0.3.0".to_string(),
        region,
        assigned_tasks: 0,
    }
}

pub fn test_options() -> RuntimeOptions {
    RuntimeOptions {
        freshness_window: Duration::seconds(30),
        retry_delay: std::time::Duration::ZERO,
        max_concurrent_checks: 8,
        publish_timeout: std::time::Duration::from_secs(5),
    }
}

pub fn create_runtime(
    id: &str,
    storage: Arc<dyn StorageBackend>,
    bus: Arc<dyn AlertBus>,
) -> AgentRuntime {
    AgentRuntime::new(
        AgentIdentity {
            id: id.to_string(),
            hostname: format!("{id}.local"),
            version: "0.3.0".to_string(),
            region: None,
        },
        test_options(),
        storage,
        bus,
    )
}

/// Assign every given monitor to `agent_id`
pub async fn assign_all(storage: &dyn StorageBackend, agent_id: &str, monitors: &[MonitorId]) {
    let mut plan = AssignmentPlan::new();
    for id in monitors {
        plan.assign(agent_id, *id);
    }
    storage.replace_assignments(&plan).await.unwrap();
}

/// Bus recording every published alert
#[derive(Default)]
pub struct RecordingBus {
    published: Mutex<Vec<NotificationAlert>>,
}

impl RecordingBus {
    pub fn published(&self) -> Vec<NotificationAlert> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertBus for RecordingBus {
    async fn publish(&self, alert: &NotificationAlert) -> Result<(), PublishError> {
        self.published.lock().unwrap().push(alert.clone());
        Ok(())
    }
}

/// Bus rejecting every alert
#[derive(Default)]
pub struct FailingBus {
    pub attempts: AtomicUsize,
}

#[async_trait]
impl AlertBus for FailingBus {
    async fn publish(&self, _alert: &NotificationAlert) -> Result<(), PublishError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(PublishError::Transport("broker unreachable".to_string()))
    }
}

/// In-memory backend whose writes can be switched to fail
#[derive(Default)]
pub struct FlakyStorage {
    pub inner: MemoryBackend,
    pub fail_history: AtomicBool,
    pub fail_status: AtomicBool,
    pub fail_reads: AtomicBool,
}

impl FlakyStorage {
    fn check(flag: &AtomicBool, what: &str) -> StorageResult<()> {
        if flag.load(Ordering::SeqCst) {
            Err(StorageError::QueryFailed(format!("injected {what} failure")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl StorageBackend for FlakyStorage {
    async fn load_monitors(&self, filter: MonitorFilter) -> StorageResult<Vec<Monitor>> {
        Self::check(&self.fail_reads, "read")?;
        self.inner.load_monitors(filter).await
    }

    async fn load_agents(&self) -> StorageResult<Vec<Agent>> {
        Self::check(&self.fail_reads, "read")?;
        self.inner.load_agents().await
    }

    async fn upsert_heartbeat(&self, agent: &Agent) -> StorageResult<()> {
        self.inner.upsert_heartbeat(agent).await
    }

    async fn replace_assignments(&self, plan: &AssignmentPlan) -> StorageResult<()> {
        self.inner.replace_assignments(plan).await
    }

    async fn load_assignments(&self, agent_id: &str) -> StorageResult<Vec<MonitorId>> {
        self.inner.load_assignments(agent_id).await
    }

    async fn append_history(&self, record: &HistoryRecord) -> StorageResult<()> {
        Self::check(&self.fail_history, "history")?;
        self.inner.append_history(record).await
    }

    async fn append_alert(&self, record: &AlertRecord) -> StorageResult<()> {
        self.inner.append_alert(record).await
    }

    async fn update_monitor_status(
        &self,
        id: MonitorId,
        status: bool,
        cert_days_remaining: Option<i64>,
    ) -> StorageResult<()> {
        Self::check(&self.fail_status, "status")?;
        self.inner
            .update_monitor_status(id, status, cert_days_remaining)
            .await
    }

    async fn load_notification_targets(
        &self,
        monitor_id: MonitorId,
    ) -> StorageResult<Vec<NotificationTarget>> {
        self.inner.load_notification_targets(monitor_id).await
    }

    async fn load_history(
        &self,
        monitor_id: MonitorId,
        limit: usize,
    ) -> StorageResult<Vec<HistoryRecord>> {
        self.inner.load_history(monitor_id, limit).await
    }

    async fn load_alerts(&self, monitor_id: MonitorId) -> StorageResult<Vec<AlertRecord>> {
        self.inner.load_alerts(monitor_id).await
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        self.inner.health_check().await
    }

    async fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}
