//! In-memory storage backend (no persistence)
//!
//! Tables live behind `tokio::sync::RwLock`s. Useful for:
//! - Testing without database dependencies
//! - Single-agent deployments that do not need history across restarts
//!
//! Monitor definitions and notification targets are seeded through the
//! inherent `insert_*` methods, standing in for the external config API.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::backend::{HealthStatus, MonitorFilter, StorageBackend};
use super::error::{StorageError, StorageResult};
use crate::model::{
    Agent, AlertRecord, AssignmentPlan, HistoryRecord, Monitor, MonitorId, NotificationTarget,
};

#[derive(Default)]
pub struct MemoryBackend {
    monitors: RwLock<BTreeMap<MonitorId, Monitor>>,
    agents: RwLock<BTreeMap<String, Agent>>,
    assignments: RwLock<AssignmentPlan>,
    history: RwLock<Vec<HistoryRecord>>,
    alerts: RwLock<Vec<AlertRecord>>,
    targets: RwLock<Vec<NotificationTarget>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a monitor definition
    pub async fn insert_monitor(&self, monitor: Monitor) {
        self.monitors.write().await.insert(monitor.id, monitor);
    }

    pub async fn add_notification_target(&self, monitor_id: MonitorId, notification_id: i64) {
        self.targets.write().await.push(NotificationTarget {
            monitor_id,
            notification_id,
        });
    }

    pub async fn monitor(&self, id: MonitorId) -> Option<Monitor> {
        self.monitors.read().await.get(&id).cloned()
    }

    pub async fn set_paused(&self, id: MonitorId, paused: bool) {
        if let Some(monitor) = self.monitors.write().await.get_mut(&id) {
            monitor.paused = paused;
        }
    }

    /// Snapshot of the full assignment table
    pub async fn assignments(&self) -> AssignmentPlan {
        self.assignments.read().await.clone()
    }

    /// Every history row, in insertion order
    pub async fn all_history(&self) -> Vec<HistoryRecord> {
        self.history.read().await.clone()
    }

    /// Every alert row, in insertion order
    pub async fn all_alerts(&self) -> Vec<AlertRecord> {
        self.alerts.read().await.clone()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn load_monitors(&self, filter: MonitorFilter) -> StorageResult<Vec<Monitor>> {
        let monitors = self.monitors.read().await;

        let loaded = match filter {
            MonitorFilter::All => monitors.values().cloned().collect(),
            MonitorFilter::Active => monitors.values().filter(|m| !m.paused).cloned().collect(),
            MonitorFilter::AssignedTo(agent_id) => {
                let assignments = self.assignments.read().await;
                assignments
                    .monitors_for(&agent_id)
                    .iter()
                    .filter_map(|id| monitors.get(id))
                    .filter(|m| !m.paused)
                    .cloned()
                    .collect()
            }
        };

        Ok(loaded)
    }

    async fn load_agents(&self) -> StorageResult<Vec<Agent>> {
        Ok(self.agents.read().await.values().cloned().collect())
    }

    async fn upsert_heartbeat(&self, agent: &Agent) -> StorageResult<()> {
        self.agents
            .write()
            .await
            .insert(agent.id.clone(), agent.clone());
        Ok(())
    }

    async fn replace_assignments(&self, plan: &AssignmentPlan) -> StorageResult<()> {
        debug!(
            "in-memory backend: replacing assignments ({} monitors)",
            plan.total_assigned()
        );
        *self.assignments.write().await = plan.clone();
        Ok(())
    }

    async fn load_assignments(&self, agent_id: &str) -> StorageResult<Vec<MonitorId>> {
        Ok(self.assignments.read().await.monitors_for(agent_id).to_vec())
    }

    async fn append_history(&self, record: &HistoryRecord) -> StorageResult<()> {
        self.history.write().await.push(record.clone());
        Ok(())
    }

    async fn append_alert(&self, record: &AlertRecord) -> StorageResult<()> {
        self.alerts.write().await.push(record.clone());
        Ok(())
    }

    async fn update_monitor_status(
        &self,
        id: MonitorId,
        status: bool,
        cert_days_remaining: Option<i64>,
    ) -> StorageResult<()> {
        let mut monitors = self.monitors.write().await;
        let monitor = monitors
            .get_mut(&id)
            .ok_or_else(|| StorageError::NotFound(format!("monitor {id}")))?;

        monitor.status = status;
        if cert_days_remaining.is_some() {
            monitor.days_to_expire_cert = cert_days_remaining;
        }

        Ok(())
    }

    async fn load_notification_targets(
        &self,
        monitor_id: MonitorId,
    ) -> StorageResult<Vec<NotificationTarget>> {
        Ok(self
            .targets
            .read()
            .await
            .iter()
            .filter(|t| t.monitor_id == monitor_id)
            .cloned()
            .collect())
    }

    async fn load_history(
        &self,
        monitor_id: MonitorId,
        limit: usize,
    ) -> StorageResult<Vec<HistoryRecord>> {
        Ok(self
            .history
            .read()
            .await
            .iter()
            .rev()
            .filter(|h| h.monitor_id == monitor_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn load_alerts(&self, monitor_id: MonitorId) -> StorageResult<Vec<AlertRecord>> {
        Ok(self
            .alerts
            .read()
            .await
            .iter()
            .filter(|a| a.monitor_id == monitor_id)
            .cloned()
            .collect())
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        Ok(HealthStatus {
            healthy: true,
            message: "In-memory storage operational".to_string(),
            metadata: HashMap::from([
                ("backend".to_string(), "memory".to_string()),
                (
                    "monitors".to_string(),
                    self.monitors.read().await.len().to_string(),
                ),
                (
                    "history_rows".to_string(),
                    self.history.read().await.len().to_string(),
                ),
            ]),
        })
    }

    async fn close(&self) -> StorageResult<()> {
        debug!("closing in-memory backend (no-op)");
        Ok(())
    }
}
