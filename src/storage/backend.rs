//! Storage backend trait definition
//!
//! This is the persistence boundary of the core. The relational schema behind
//! it is owned elsewhere; the core only needs the operations below.

use std::collections::HashMap;

use async_trait::async_trait;

use super::error::StorageResult;
use crate::model::{
    Agent, AlertRecord, AssignmentPlan, HistoryRecord, Monitor, MonitorId, NotificationTarget,
};

/// Which monitors to load
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorFilter {
    /// Every monitor, paused ones included
    All,

    /// Non-paused monitors
    Active,

    /// Non-paused monitors currently assigned to the given agent
    AssignedTo(String),
}

/// Health status of the storage backend
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Is the backend operational?
    pub healthy: bool,

    /// Human-readable status message
    pub message: String,

    /// Additional backend-specific metadata
    pub metadata: HashMap<String, String>,
}

/// Trait for persistent storage backends
///
/// Implementations must be `Send + Sync`; they are shared by every check task
/// of an agent.
///
/// ## Write discipline
///
/// - `upsert_heartbeat` is only ever called by the agent owning the row.
/// - `replace_assignments` is a full overwrite of the assignment table, never a patch.
/// - `append_history` / `append_alert` never update or delete.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn load_monitors(&self, filter: MonitorFilter) -> StorageResult<Vec<Monitor>>;

    async fn load_agents(&self) -> StorageResult<Vec<Agent>>;

    /// Insert or replace the row keyed by `agent.id`
    async fn upsert_heartbeat(&self, agent: &Agent) -> StorageResult<()>;

    /// Replace the whole assignment table with `plan`
    ///
    /// Agents absent from the plan end up with no assignments.
    async fn replace_assignments(&self, plan: &AssignmentPlan) -> StorageResult<()>;

    /// Monitor ids currently assigned to `agent_id`
    async fn load_assignments(&self, agent_id: &str) -> StorageResult<Vec<MonitorId>>;

    async fn append_history(&self, record: &HistoryRecord) -> StorageResult<()>;

    async fn append_alert(&self, record: &AlertRecord) -> StorageResult<()>;

    /// Persist the tracked status; `None` keeps the stored certificate days
    async fn update_monitor_status(
        &self,
        id: MonitorId,
        status: bool,
        cert_days_remaining: Option<i64>,
    ) -> StorageResult<()>;

    async fn load_notification_targets(
        &self,
        monitor_id: MonitorId,
    ) -> StorageResult<Vec<NotificationTarget>>;

    /// Most recent history rows for a monitor, newest first
    async fn load_history(&self, monitor_id: MonitorId, limit: usize)
    -> StorageResult<Vec<HistoryRecord>>;

    /// Alert records for a monitor, oldest first
    async fn load_alerts(&self, monitor_id: MonitorId) -> StorageResult<Vec<AlertRecord>>;

    /// Check backend health
    async fn health_check(&self) -> StorageResult<HealthStatus>;

    /// Close the backend and release resources
    async fn close(&self) -> StorageResult<()>;
}
