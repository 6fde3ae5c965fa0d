//! SQLite storage backend implementation
//!
//! ## Features
//!
//! - **Embedded**: No separate database server required
//! - **WAL mode**: Concurrent reads from the API while check tasks write
//! - **Connection pooling**: Shared by every check task of the agent
//! - **Migrations**: Automatic schema versioning with sqlx
//!
//! ## Row decoding
//!
//! Probe definitions are stored as JSON. A monitor row whose probe, region or
//! environment cannot be decoded is skipped with a warning so that one broken
//! definition never stops the rest of the cycle.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info, instrument, warn};

use super::backend::{HealthStatus, MonitorFilter, StorageBackend};
use super::error::{StorageError, StorageResult};
use crate::model::{
    Agent, AlertRecord, AssignmentPlan, Environment, HistoryRecord, Monitor, MonitorId,
    NotificationTarget, Region,
};

const MONITOR_COLUMNS: &str = "m.id AS id, m.name AS name, m.probe AS probe, \
     m.retries AS retries, m.heartbeat_interval_secs AS heartbeat_interval_secs, \
     m.paused AS paused, m.status AS status, m.region AS region, \
     m.environment AS environment, m.tag AS tag, m.days_to_expire_cert AS days_to_expire_cert";

/// SQLite storage backend
pub struct SqliteBackend {
    pool: Pool<Sqlite>,
    db_path: String,
}

impl SqliteBackend {
    /// Open (or create) the database at `db_path` and run pending migrations
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        info!("initializing SQLite backend at: {}", db_path_str);

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        debug!("running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("database migrations complete");

        Ok(Self {
            pool,
            db_path: db_path_str,
        })
    }

    /// Insert or replace a monitor definition
    pub async fn insert_monitor(&self, monitor: &Monitor) -> StorageResult<()> {
        let probe = serde_json::to_string(&monitor.probe)?;

        sqlx::query(
            r#"
            INSERT INTO monitors (
                id, name, probe, retries, heartbeat_interval_secs, paused,
                status, region, environment, tag, days_to_expire_cert
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                name = excluded.name,
                probe = excluded.probe,
                retries = excluded.retries,
                heartbeat_interval_secs = excluded.heartbeat_interval_secs,
                paused = excluded.paused,
                region = excluded.region,
                environment = excluded.environment,
                tag = excluded.tag
            "#,
        )
        .bind(monitor.id)
        .bind(&monitor.name)
        .bind(probe)
        .bind(monitor.retries as i64)
        .bind(monitor.heartbeat_interval_secs as i64)
        .bind(monitor.paused)
        .bind(monitor.status)
        .bind(monitor.region.map(|r| r.to_string()))
        .bind(monitor.environment.to_string())
        .bind(&monitor.tag)
        .bind(monitor.days_to_expire_cert)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn add_notification_target(
        &self,
        monitor_id: MonitorId,
        notification_id: i64,
    ) -> StorageResult<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO monitor_notifications (monitor_id, notification_id) VALUES (?, ?)",
        )
        .bind(monitor_id)
        .bind(notification_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn timestamp_to_millis(dt: &DateTime<Utc>) -> i64 {
        dt.timestamp_millis()
    }

    fn millis_to_timestamp(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
    }

    fn decode_monitor(row: &SqliteRow) -> Result<Monitor, String> {
        let probe_json: String = row.get("probe");
        let probe = serde_json::from_str(&probe_json).map_err(|e| format!("probe: {e}"))?;

        let region = row
            .get::<Option<String>, _>("region")
            .map(|r| r.parse::<Region>())
            .transpose()?;
        let environment = row.get::<String, _>("environment").parse::<Environment>()?;

        Ok(Monitor {
            id: row.get("id"),
            name: row.get("name"),
            probe,
            retries: row.get::<i64, _>("retries").max(0) as u32,
            heartbeat_interval_secs: row.get::<i64, _>("heartbeat_interval_secs").max(0) as u64,
            paused: row.get("paused"),
            status: row.get("status"),
            region,
            environment,
            tag: row.get("tag"),
            days_to_expire_cert: row.get("days_to_expire_cert"),
        })
    }

    fn decode_agent(row: &SqliteRow) -> Result<Agent, String> {
        let region = row
            .get::<Option<String>, _>("region")
            .map(|r| r.parse::<Region>())
            .transpose()?;

        Ok(Agent {
            id: row.get("id"),
            hostname: row.get("hostname"),
            last_heartbeat: Self::millis_to_timestamp(row.get("last_heartbeat")),
            is_master: row.get("is_master"),
            version: row.get("version"),
            region,
            assigned_tasks: row.get::<i64, _>("assigned_tasks").max(0) as usize,
        })
    }

    fn decode_record(row: &SqliteRow) -> HistoryRecord {
        HistoryRecord {
            monitor_id: row.get("monitor_id"),
            status: row.get("status"),
            status_code: row
                .get::<Option<i64>, _>("status_code")
                .and_then(|c| u16::try_from(c).ok()),
            response_time_ms: row.get::<i64, _>("response_time_ms").max(0) as u64,
            message: row.get("message"),
            timestamp: Self::millis_to_timestamp(row.get("timestamp")),
        }
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    #[instrument(skip(self))]
    async fn load_monitors(&self, filter: MonitorFilter) -> StorageResult<Vec<Monitor>> {
        let rows = match &filter {
            MonitorFilter::All => {
                sqlx::query(&format!(
                    "SELECT {MONITOR_COLUMNS} FROM monitors m ORDER BY m.id"
                ))
                .fetch_all(&self.pool)
                .await?
            }
            MonitorFilter::Active => {
                sqlx::query(&format!(
                    "SELECT {MONITOR_COLUMNS} FROM monitors m WHERE m.paused = 0 ORDER BY m.id"
                ))
                .fetch_all(&self.pool)
                .await?
            }
            MonitorFilter::AssignedTo(agent_id) => {
                sqlx::query(&format!(
                    "SELECT {MONITOR_COLUMNS} FROM monitors m \
                     JOIN assignments a ON a.monitor_id = m.id \
                     WHERE a.agent_id = ? AND m.paused = 0 ORDER BY m.id"
                ))
                .bind(agent_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut monitors = Vec::with_capacity(rows.len());
        for row in &rows {
            match Self::decode_monitor(row) {
                Ok(monitor) => monitors.push(monitor),
                Err(reason) => {
                    let id: i64 = row.get("id");
                    warn!(monitor_id = id, "skipping undecodable monitor row: {reason}");
                }
            }
        }

        debug!("loaded {} monitors", monitors.len());
        Ok(monitors)
    }

    async fn load_agents(&self) -> StorageResult<Vec<Agent>> {
        let rows = sqlx::query(
            "SELECT id, hostname, last_heartbeat, is_master, version, region, assigned_tasks \
             FROM agents ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut agents = Vec::with_capacity(rows.len());
        for row in &rows {
            match Self::decode_agent(row) {
                Ok(agent) => agents.push(agent),
                Err(reason) => warn!("skipping undecodable agent row: {reason}"),
            }
        }

        Ok(agents)
    }

    #[instrument(skip(self, agent), fields(agent_id = %agent.id))]
    async fn upsert_heartbeat(&self, agent: &Agent) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO agents (
                id, hostname, last_heartbeat, is_master, version, region, assigned_tasks
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                hostname = excluded.hostname,
                last_heartbeat = excluded.last_heartbeat,
                is_master = excluded.is_master,
                version = excluded.version,
                region = excluded.region,
                assigned_tasks = excluded.assigned_tasks
            "#,
        )
        .bind(&agent.id)
        .bind(&agent.hostname)
        .bind(Self::timestamp_to_millis(&agent.last_heartbeat))
        .bind(agent.is_master)
        .bind(&agent.version)
        .bind(agent.region.map(|r| r.to_string()))
        .bind(agent.assigned_tasks as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self, plan), fields(count = plan.total_assigned()))]
    async fn replace_assignments(&self, plan: &AssignmentPlan) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM assignments")
            .execute(&mut *tx)
            .await?;

        for (agent_id, monitor_id) in plan.pairs() {
            sqlx::query("INSERT INTO assignments (agent_id, monitor_id) VALUES (?, ?)")
                .bind(agent_id)
                .bind(monitor_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        debug!("assignment table replaced");
        Ok(())
    }

    async fn load_assignments(&self, agent_id: &str) -> StorageResult<Vec<MonitorId>> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT monitor_id FROM assignments WHERE agent_id = ? ORDER BY monitor_id",
        )
        .bind(agent_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn append_history(&self, record: &HistoryRecord) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO monitor_history (
                monitor_id, status, status_code, response_time_ms, message, timestamp
            )
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.monitor_id)
        .bind(record.status)
        .bind(record.status_code.map(i64::from))
        .bind(record.response_time_ms as i64)
        .bind(&record.message)
        .bind(Self::timestamp_to_millis(&record.timestamp))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn append_alert(&self, record: &AlertRecord) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO monitor_alerts (
                monitor_id, status, status_code, response_time_ms, message, timestamp
            )
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.monitor_id)
        .bind(record.status)
        .bind(record.status_code.map(i64::from))
        .bind(record.response_time_ms as i64)
        .bind(&record.message)
        .bind(Self::timestamp_to_millis(&record.timestamp))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_monitor_status(
        &self,
        id: MonitorId,
        status: bool,
        cert_days_remaining: Option<i64>,
    ) -> StorageResult<()> {
        let result = sqlx::query(
            "UPDATE monitors SET status = ?, \
             days_to_expire_cert = COALESCE(?, days_to_expire_cert) WHERE id = ?",
        )
        .bind(status)
        .bind(cert_days_remaining)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("monitor {id}")));
        }

        Ok(())
    }

    async fn load_notification_targets(
        &self,
        monitor_id: MonitorId,
    ) -> StorageResult<Vec<NotificationTarget>> {
        let rows: Vec<(i64, i64)> = sqlx::query_as(
            "SELECT monitor_id, notification_id FROM monitor_notifications \
             WHERE monitor_id = ? ORDER BY notification_id",
        )
        .bind(monitor_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(monitor_id, notification_id)| NotificationTarget {
                monitor_id,
                notification_id,
            })
            .collect())
    }

    async fn load_history(
        &self,
        monitor_id: MonitorId,
        limit: usize,
    ) -> StorageResult<Vec<HistoryRecord>> {
        let rows = sqlx::query(
            "SELECT monitor_id, status, status_code, response_time_ms, message, timestamp \
             FROM monitor_history WHERE monitor_id = ? ORDER BY timestamp DESC, id DESC LIMIT ?",
        )
        .bind(monitor_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::decode_record).collect())
    }

    async fn load_alerts(&self, monitor_id: MonitorId) -> StorageResult<Vec<AlertRecord>> {
        let rows = sqlx::query(
            "SELECT monitor_id, status, status_code, response_time_ms, message, timestamp \
             FROM monitor_alerts WHERE monitor_id = ? ORDER BY id",
        )
        .bind(monitor_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| AlertRecord::from(&Self::decode_record(row)))
            .collect())
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> StorageResult<HealthStatus> {
        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => {
                let mut metadata = HashMap::new();
                metadata.insert("backend".to_string(), "sqlite".to_string());
                metadata.insert("db_path".to_string(), self.db_path.clone());

                Ok(HealthStatus {
                    healthy: true,
                    message: "SQLite backend operational".to_string(),
                    metadata,
                })
            }
            Err(e) => {
                warn!("health check failed: {}", e);
                Ok(HealthStatus {
                    healthy: false,
                    message: format!("health check failed: {}", e),
                    metadata: HashMap::new(),
                })
            }
        }
    }

    async fn close(&self) -> StorageResult<()> {
        info!("closing SQLite backend");
        self.pool.close().await;
        Ok(())
    }
}
