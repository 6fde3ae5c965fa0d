use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use anyhow::Context;
use tracing::trace;

use crate::model::{Monitor, MonitorId, Region};

/// Storage backend configuration
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (no persistence)
    Memory,

    /// SQLite database (default)
    Sqlite {
        #[serde(default = "default_sqlite_path")]
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sqlite {
            path: default_sqlite_path(),
        }
    }
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./uptime.db")
}

/// Where alert events are published
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BusConfig {
    /// Log every alert (no broker)
    #[default]
    Log,

    /// POST every alert to a broker ingestion endpoint
    Webhook {
        url: String,
        token: Option<String>,

        /// Request timeout for one POST
        #[serde(default = "default_webhook_timeout")]
        timeout_secs: u64,
    },
}

fn default_webhook_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
pub struct AgentConfig {
    /// Stable agent id; falls back to `AGENT_ID`, then the hostname
    pub id: Option<String>,

    pub region: Option<Region>,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct CoordinationConfig {
    /// Maximum heartbeat age for an agent to count as alive
    #[serde(default = "default_freshness_window")]
    pub freshness_window_secs: u64,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            freshness_window_secs: default_freshness_window(),
        }
    }
}

fn default_freshness_window() -> u64 {
    30
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct ChecksConfig {
    #[serde(default = "default_max_concurrent_checks")]
    pub max_concurrent_checks: usize,

    /// Fixed delay between two attempts of the same check
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,

    /// Upper bound for handing one alert to the bus
    #[serde(default = "default_publish_timeout")]
    pub publish_timeout_secs: u64,
}

impl Default for ChecksConfig {
    fn default() -> Self {
        Self {
            max_concurrent_checks: default_max_concurrent_checks(),
            retry_delay_secs: default_retry_delay(),
            publish_timeout_secs: default_publish_timeout(),
        }
    }
}

fn default_publish_timeout() -> u64 {
    10
}

fn default_max_concurrent_checks() -> usize {
    32
}

fn default_retry_delay() -> u64 {
    2
}

/// Timer periods driving the runtime entry points
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct CadenceConfig {
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,

    #[serde(default = "default_election_secs")]
    pub election_secs: u64,

    #[serde(default = "default_check_secs")]
    pub check_secs: u64,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            heartbeat_secs: default_heartbeat_secs(),
            election_secs: default_election_secs(),
            check_secs: default_check_secs(),
        }
    }
}

fn default_heartbeat_secs() -> u64 {
    6
}

fn default_election_secs() -> u64 {
    10
}

fn default_check_secs() -> u64 {
    25
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_enabled")]
    pub enabled: bool,

    #[serde(default = "default_api_bind")]
    pub bind: SocketAddr,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: default_api_enabled(),
            bind: default_api_bind(),
        }
    }
}

fn default_api_enabled() -> bool {
    true
}

fn default_api_bind() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, crate::util::get_default_port()))
}

/// Notification registered for a seeded monitor
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct NotificationSeed {
    pub monitor_id: MonitorId,
    pub notification_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub coordination: CoordinationConfig,

    #[serde(default)]
    pub checks: ChecksConfig,

    #[serde(default)]
    pub cadence: CadenceConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub bus: BusConfig,

    #[serde(default)]
    pub api: ApiConfig,

    /// Monitor definitions written to storage at startup
    #[serde(default)]
    pub monitors: Vec<Monitor>,

    #[serde(default)]
    pub notifications: Vec<NotificationSeed>,
}

impl Config {
    pub fn freshness_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.coordination.freshness_window_secs as i64)
    }

    pub fn retry_delay(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.checks.retry_delay_secs)
    }

    pub fn publish_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.checks.publish_timeout_secs)
    }

    /// Apply `AGENT_ID` / `AGENT_REGION` from the environment, env winning over file
    pub fn apply_env_overrides(mut self) -> anyhow::Result<Self> {
        if let Some(id) = crate::util::get_agent_id() {
            self.agent.id = Some(id);
        }

        if let Some(region) = crate::util::get_agent_region() {
            let region = region
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))
                .context("invalid AGENT_REGION")?;
            self.agent.region = Some(region);
        }

        Ok(self)
    }
}

pub fn parse_config(content: &str) -> anyhow::Result<Config> {
    serde_json::from_str(content)
        .context("invalid configuration file provided")
        .inspect(|config| trace!("loaded config: {config:?}"))
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content =
        std::fs::read_to_string(path).with_context(|| format!("failed to read config '{path}'"))?;
    parse_config(&file_content)
}
