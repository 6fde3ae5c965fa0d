//! Domain types shared by the probe engine, the status tracker and the
//! coordination layer.
//!
//! ## Ownership
//!
//! - `Monitor` definitions are owned by the external config API; the core only
//!   mutates `status` and `days_to_expire_cert` through the storage backend.
//! - `Agent` rows are written by their own process only.
//! - `AssignmentPlan` is rebuilt from scratch on every distribution cycle.
//! - `HistoryRecord` and `AlertRecord` are append-only.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::probe::ProbeError;

pub type MonitorId = i64;

pub type AgentId = String;

/// Geographic region a monitor prefers to be checked from, or an agent runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    Europe,
    Oceania,
    NorthAmerica,
    SouthAmerica,
    Africa,
    Asia,
    Custom,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Region::Europe => "europe",
            Region::Oceania => "oceania",
            Region::NorthAmerica => "north_america",
            Region::SouthAmerica => "south_america",
            Region::Africa => "africa",
            Region::Asia => "asia",
            Region::Custom => "custom",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "europe" => Ok(Region::Europe),
            "oceania" => Ok(Region::Oceania),
            "north_america" => Ok(Region::NorthAmerica),
            "south_america" => Ok(Region::SouthAmerica),
            "africa" => Ok(Region::Africa),
            "asia" => Ok(Region::Asia),
            "custom" => Ok(Region::Custom),
            other => Err(format!("unknown region '{other}'")),
        }
    }
}

/// Deployment environment tag of a monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Staging,
    Qa,
    Testing,
    PreProd,
    #[default]
    Production,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Qa => "qa",
            Environment::Testing => "testing",
            Environment::PreProd => "pre_prod",
            Environment::Production => "production",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "qa" => Ok(Environment::Qa),
            "testing" => Ok(Environment::Testing),
            "pre_prod" => Ok(Environment::PreProd),
            "production" => Ok(Environment::Production),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
        }
    }
}

/// HTTP probe definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpProbe {
    pub url: String,

    #[serde(default)]
    pub method: HttpMethod,

    #[serde(default)]
    pub headers: Vec<(String, String)>,

    /// Request body, sent as `application/json`
    #[serde(default)]
    pub body: Option<String>,

    /// Per-attempt timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum redirects to follow (0 disables redirects)
    #[serde(default = "default_max_redirects")]
    pub max_redirects: u32,

    /// Capture the certificate's `notAfter` date (accepts any chain while doing so)
    #[serde(default)]
    pub check_cert_expiry: bool,

    #[serde(default)]
    pub ignore_tls_errors: bool,
}

impl HttpProbe {
    /// GET probe with default settings
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Get,
            headers: Vec::new(),
            body: None,
            timeout_secs: default_timeout_secs(),
            max_redirects: default_max_redirects(),
            check_cert_expiry: false,
            ignore_tls_errors: false,
        }
    }
}

/// TCP probe definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpProbe {
    pub host: String,
    pub port: u16,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl TcpProbe {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "protocol", rename_all = "lowercase")]
pub enum ProbeConfig {
    Http(HttpProbe),
    Tcp(TcpProbe),
}

impl ProbeConfig {
    /// Human-readable target (URL or `host:port`)
    pub fn target(&self) -> String {
        match self {
            ProbeConfig::Http(http) => http.url.clone(),
            ProbeConfig::Tcp(tcp) => tcp.address(),
        }
    }

    pub fn timeout_secs(&self) -> u64 {
        match self {
            ProbeConfig::Http(http) => http.timeout_secs,
            ProbeConfig::Tcp(tcp) => tcp.timeout_secs,
        }
    }
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_max_redirects() -> u32 {
    10
}

fn default_retries() -> u32 {
    3
}

fn default_heartbeat_interval() -> u64 {
    60
}

fn default_status() -> bool {
    true
}

/// A configured endpoint checked on a schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Monitor {
    pub id: MonitorId,
    pub name: String,
    pub probe: ProbeConfig,

    /// Attempts per check cycle
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Seconds between two checks of this monitor
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    #[serde(default)]
    pub paused: bool,

    /// Last persisted status (`true` = up)
    #[serde(default = "default_status")]
    pub status: bool,

    #[serde(default)]
    pub region: Option<Region>,

    #[serde(default)]
    pub environment: Environment,

    #[serde(default)]
    pub tag: Option<String>,

    #[serde(default)]
    pub days_to_expire_cert: Option<i64>,
}

impl Monitor {
    pub fn new(id: MonitorId, name: impl Into<String>, probe: ProbeConfig) -> Self {
        Self {
            id,
            name: name.into(),
            probe,
            retries: default_retries(),
            heartbeat_interval_secs: default_heartbeat_interval(),
            paused: false,
            status: default_status(),
            region: None,
            environment: Environment::default(),
            tag: None,
            days_to_expire_cert: None,
        }
    }

    /// Reject definitions the probe runner cannot execute
    pub fn validate(&self) -> Result<(), ProbeError> {
        if self.retries == 0 {
            return Err(ProbeError::configuration(self.id, "retries must be at least 1"));
        }

        if self.probe.timeout_secs() == 0 {
            return Err(ProbeError::configuration(self.id, "timeout must be at least 1 second"));
        }

        match &self.probe {
            ProbeConfig::Http(http) => {
                let url = url::Url::parse(&http.url).map_err(|e| {
                    ProbeError::configuration(self.id, format!("invalid url '{}': {e}", http.url))
                })?;

                if !matches!(url.scheme(), "http" | "https") {
                    return Err(ProbeError::configuration(
                        self.id,
                        format!("unsupported scheme '{}'", url.scheme()),
                    ));
                }

                for (name, value) in &http.headers {
                    reqwest::header::HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                        ProbeError::configuration(self.id, format!("invalid header name '{name}'"))
                    })?;
                    reqwest::header::HeaderValue::from_str(value).map_err(|_| {
                        ProbeError::configuration(
                            self.id,
                            format!("invalid value for header '{name}'"),
                        )
                    })?;
                }
            }
            ProbeConfig::Tcp(tcp) => {
                if tcp.host.trim().is_empty() {
                    return Err(ProbeError::configuration(self.id, "tcp host is empty"));
                }
                if tcp.port == 0 {
                    return Err(ProbeError::configuration(self.id, "tcp port must not be 0"));
                }
            }
        }

        Ok(())
    }
}

/// Result of one completed check cycle (after retries)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub success: bool,

    /// HTTP status code of the final attempt (`None` for TCP and network errors)
    pub status_code: Option<u16>,

    pub reason_phrase: Option<String>,
    pub response_time_ms: u64,
    pub cert_days_remaining: Option<i64>,
    pub message: String,

    /// Network attempts performed in this cycle
    pub attempts: u32,

    pub checked_at: DateTime<Utc>,
}

/// A running agent's self-reported liveness row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub hostname: String,
    pub last_heartbeat: DateTime<Utc>,

    /// Declared by the agent itself; informational only
    pub is_master: bool,

    pub version: String,
    pub region: Option<Region>,
    pub assigned_tasks: usize,
}

impl Agent {
    /// Whether the heartbeat is within `window` of `now`
    pub fn is_fresh(&self, now: DateTime<Utc>, window: chrono::Duration) -> bool {
        now.signed_duration_since(self.last_heartbeat) <= window
    }
}

/// Agent id -> monitor ids, the complete assignment table of one distribution round
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentPlan {
    assignments: BTreeMap<AgentId, Vec<MonitorId>>,
}

impl AssignmentPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&mut self, agent_id: &str, monitor_id: MonitorId) {
        let monitors = self.assignments.entry(agent_id.to_string()).or_default();
        if !monitors.contains(&monitor_id) {
            monitors.push(monitor_id);
        }
    }

    /// Make sure an agent appears in the plan even without monitors
    pub fn ensure_agent(&mut self, agent_id: &str) {
        self.assignments.entry(agent_id.to_string()).or_default();
    }

    pub fn monitors_for(&self, agent_id: &str) -> &[MonitorId] {
        self.assignments
            .get(agent_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn agent_for(&self, monitor_id: MonitorId) -> Option<&str> {
        self.assignments
            .iter()
            .find(|(_, monitors)| monitors.contains(&monitor_id))
            .map(|(agent, _)| agent.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AgentId, &Vec<MonitorId>)> {
        self.assignments.iter()
    }

    /// Flattened `(agent, monitor)` pairs
    pub fn pairs(&self) -> Vec<(AgentId, MonitorId)> {
        self.assignments
            .iter()
            .flat_map(|(agent, monitors)| monitors.iter().map(move |m| (agent.clone(), *m)))
            .collect()
    }

    pub fn total_assigned(&self) -> usize {
        self.assignments.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_assigned() == 0
    }
}

/// Append-only outcome of one completed check cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub monitor_id: MonitorId,
    pub status: bool,
    pub status_code: Option<u16>,
    pub response_time_ms: u64,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl HistoryRecord {
    pub fn from_outcome(monitor_id: MonitorId, outcome: &Outcome) -> Self {
        Self {
            monitor_id,
            status: outcome.success,
            status_code: outcome.status_code,
            response_time_ms: outcome.response_time_ms,
            message: outcome.message.clone(),
            timestamp: outcome.checked_at,
        }
    }
}

/// Append-only record of a status transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub monitor_id: MonitorId,
    pub status: bool,
    pub status_code: Option<u16>,
    pub response_time_ms: u64,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&HistoryRecord> for AlertRecord {
    fn from(history: &HistoryRecord) -> Self {
        Self {
            monitor_id: history.monitor_id,
            status: history.status,
            status_code: history.status_code,
            response_time_ms: history.response_time_ms,
            message: history.message.clone(),
            timestamp: history.timestamp,
        }
    }
}

/// External notification registered against a monitor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationTarget {
    pub monitor_id: MonitorId,
    pub notification_id: i64,
}
