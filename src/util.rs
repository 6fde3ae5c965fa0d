const AGENT_ID: &str = "AGENT_ID";

const AGENT_REGION: &str = "AGENT_REGION";

const DEFAULT_PORT: u16 = 51243;

pub fn get_default_port() -> u16 {
    DEFAULT_PORT
}

pub fn get_agent_id() -> Option<String> {
    std::env::var(AGENT_ID).ok().filter(|id| !id.trim().is_empty())
}

pub fn get_agent_region() -> Option<String> {
    std::env::var(AGENT_REGION).ok().filter(|r| !r.trim().is_empty())
}

/// Hostname of this machine, used as the agent id when none is configured
pub fn get_hostname() -> String {
    sysinfo::System::host_name().unwrap_or_else(|| "localhost".to_string())
}

pub fn get_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
