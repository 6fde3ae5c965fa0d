//! API shared state

use std::sync::Arc;

use crate::agent::AgentRuntime;

/// Shared state passed to all API handlers
#[derive(Clone)]
pub struct ApiState {
    pub runtime: Arc<AgentRuntime>,
}

impl ApiState {
    pub fn new(runtime: Arc<AgentRuntime>) -> Self {
        Self { runtime }
    }
}
