//! Distributed uptime monitoring core
//!
//! A fleet of agents shares one database. Every agent reports a heartbeat,
//! the agent with the smallest live id acts as master and spreads monitors
//! over the live agents, and each agent probes its own share, records history
//! and raises alerts when a monitor flips between up and down.
//!
//! ```text
//! agent::AgentRuntime
//!   ├── coordination::{heartbeat, election, distributor}
//!   └── scheduler ─▶ probe ─▶ tracker ─▶ alerts
//!                              │
//!                          storage (SQLite / in-memory)
//! ```

pub mod agent;
pub mod alerts;
#[cfg(feature = "api")]
pub mod api;
pub mod config;
pub mod coordination;
pub mod model;
pub mod probe;
pub mod scheduler;
pub mod storage;
pub mod tracker;
pub mod util;
