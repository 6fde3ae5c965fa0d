//! Persistence for monitors, agents, assignments, history and alerts
//!
//! ## Design
//!
//! - **Trait-based**: `StorageBackend` lets the core run against SQLite in
//!   production and an in-memory table set in tests
//! - **Async**: All operations are async and shared across check tasks
//! - **Append-only history**: history and alert rows are never rewritten
//!
//! ## Backends
//!
//! - **SQLite** (default, feature `storage-sqlite`): embedded database with migrations
//! - **In-Memory**: no persistence, for tests and single-node experiments
//!
//! ## Usage
//!
//! ```no_run
//! use uptime_mesh::storage::{StorageBackend, sqlite::SqliteBackend};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backend = SqliteBackend::new("./uptime.db").await?;
//!     let health = backend.health_check().await?;
//!     println!("{}", health.message);
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod error;
pub mod memory;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

pub use backend::{HealthStatus, MonitorFilter, StorageBackend};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryBackend;
