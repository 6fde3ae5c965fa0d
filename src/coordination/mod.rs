//! Agent coordination over the shared agents and assignments tables
//!
//! Agents never talk to each other directly. Each one:
//!
//! 1. upserts its own heartbeat row ([`heartbeat`]),
//! 2. reads every heartbeat and derives who the master is ([`election`]),
//! 3. if it is the master, rewrites the whole assignment table ([`distributor`]).
//!
//! Two agents briefly disagreeing about the master is tolerated: both write a
//! complete assignment table and the next round converges.

pub mod distributor;
pub mod election;
pub mod heartbeat;

pub use distributor::{TaskDistributor, plan_assignments};
pub use election::CoordinationSnapshot;
pub use heartbeat::HeartbeatRegistry;
