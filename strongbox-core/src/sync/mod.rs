//! Bidirectional reconciliation between the local cache and the server.
//!
//! - `engine`: the client-driven cycle
//! - `planner`: the server-side computation of push-down and pull-up sets
//! - `conflict`: the last-writer-wins rule both halves agree on
//! - `scheduler`: the periodic background task

pub mod conflict;
pub mod engine;
pub mod planner;
pub mod scheduler;

pub use conflict::{server_wins, ConflictResolver, Resolution};
pub use engine::{SyncEngine, SyncReport};
pub use scheduler::{spawn_periodic_sync, DEFAULT_SYNC_INTERVAL};
