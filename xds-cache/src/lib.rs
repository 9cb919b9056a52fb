//! Application cache (C2) and snapshot cache (C5): the two concurrently
//! accessed stores that sit between the endpoint watcher manager (C3) and
//! the ADS stream state machine (C6).

pub mod app_cache;
pub mod error;
pub mod node_hash;
pub mod snapshot;

pub use app_cache::{ApplicationCache, Scope};
pub use error::{Error, Result};
pub use node_hash::{DefaultNodeHash, FixedHash, NodeHash};
pub use snapshot::{ChangeEvent, Snapshot, SnapshotCache, TypeEntry};
