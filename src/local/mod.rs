//! In-process fallback store.
//!
//! The local store keeps cache entries and rate-limit counters in a
//! [`DashMap`](dashmap::DashMap) inside the current process. It is selected
//! only when the shared store cannot be reached at startup.
//!
//! # Key Characteristics
//!
//! - **Thread-safe:** per-key operations run under the map's shard lock
//! - **No I/O:** operations never await or block on the network
//! - **Process-scoped:** state is lost on restart and not shared between processes
//! - **Bounded:** a soft entry ceiling with least-recently-used eviction
//!
//! Expired entries are removed lazily when read, when room is needed for a new
//! key, or when [`LocalStore::purge_expired`] is called. There is no background
//! sweeper.

mod local_store;
pub use local_store::*;
