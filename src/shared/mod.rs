//! Redis-backed shared store.
//!
//! The shared store is used whenever it answers the startup probe. All
//! processes pointed at the same Redis database share cache entries and
//! rate-limit counters.
//!
//! # Consistency Semantics
//!
//! - **Atomic increments:** the counter increment and its conditional expiry
//!   run in one Lua script, so only the caller that creates a counter sets its
//!   TTL and no counter is left without one
//! - **Native expiry:** cache entries use `SET ... EX`, so Redis itself drops
//!   them when their TTL runs out
//! - **Bounded calls:** every command runs under a timeout; a stalled
//!   connection fails one request instead of hanging it

mod common;
pub use common::*;

mod shared_store_client;
pub use shared_store_client::*;
