#![doc = include_str!("../README.md")]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

mod clock;
pub use clock::*;

pub mod local;
pub use local::*;

pub mod shared;
pub use shared::*;

mod backend;
pub use backend::*;

mod cache;
pub use cache::*;

mod rate_limiter;
pub use rate_limiter::*;

mod media_cache;
pub use media_cache::*;

pub mod media;

mod error;
pub use error::*;

mod common;
pub use common::{MAX_KEY_LEN, RateLimitDecision, StoreKey, WindowSizeSeconds};

#[cfg(test)]
mod tests;
