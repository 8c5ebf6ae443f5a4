/// Error type for this crate.
///
/// Cache misses and allowed rate-limit decisions are normal results and never
/// surface as errors. A shared store that is unreachable at startup is not an
/// error either: the backend selector falls back to the local store.
#[derive(Debug, thiserror::Error)]
pub enum MediaCacheError {
    /// The shared store failed after it was selected.
    #[error("shared store error: {0}")]
    Backend(#[from] redis::RedisError),

    /// A shared store command did not complete in time.
    #[error("shared store command timed out after {timeout_ms} ms")]
    BackendTimeout {
        /// Timeout that elapsed.
        timeout_ms: u64,
    },

    /// The caller passed an argument the backend cannot accept.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A typed value could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration could not be resolved.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl MediaCacheError {
    /// Whether this error came from the shared store rather than from the caller.
    ///
    /// Callers use this to decide between failing the request and degrading it
    /// (for example by skipping the cache).
    pub fn is_backend_error(&self) -> bool {
        matches!(self, Self::Backend(_) | Self::BackendTimeout { .. })
    }
}
