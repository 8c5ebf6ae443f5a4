use std::{ops::Deref, sync::Arc};

use crate::MediaCacheError;

/// Longest caller-supplied key accepted by either backend.
///
/// Rate-limit counter keys derived from a caller key carry an extra
/// `:{window_id}` suffix and may run up to 21 bytes past this.
pub const MAX_KEY_LEN: usize = 512;

/// A validated, non-empty store key.
///
/// Keys are opaque to the store: colons are allowed and expected, since
/// callers namespace keys as `resource:id:...`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreKey(Arc<str>);

impl Deref for StoreKey {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl StoreKey {
    // Suffixed keys skip the length check; the base key was validated.
    pub(crate) fn with_suffix(&self, suffix: impl std::fmt::Display) -> Self {
        Self(Arc::from(format!("{}:{suffix}", self.0)))
    }
}

impl std::fmt::Display for StoreKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<&str> for StoreKey {
    type Error = MediaCacheError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        if value.is_empty() {
            Err(MediaCacheError::InvalidArgument(
                "key must not be empty".to_string(),
            ))
        } else if value.len() > MAX_KEY_LEN {
            Err(MediaCacheError::InvalidArgument(format!(
                "key must not be longer than {MAX_KEY_LEN} bytes"
            )))
        } else {
            Ok(Self(Arc::from(value)))
        }
    }
}

impl TryFrom<String> for StoreKey {
    type Error = MediaCacheError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

/// Length of a fixed rate-limit window, in seconds. Always at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WindowSizeSeconds(u64);

impl WindowSizeSeconds {
    /// Index of the window containing `now_secs`.
    pub fn window_id(&self, now_secs: u64) -> u64 {
        now_secs / self.0
    }

    /// Seconds from `now_secs` until the window containing it closes.
    pub fn remaining(&self, now_secs: u64) -> u64 {
        (self.window_id(now_secs) + 1) * self.0 - now_secs
    }
}

impl Deref for WindowSizeSeconds {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<u64> for WindowSizeSeconds {
    type Error = MediaCacheError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value == 0 {
            Err(MediaCacheError::InvalidArgument(
                "window size must be at least 1 second".to_string(),
            ))
        } else {
            Ok(Self(value))
        }
    }
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// The request is admitted.
    Allowed {
        /// Count in the current window after this request.
        count: u64,
        /// Limit the count was checked against.
        limit: u64,
    },
    /// The request is over the limit for the current window.
    ///
    /// Carries a hint for callers that want to send `Retry-After`.
    Rejected {
        /// Window size used for the decision.
        window_size_seconds: u64,
        /// Seconds until the current window closes.
        retry_after_secs: u64,
        /// Count in the current window after this request.
        count: u64,
    },
}

impl RateLimitDecision {
    /// `true` for [`RateLimitDecision::Allowed`].
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}
