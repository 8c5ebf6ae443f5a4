use std::sync::Arc;

use crate::{Backend, Clock, MediaCacheError, RateLimitDecision, StoreKey, WindowSizeSeconds};

/// Fixed-window rate limiter over the selected backend.
///
/// # Algorithm
///
/// 1. **Window:** `window_id = floor(now / window_seconds)`
/// 2. **Counter:** the composite key `"{key}:{window_id}"`
/// 3. **Increment:** atomically add 1; the increment that creates the counter
///    also gives it a TTL of `window_seconds`
/// 4. **Decision:** allow while the post-increment count is `<= limit`
///
/// Every request is counted, including rejected ones, so a client hammering
/// a limited key stays limited until the window rolls over.
///
/// # Semantics & Limitations
///
/// **Exact admission:**
/// - The increment is atomic per counter on both backends
/// - N concurrent calls with `limit = L < N` admit exactly L of them
///
/// **Boundary bursts:**
/// - Windows are aligned to multiples of `window_seconds` since the epoch
/// - A burst straddling a boundary can admit up to `2 × limit` requests in a
///   short interval; this is inherent to fixed windows
///
/// **Timestamp attribution:**
/// - A request is counted in the window computed from its own timestamp, so a
///   late request lands in the new window rather than the stale one
///
/// # Examples
///
/// ```
/// # use std::sync::Arc;
/// # use mediacache::{LocalStoreOptions, ManualClock, MediaCache};
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let clock = Arc::new(ManualClock::new(1_000_020));
/// let mc = MediaCache::local(LocalStoreOptions::default(), clock.clone());
/// let limiter = mc.rate_limiter();
///
/// for _ in 0..5 {
///     assert!(limiter.check_and_increment("rl:media:1:ip:10.0.0.1", 5, 60).await?);
/// }
/// assert!(!limiter.check_and_increment("rl:media:1:ip:10.0.0.1", 5, 60).await?);
///
/// clock.advance(60);
/// assert!(limiter.check_and_increment("rl:media:1:ip:10.0.0.1", 5, 60).await?);
/// # Ok::<_, mediacache::MediaCacheError>(())
/// # }).unwrap();
/// ```
#[derive(Clone)]
pub struct FixedWindowRateLimiter {
    backend: Arc<Backend>,
    clock: Arc<dyn Clock>,
}

impl FixedWindowRateLimiter {
    pub(crate) fn new(backend: Arc<Backend>, clock: Arc<dyn Clock>) -> Self {
        Self { backend, clock }
    }

    /// Count one request for `key` and report whether it is within `limit`.
    pub async fn check_and_increment(
        &self,
        key: &str,
        limit: u64,
        window_seconds: u64,
    ) -> Result<bool, MediaCacheError> {
        Ok(self.inc(key, limit, window_seconds).await?.is_allowed())
    }

    /// Count one request for `key` and return the full decision.
    ///
    /// # Returns
    ///
    /// - [`RateLimitDecision::Allowed`]: within the limit for the current window
    /// - [`RateLimitDecision::Rejected`]: over the limit, with the seconds left
    ///   until the window closes
    ///
    /// A `limit` of 0 always rejects without touching the store. A
    /// `window_seconds` of 0, an empty key or a key longer than
    /// [`MAX_KEY_LEN`](crate::MAX_KEY_LEN) is [`MediaCacheError::InvalidArgument`].
    /// Any key the cache accepts is accepted here too.
    pub async fn inc(
        &self,
        key: &str,
        limit: u64,
        window_seconds: u64,
    ) -> Result<RateLimitDecision, MediaCacheError> {
        let window = WindowSizeSeconds::try_from(window_seconds)?;
        let key = StoreKey::try_from(key)?;

        let now = self.clock.now_secs();

        if limit == 0 {
            return Ok(RateLimitDecision::Rejected {
                window_size_seconds: *window,
                retry_after_secs: window.remaining(now),
                count: 0,
            });
        }

        let counter_key = key.with_suffix(window.window_id(now));
        let count = self.backend.incr_with_expiry(&counter_key, *window).await?;

        if count <= limit {
            return Ok(RateLimitDecision::Allowed { count, limit });
        }

        tracing::debug!(key = %key, count, limit, "rate limit exceeded");

        Ok(RateLimitDecision::Rejected {
            window_size_seconds: *window,
            retry_after_secs: window.remaining(now),
            count,
        })
    } // end method inc
}
