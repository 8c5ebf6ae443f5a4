//! Top-level entrypoint that wires the selected backend to the cache and the
//! rate limiter.

use std::sync::Arc;

use serde::Deserialize;

use crate::{
    Backend, BackendKind, Cache, Clock, FixedWindowRateLimiter, LocalStore, LocalStoreOptions,
    SharedStoreOptions, SystemClock,
};

/// Top-level configuration for [`MediaCache`].
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct MediaCacheOptions {
    /// Options for the local fallback store.
    pub local: LocalStoreOptions,
    /// Options for the Redis shared store.
    pub shared: SharedStoreOptions,
}

impl MediaCacheOptions {
    /// Default local options with shared-store options read from the environment.
    pub fn from_env() -> Result<Self, crate::MediaCacheError> {
        Ok(Self {
            local: LocalStoreOptions::default(),
            shared: SharedStoreOptions::from_env()?,
        })
    }
}

/// Cache and rate limiter sharing one backend handle.
///
/// Built once at startup and handed to request handlers (usually behind an
/// `Arc` in application state). Cloning the accessors is cheap.
pub struct MediaCache {
    backend: Arc<Backend>,
    cache: Cache,
    rate_limiter: FixedWindowRateLimiter,
}

impl MediaCache {
    /// Probe the shared store and build a [`MediaCache`] on whichever backend answered.
    pub async fn connect(options: MediaCacheOptions) -> Self {
        Self::connect_with_clock(options, Arc::new(SystemClock)).await
    }

    /// Like [`MediaCache::connect`] with an explicit clock.
    pub async fn connect_with_clock(options: MediaCacheOptions, clock: Arc<dyn Clock>) -> Self {
        let backend = Backend::select(&options.shared, options.local, clock.clone()).await;
        Self::from_backend(backend, clock)
    }

    /// Build on the local store without probing anything.
    pub fn local(options: LocalStoreOptions, clock: Arc<dyn Clock>) -> Self {
        Self::from_backend(Backend::Local(LocalStore::new(options, clock.clone())), clock)
    }

    /// Build on an already selected backend.
    pub fn from_backend(backend: Backend, clock: Arc<dyn Clock>) -> Self {
        let backend = Arc::new(backend);

        Self {
            cache: Cache::new(backend.clone()),
            rate_limiter: FixedWindowRateLimiter::new(backend.clone(), clock),
            backend,
        }
    }

    /// Access the cache.
    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Access the rate limiter.
    pub fn rate_limiter(&self) -> &FixedWindowRateLimiter {
        &self.rate_limiter
    }

    /// Access the selected backend.
    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Which backend was selected, for health and readiness reporting.
    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }
}
