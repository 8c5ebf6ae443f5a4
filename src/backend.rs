//! Backend selection.
//!
//! [`Backend::select`] probes the shared store once. The result is fixed for
//! the lifetime of the returned value: calls are never re-routed, and a
//! shared-store failure after selection is reported to the caller instead of
//! being downgraded to the local store.

use std::sync::Arc;

use crate::{
    Clock, LocalStore, LocalStoreOptions, MediaCacheError, SharedStoreClient, SharedStoreOptions,
    StoreKey,
};

/// Which store a [`Backend`] routes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// The Redis shared store.
    Shared,
    /// The in-process fallback.
    Local,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Shared => f.write_str("shared"),
            Self::Local => f.write_str("local"),
        }
    }
}

/// The store chosen at startup.
///
/// Both variants expose the same contract, so the cache and the rate limiter
/// never need to know which one is active.
pub enum Backend {
    /// Redis shared store.
    Shared(SharedStoreClient),
    /// In-process fallback store.
    Local(LocalStore),
}

impl Backend {
    /// Probe the shared store and pick a backend.
    ///
    /// Never fails: an unreachable, misconfigured or disabled shared store
    /// selects the local store.
    pub async fn select(
        shared: &SharedStoreOptions,
        local: LocalStoreOptions,
        clock: Arc<dyn Clock>,
    ) -> Self {
        if !shared.enabled {
            tracing::info!("shared store disabled, using local store");
            return Self::Local(LocalStore::new(local, clock));
        }

        match SharedStoreClient::connect(shared).await {
            Ok(client) => {
                tracing::info!(
                    host = %shared.host,
                    port = shared.port,
                    db = shared.db,
                    "shared store reachable, using it for cache and rate limits"
                );
                Self::Shared(client)
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    "shared store unavailable, falling back to local store"
                );
                Self::Local(LocalStore::new(local, clock))
            }
        }
    }

    /// The active store.
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Shared(_) => BackendKind::Shared,
            Self::Local(_) => BackendKind::Local,
        }
    }

    /// `true` when routing to the shared store.
    pub fn is_shared(&self) -> bool {
        matches!(self, Self::Shared(_))
    }

    pub(crate) async fn get(&self, key: &StoreKey) -> Result<Option<Vec<u8>>, MediaCacheError> {
        match self {
            Self::Shared(client) => client.get(key).await,
            Self::Local(store) => Ok(store.get(key).map(|value| value.to_vec())),
        }
    }

    pub(crate) async fn set_ex(
        &self,
        key: &StoreKey,
        value: Vec<u8>,
        ttl_secs: u64,
    ) -> Result<(), MediaCacheError> {
        match self {
            Self::Shared(client) => client.set_ex(key, &value, ttl_secs).await,
            Self::Local(store) => {
                store.set(key, value, ttl_secs);
                Ok(())
            }
        }
    }

    pub(crate) async fn delete(&self, key: &StoreKey) -> Result<(), MediaCacheError> {
        match self {
            Self::Shared(client) => client.delete(key).await,
            Self::Local(store) => {
                store.delete(key);
                Ok(())
            }
        }
    }

    pub(crate) async fn incr_with_expiry(
        &self,
        key: &StoreKey,
        expiry_secs: u64,
    ) -> Result<u64, MediaCacheError> {
        match self {
            Self::Shared(client) => client.incr_with_expiry(key, expiry_secs).await,
            Self::Local(store) => store.incr_with_expiry(key, expiry_secs),
        }
    }
}
