use std::sync::Arc;

use serde::{Serialize, de::DeserializeOwned};

use crate::{Backend, MediaCacheError, StoreKey};

/// Get / set-with-TTL / delete over the selected backend.
///
/// Typed values are stored as JSON. Both backends give the same
/// read-after-write and expiry behaviour: a `get` right after `setex` returns
/// the stored value, and a `get` once `ttl_secs` have elapsed returns `None`.
///
/// # Examples
///
/// ```
/// # use std::sync::Arc;
/// # use mediacache::{LocalStoreOptions, MediaCache, SystemClock};
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let mc = MediaCache::local(LocalStoreOptions::default(), Arc::new(SystemClock));
/// let cache = mc.cache();
///
/// cache.setex("analytics:42", 3600, &serde_json::json!({"total": 3})).await?;
/// let hit: Option<serde_json::Value> = cache.get("analytics:42").await?;
/// assert_eq!(hit, Some(serde_json::json!({"total": 3})));
///
/// cache.delete("analytics:42").await?;
/// assert!(cache.get::<serde_json::Value>("analytics:42").await?.is_none());
/// # Ok::<_, mediacache::MediaCacheError>(())
/// # }).unwrap();
/// ```
#[derive(Clone)]
pub struct Cache {
    backend: Arc<Backend>,
}

impl Cache {
    pub(crate) fn new(backend: Arc<Backend>) -> Self {
        Self { backend }
    }

    /// Return the value under `key`, or `None` when missing or expired.
    ///
    /// A stored value that does not decode as `T` is a
    /// [`MediaCacheError::Serialization`] error, not a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, MediaCacheError> {
        match self.get_raw(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Return the raw bytes under `key`.
    pub async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, MediaCacheError> {
        let key = StoreKey::try_from(key)?;
        let value = self.backend.get(&key).await?;

        if value.is_none() {
            tracing::debug!(key = %key, "cache miss");
        }

        Ok(value)
    }

    /// Store `value` as JSON under `key` for `ttl_secs` seconds.
    ///
    /// `ttl_secs == 0` keeps the entry until deleted on the local store and is
    /// rejected with [`MediaCacheError::InvalidArgument`] on the shared store.
    pub async fn setex<T: Serialize + ?Sized>(
        &self,
        key: &str,
        ttl_secs: u64,
        value: &T,
    ) -> Result<(), MediaCacheError> {
        let bytes = serde_json::to_vec(value)?;
        self.setex_raw(key, ttl_secs, bytes).await
    }

    /// Store raw bytes under `key` for `ttl_secs` seconds.
    pub async fn setex_raw(
        &self,
        key: &str,
        ttl_secs: u64,
        value: impl Into<Vec<u8>>,
    ) -> Result<(), MediaCacheError> {
        let key = StoreKey::try_from(key)?;
        self.backend.set_ex(&key, value.into(), ttl_secs).await
    }

    /// Remove `key`. Removing a missing key succeeds.
    pub async fn delete(&self, key: &str) -> Result<(), MediaCacheError> {
        let key = StoreKey::try_from(key)?;
        self.backend.delete(&key).await
    }
}
