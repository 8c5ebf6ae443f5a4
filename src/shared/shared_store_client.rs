use std::{
    future::Future,
    sync::{
        Arc, LazyLock,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use redis::{AsyncCommands, Client, Script, aio::ConnectionManager};

use crate::{KeyPrefix, MediaCacheError, SharedStoreOptions, StoreKey};

// Only the caller that creates the counter sets its TTL.
static INCR_WITH_EXPIRY: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r#"
        local count = redis.call("INCR", KEYS[1])
        local expiry_seconds = tonumber(ARGV[1])

        if count == 1 and expiry_seconds > 0 then
            redis.call("EXPIRE", KEYS[1], expiry_seconds)
        end

        return count
    "#,
    )
});

/// Thin adapter over a set of [`redis::aio::ConnectionManager`]s.
///
/// Provides the store contract used by the cache and the rate limiter: get,
/// set with expiry, delete and atomic increment-with-expiry. Connections are
/// handed out round-robin; each call clones a handle and drops it on every
/// exit path, errors included.
pub struct SharedStoreClient {
    connection_managers: Arc<Vec<ConnectionManager>>,
    track_index: AtomicUsize,
    prefix: Option<KeyPrefix>,
    command_timeout: Duration,
}

impl SharedStoreClient {
    /// Connect to the configured Redis and confirm it answers `PING`.
    ///
    /// The whole sequence runs under `connect_timeout_ms`.
    pub async fn connect(options: &SharedStoreOptions) -> Result<Self, MediaCacheError> {
        let client = Client::open(options.connection_url().as_str())?;
        let connect_timeout = Duration::from_millis(options.connect_timeout_ms);

        with_timeout(connect_timeout, async {
            let store = Self::from_client(client, options).await?;
            store.ping().await?;
            Ok::<_, MediaCacheError>(store)
        })
        .await
    }

    /// Build a client from an already opened [`redis::Client`].
    ///
    /// Does not probe the server; use [`SharedStoreClient::ping`] for that.
    pub async fn from_client(
        client: Client,
        options: &SharedStoreOptions,
    ) -> Result<Self, MediaCacheError> {
        if options.connection_count == 0 {
            return Err(MediaCacheError::InvalidArgument(
                "connection count must be > 0".to_string(),
            ));
        }

        let mut connection_managers = Vec::with_capacity(options.connection_count);

        for _ in 0..options.connection_count {
            connection_managers.push(client.get_connection_manager().await?);
        }

        Ok(Self {
            connection_managers: Arc::new(connection_managers),
            track_index: AtomicUsize::new(0),
            prefix: options.prefix.clone(),
            command_timeout: Duration::from_millis(options.command_timeout_ms),
        })
    }

    /// Round-trip a `PING`.
    pub async fn ping(&self) -> Result<(), MediaCacheError> {
        let mut connection = self.connection();
        let _pong: String = self
            .bounded(redis::cmd("PING").query_async(&mut connection))
            .await?;

        Ok(())
    }

    /// Fetch the raw value under `key`.
    pub async fn get(&self, key: &StoreKey) -> Result<Option<Vec<u8>>, MediaCacheError> {
        let key = self.full_key(key);
        let mut connection = self.connection();

        let value = self.bounded(connection.get(key.as_str())).await?;

        Ok(value)
    }

    /// Store `value` under `key` with a TTL of `ttl_secs`.
    ///
    /// A zero TTL is rejected: entries in the shared store always expire.
    pub async fn set_ex(
        &self,
        key: &StoreKey,
        value: &[u8],
        ttl_secs: u64,
    ) -> Result<(), MediaCacheError> {
        if ttl_secs == 0 {
            return Err(MediaCacheError::InvalidArgument(
                "ttl must be greater than 0 for the shared store".to_string(),
            ));
        }

        let key = self.full_key(key);
        let mut connection = self.connection();

        let () = self
            .bounded(connection.set_ex(key.as_str(), value, ttl_secs))
            .await?;

        Ok(())
    }

    /// Delete `key`. Deleting a missing key succeeds.
    pub async fn delete(&self, key: &StoreKey) -> Result<(), MediaCacheError> {
        let key = self.full_key(key);
        let mut connection = self.connection();

        let _removed: u64 = self.bounded(connection.del(key.as_str())).await?;

        Ok(())
    }

    /// Atomically increment the counter under `key` and return the new value.
    ///
    /// The first increment sets the counter's TTL to `expiry_secs`; later
    /// increments leave it untouched.
    pub async fn incr_with_expiry(
        &self,
        key: &StoreKey,
        expiry_secs: u64,
    ) -> Result<u64, MediaCacheError> {
        let key = self.full_key(key);
        let mut connection = self.connection();

        let count: u64 = self
            .bounded(
                INCR_WITH_EXPIRY
                    .key(key.as_str())
                    .arg(expiry_secs)
                    .invoke_async(&mut connection),
            )
            .await?;

        Ok(count)
    }

    fn full_key(&self, key: &StoreKey) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", &**prefix, &**key),
            None => key.to_string(),
        }
    }

    fn connection(&self) -> ConnectionManager {
        let index = self.track_index.fetch_add(1, Ordering::Relaxed);
        self.connection_managers[index % self.connection_managers.len()].clone()
    } // end method connection

    async fn bounded<T, F>(&self, fut: F) -> Result<T, MediaCacheError>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        with_timeout(self.command_timeout, fut)
            .await
            .inspect_err(|err| tracing::warn!(error = %err, "shared store command failed"))
    }
} // end impl SharedStoreClient

impl std::fmt::Debug for SharedStoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedStoreClient")
            .field("connections", &self.connection_managers.len())
            .field("prefix", &self.prefix)
            .field("command_timeout", &self.command_timeout)
            .finish_non_exhaustive()
    }
}

impl Clone for SharedStoreClient {
    fn clone(&self) -> Self {
        Self {
            connection_managers: self.connection_managers.clone(),
            track_index: AtomicUsize::new(0),
            prefix: self.prefix.clone(),
            command_timeout: self.command_timeout,
        }
    }
}

async fn with_timeout<T, E, F>(timeout: Duration, fut: F) -> Result<T, MediaCacheError>
where
    F: Future<Output = Result<T, E>>,
    MediaCacheError: From<E>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result.map_err(MediaCacheError::from),
        Err(_) => Err(MediaCacheError::BackendTimeout {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}
