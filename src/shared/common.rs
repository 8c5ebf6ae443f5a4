use std::{env, ops::Deref, sync::Arc};

use serde::Deserialize;

use crate::MediaCacheError;

/// A validated namespace prepended to every shared-store key.
///
/// Constraints:
/// - Must not be empty
/// - Must not be longer than 255 bytes
/// - Must not contain colons
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct KeyPrefix(Arc<str>);

impl Deref for KeyPrefix {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<String> for KeyPrefix {
    type Error = MediaCacheError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            Err(MediaCacheError::InvalidArgument(
                "key prefix must not be empty".to_string(),
            ))
        } else if value.len() > 255 {
            Err(MediaCacheError::InvalidArgument(
                "key prefix must not be longer than 255 bytes".to_string(),
            ))
        } else if value.contains(':') {
            Err(MediaCacheError::InvalidArgument(
                "key prefix must not contain colons".to_string(),
            ))
        } else {
            Ok(Self(Arc::from(value)))
        }
    }
}

/// Configuration for the Redis shared store.
///
/// Resolved once at startup. [`SharedStoreOptions::from_env`] reads the same
/// variables the media API has always used (`REDIS_HOST`, `REDIS_PORT`,
/// `REDIS_DB`) plus an optional full `REDIS_URL`.
///
/// # Examples
///
/// ```
/// use mediacache::SharedStoreOptions;
///
/// let options = SharedStoreOptions {
///     host: "cache.internal".to_string(),
///     db: 2,
///     ..SharedStoreOptions::default()
/// };
///
/// assert_eq!(options.connection_url(), "redis://cache.internal:6379/2");
/// ```
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SharedStoreOptions {
    /// When `false` the startup probe is skipped and the local store is used.
    pub enabled: bool,

    /// Full connection URL. Takes precedence over `host`, `port` and `db`.
    pub url: Option<String>,

    /// Redis host.
    pub host: String,

    /// Redis port.
    pub port: u16,

    /// Logical database index.
    pub db: i64,

    /// Optional namespace for every key, as `<prefix>:<key>`.
    pub prefix: Option<KeyPrefix>,

    /// Number of multiplexed connections used round-robin. Must be > 0.
    pub connection_count: usize,

    /// Bound on connecting and answering the startup `PING`.
    pub connect_timeout_ms: u64,

    /// Bound on every command after startup.
    pub command_timeout_ms: u64,
}

impl Default for SharedStoreOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            url: None,
            host: "localhost".to_string(),
            port: 6379,
            db: 0,
            prefix: None,
            connection_count: 1,
            connect_timeout_ms: 500,
            command_timeout_ms: 2_000,
        }
    }
}

impl SharedStoreOptions {
    /// Resolve options from the process environment.
    ///
    /// Reads `REDIS_ENABLED`, `REDIS_URL`, `REDIS_HOST`, `REDIS_PORT` and
    /// `REDIS_DB`. Unset variables keep their defaults. Unparsable values are
    /// an error rather than a silent fallback.
    pub fn from_env() -> Result<Self, MediaCacheError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Resolve options from `lookup`, which maps a variable name to its value.
    ///
    /// Same rules as [`SharedStoreOptions::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, MediaCacheError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut options = Self::default();

        if let Some(enabled) = lookup("REDIS_ENABLED") {
            options.enabled = !matches!(
                enabled.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "no" | "off"
            );
        }
        if let Some(url) = lookup("REDIS_URL") {
            options.url = Some(url);
        }
        if let Some(host) = lookup("REDIS_HOST") {
            options.host = host;
        }
        if let Some(port) = lookup("REDIS_PORT") {
            options.port = port
                .trim()
                .parse()
                .map_err(|_| MediaCacheError::InvalidConfig(format!("REDIS_PORT `{port}`")))?;
        }
        if let Some(db) = lookup("REDIS_DB") {
            options.db = db
                .trim()
                .parse()
                .map_err(|_| MediaCacheError::InvalidConfig(format!("REDIS_DB `{db}`")))?;
        }

        Ok(options)
    }

    /// URL handed to the Redis client.
    pub fn connection_url(&self) -> String {
        match &self.url {
            Some(url) => url.clone(),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }
}
