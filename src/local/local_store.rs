use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use dashmap::{DashMap, mapref::entry::Entry};
use serde::Deserialize;

use crate::{Clock, MediaCacheError, StoreKey};

/// Default ceiling on the number of entries held by a [`LocalStore`].
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Configuration for the [`LocalStore`].
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LocalStoreOptions {
    /// Soft ceiling on the number of entries.
    ///
    /// When a new key would push the store past this value, expired entries
    /// are purged first; if that is not enough, the least recently used
    /// entries are evicted in batches of `max(1, max_entries / 10)`.
    pub max_entries: usize,
}

impl Default for LocalStoreOptions {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

struct LocalEntry {
    value: Arc<[u8]>,
    expires_at_secs: Option<u64>,
    last_used: AtomicU64,
}

impl LocalEntry {
    fn new(value: Arc<[u8]>, expires_at_secs: Option<u64>, tick: u64) -> Self {
        Self {
            value,
            expires_at_secs,
            last_used: AtomicU64::new(tick),
        }
    }

    fn is_expired(&self, now_secs: u64) -> bool {
        self.expires_at_secs.is_some_and(|at| now_secs >= at)
    }
}

/// Concurrent key-value map with per-entry absolute expiry.
///
/// Mirrors the subset of the shared store used by this crate: get, set with
/// expiry, delete and increment-with-expiry. Expiry times are absolute whole
/// seconds read from the injected [`Clock`]; an entry is expired once
/// `now >= expires_at`.
///
/// # Thread Safety
///
/// Every read-check-write sequence on a key (lazy expiry, counter increment)
/// runs while holding that key's shard lock, so concurrent increments of the
/// same counter never lose updates. Different keys proceed independently.
///
/// # Eviction
///
/// The entry ceiling is soft: concurrent inserts of distinct new keys may
/// briefly overshoot it by the number of racing writers.
pub struct LocalStore {
    entries: DashMap<String, LocalEntry>,
    clock: Arc<dyn Clock>,
    max_entries: usize,
    use_tick: AtomicU64,
}

impl LocalStore {
    /// Create an empty store reading time from `clock`.
    pub fn new(options: LocalStoreOptions, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
            max_entries: options.max_entries.max(1),
            use_tick: AtomicU64::new(0),
        }
    } // end method new

    /// Number of entries currently held, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Effective entry ceiling.
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Return the value under `key` if present and not expired.
    ///
    /// An expired entry is removed as a side effect.
    pub fn get(&self, key: &StoreKey) -> Option<Arc<[u8]>> {
        let now = self.clock.now_secs();

        {
            let entry = self.entries.get(&**key)?;
            if !entry.is_expired(now) {
                entry.last_used.store(self.next_tick(), Ordering::Relaxed);
                return Some(entry.value.clone());
            }
        }

        // Re-check under the write lock: a concurrent set may have replaced it.
        self.entries.remove_if(&**key, |_, entry| entry.is_expired(now));

        None
    } // end method get

    /// Store `value` under `key`, replacing any previous entry.
    ///
    /// `ttl_secs == 0` stores the entry without expiry.
    pub fn set(&self, key: &StoreKey, value: impl Into<Arc<[u8]>>, ttl_secs: u64) {
        let now = self.clock.now_secs();
        self.make_room(key, now);

        let expires_at_secs = (ttl_secs > 0).then(|| now.saturating_add(ttl_secs));
        self.entries.insert(
            key.to_string(),
            LocalEntry::new(value.into(), expires_at_secs, self.next_tick()),
        );
    } // end method set

    /// Remove `key`. Returns whether an entry was present.
    pub fn delete(&self, key: &StoreKey) -> bool {
        self.entries.remove(&**key).is_some()
    }

    /// Atomically increment the integer counter under `key` and return the new value.
    ///
    /// A missing or expired counter starts at 1 and expires `expiry_secs` from
    /// now (`0` means never). An existing counter keeps its original expiry.
    /// Fails with [`MediaCacheError::InvalidArgument`] when the key holds a
    /// value that is not a decimal integer.
    pub fn incr_with_expiry(
        &self,
        key: &StoreKey,
        expiry_secs: u64,
    ) -> Result<u64, MediaCacheError> {
        let now = self.clock.now_secs();
        self.make_room(key, now);

        let tick = self.next_tick();
        let expires_at_secs = (expiry_secs > 0).then(|| now.saturating_add(expiry_secs));

        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) if !occupied.get().is_expired(now) => {
                let current = parse_counter(&occupied.get().value).ok_or_else(|| {
                    MediaCacheError::InvalidArgument(format!("value at `{key}` is not an integer"))
                })?;
                let next = current.checked_add(1).ok_or_else(|| {
                    MediaCacheError::InvalidArgument(format!("counter at `{key}` would overflow"))
                })?;

                let entry = occupied.get_mut();
                entry.value = encode_counter(next);
                entry.last_used.store(tick, Ordering::Relaxed);

                Ok(next)
            }
            Entry::Occupied(mut occupied) => {
                occupied.insert(LocalEntry::new(encode_counter(1), expires_at_secs, tick));
                Ok(1)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(LocalEntry::new(encode_counter(1), expires_at_secs, tick));
                Ok(1)
            }
        }
    } // end method incr_with_expiry

    /// Remove every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(self.clock.now_secs())
    }

    fn purge_expired_at(&self, now_secs: u64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now_secs));
        before.saturating_sub(self.entries.len())
    }

    fn next_tick(&self) -> u64 {
        self.use_tick.fetch_add(1, Ordering::Relaxed)
    }

    // Must not be called while holding a guard into `entries`.
    fn make_room(&self, key: &StoreKey, now_secs: u64) {
        if self.entries.len() < self.max_entries || self.entries.contains_key(&**key) {
            return;
        }

        let purged = self.purge_expired_at(now_secs);
        if self.entries.len() < self.max_entries {
            tracing::debug!(purged, "local store purged expired entries");
            return;
        }

        let batch = (self.max_entries / 10).max(1);
        let excess = self.entries.len().saturating_sub(self.max_entries) + batch;

        let mut by_use: Vec<(u64, String)> = self
            .entries
            .iter()
            .map(|entry| (entry.last_used.load(Ordering::Relaxed), entry.key().clone()))
            .collect();
        by_use.sort_unstable_by_key(|(tick, _)| *tick);

        let mut evicted = 0usize;
        for (_, key) in by_use.into_iter().take(excess) {
            if self.entries.remove(&key).is_some() {
                evicted += 1;
            }
        }

        tracing::debug!(
            purged,
            evicted,
            max_entries = self.max_entries,
            "local store evicted least recently used entries"
        );
    } // end method make_room
} // end of impl

fn parse_counter(value: &[u8]) -> Option<u64> {
    std::str::from_utf8(value).ok()?.parse().ok()
}

fn encode_counter(value: u64) -> Arc<[u8]> {
    Arc::from(value.to_string().into_bytes())
}
