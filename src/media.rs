//! Cache and rate-limit conventions of the media API.
//!
//! Handlers for the media routes use these helpers so that every process
//! agrees on key layout, limits and TTLs:
//!
//! - `POST /media/{id}/view` is limited per client address with
//!   [`MediaCache::admit_view`] and invalidates the analytics entry with
//!   [`MediaCache::invalidate_analytics`] once the view is recorded
//! - `GET /media/{id}/analytics` is served through
//!   [`MediaCache::analytics_or_compute`]
//! - `GET /media/{id}/stream-url` uses [`signed_stream_url`]

use std::{
    collections::{BTreeMap, HashSet},
    future::Future,
};

use serde::{Deserialize, Serialize};

use crate::{MediaCache, MediaCacheError, RateLimitDecision};

/// Views allowed per client and media item in one window.
pub const VIEW_RATE_LIMIT: u64 = 5;

/// Length of the view rate-limit window.
pub const VIEW_RATE_WINDOW_SECONDS: u64 = 60;

/// How long computed analytics stay cached.
pub const ANALYTICS_TTL_SECONDS: u64 = 3_600;

/// Lifetime of a signed stream URL.
pub const STREAM_URL_TTL_SECONDS: u64 = 600;

/// Cache key of the analytics for `media_id`.
pub fn analytics_key(media_id: i64) -> String {
    format!("media_analytics:{media_id}")
}

/// Rate-limit key for views of `media_id` from `client_host`.
///
/// An empty host (no peer address available) is counted as `unknown`.
pub fn view_rate_key(media_id: i64, client_host: &str) -> String {
    let client_host = if client_host.is_empty() {
        "unknown"
    } else {
        client_host
    };

    format!("rl:media:{media_id}:ip:{client_host}")
}

/// Append an `expires` query parameter [`STREAM_URL_TTL_SECONDS`] after `now_secs`.
pub fn signed_stream_url(file_url: &str, now_secs: u64) -> String {
    let separator = if file_url.contains('?') { '&' } else { '?' };
    let expires = now_secs.saturating_add(STREAM_URL_TTL_SECONDS);

    format!("{file_url}{separator}expires={expires}")
}

/// View statistics for one media item, as cached under [`analytics_key`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAnalytics {
    /// Number of recorded views.
    pub total_views: u64,
    /// Number of distinct client addresses.
    pub unique_ips: u64,
    /// Views per calendar day, keyed `YYYY-MM-DD`.
    pub views_per_day: BTreeMap<String, u64>,
}

impl MediaAnalytics {
    /// Aggregate `(client_host, day)` pairs from the view log.
    pub fn from_views<'a, I>(views: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut analytics = Self::default();
        let mut hosts = HashSet::new();

        for (client_host, day) in views {
            analytics.total_views += 1;
            hosts.insert(client_host);
            *analytics.views_per_day.entry(day.to_string()).or_default() += 1;
        }

        analytics.unique_ips = hosts.len() as u64;
        analytics
    }
}

impl MediaCache {
    /// Count a view of `media_id` from `client_host` against the view limit.
    pub async fn admit_view(
        &self,
        media_id: i64,
        client_host: &str,
    ) -> Result<RateLimitDecision, MediaCacheError> {
        self.rate_limiter()
            .inc(
                &view_rate_key(media_id, client_host),
                VIEW_RATE_LIMIT,
                VIEW_RATE_WINDOW_SECONDS,
            )
            .await
    }

    /// Drop the cached analytics of `media_id`.
    pub async fn invalidate_analytics(&self, media_id: i64) -> Result<(), MediaCacheError> {
        self.cache().delete(&analytics_key(media_id)).await
    }

    /// Return cached analytics for `media_id`, computing and caching them on a miss.
    ///
    /// `compute` runs only on a miss; its result is cached for
    /// [`ANALYTICS_TTL_SECONDS`].
    pub async fn analytics_or_compute<F, Fut, E>(
        &self,
        media_id: i64,
        compute: F,
    ) -> Result<MediaAnalytics, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<MediaAnalytics, E>>,
        E: From<MediaCacheError>,
    {
        let key = analytics_key(media_id);

        if let Some(cached) = self.cache().get::<MediaAnalytics>(&key).await? {
            return Ok(cached);
        }

        let analytics = compute().await?;
        self.cache()
            .setex(&key, ANALYTICS_TTL_SECONDS, &analytics)
            .await?;

        Ok(analytics)
    }
}
