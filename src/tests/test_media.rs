use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use super::runtime::block_on;
use crate::{
    LocalStoreOptions, ManualClock, MediaCache, MediaCacheError,
    media::{
        ANALYTICS_TTL_SECONDS, MediaAnalytics, VIEW_RATE_LIMIT, analytics_key, signed_stream_url,
        view_rate_key,
    },
};

fn media_cache() -> (MediaCache, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(1_700_000_040));
    let mc = MediaCache::local(LocalStoreOptions::default(), clock.clone());

    (mc, clock)
}

#[test]
fn keys_follow_media_layout() {
    assert_eq!(analytics_key(42), "media_analytics:42");
    assert_eq!(view_rate_key(42, "10.0.0.1"), "rl:media:42:ip:10.0.0.1");
    assert_eq!(view_rate_key(42, ""), "rl:media:42:ip:unknown");
}

#[test]
fn stream_url_gets_expiry_ten_minutes_ahead() {
    assert_eq!(
        signed_stream_url("http://example.com/file.mp4", 1_000),
        "http://example.com/file.mp4?expires=1600"
    );
    assert_eq!(
        signed_stream_url("http://example.com/file.mp4?token=a", 1_000),
        "http://example.com/file.mp4?token=a&expires=1600"
    );
}

#[test]
fn analytics_aggregate_views() {
    let analytics = MediaAnalytics::from_views([
        ("10.0.0.1", "2026-10-16"),
        ("10.0.0.1", "2026-10-17"),
        ("10.0.0.2", "2026-10-17"),
    ]);

    assert_eq!(analytics.total_views, 3);
    assert_eq!(analytics.unique_ips, 2);
    assert_eq!(analytics.views_per_day.get("2026-10-16"), Some(&1));
    assert_eq!(analytics.views_per_day.get("2026-10-17"), Some(&2));

    assert_eq!(
        MediaAnalytics::from_views(Vec::<(&str, &str)>::new()),
        MediaAnalytics::default()
    );
}

#[test]
fn sixth_view_from_same_client_is_rejected() {
    block_on(async {
        let (mc, _clock) = media_cache();

        for _ in 0..VIEW_RATE_LIMIT {
            assert!(mc.admit_view(7, "10.0.0.1").await.unwrap().is_allowed());
        }
        assert!(!mc.admit_view(7, "10.0.0.1").await.unwrap().is_allowed());

        // Other clients and other media are unaffected.
        assert!(mc.admit_view(7, "10.0.0.2").await.unwrap().is_allowed());
        assert!(mc.admit_view(8, "10.0.0.1").await.unwrap().is_allowed());
    });
}

#[test]
fn analytics_are_computed_once_then_served_from_cache() {
    block_on(async {
        let (mc, clock) = media_cache();
        let counter = AtomicUsize::new(0);
        let computed = &counter;

        let compute = move || async move {
            computed.fetch_add(1, Ordering::SeqCst);
            Ok::<_, MediaCacheError>(MediaAnalytics::from_views([("10.0.0.1", "2026-10-17")]))
        };

        let first = mc.analytics_or_compute(42, compute).await;
        let second = mc.analytics_or_compute(42, compute).await;

        assert_eq!(first.unwrap().total_views, 1);
        assert_eq!(second.unwrap().total_views, 1);
        assert_eq!(computed.load(Ordering::SeqCst), 1);

        clock.advance(ANALYTICS_TTL_SECONDS);
        let third = mc.analytics_or_compute(42, compute).await;
        assert!(third.is_ok());
        assert_eq!(computed.load(Ordering::SeqCst), 2);
    });
}

#[test]
fn recorded_view_invalidates_cached_analytics() {
    block_on(async {
        let (mc, _clock) = media_cache();

        mc.cache()
            .setex(&analytics_key(42), ANALYTICS_TTL_SECONDS, &MediaAnalytics::default())
            .await
            .unwrap();

        assert!(mc.admit_view(42, "10.0.0.1").await.unwrap().is_allowed());
        mc.invalidate_analytics(42).await.unwrap();

        assert!(
            mc.cache()
                .get::<MediaAnalytics>(&analytics_key(42))
                .await
                .unwrap()
                .is_none()
        );
    });
}
