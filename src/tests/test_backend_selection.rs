use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use super::runtime::block_on;
use crate::{
    Backend, BackendKind, LocalStoreOptions, MediaCache, MediaCacheError, MediaCacheOptions,
    SharedStoreOptions, SystemClock,
};

fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();

    move |name| vars.get(name).cloned()
}

fn unreachable_shared() -> SharedStoreOptions {
    SharedStoreOptions {
        // Port 1 is reserved and refuses connections on test hosts.
        host: "127.0.0.1".to_string(),
        port: 1,
        connect_timeout_ms: 300,
        ..SharedStoreOptions::default()
    }
}

#[test]
fn unreachable_shared_store_falls_back_to_local() {
    block_on(async {
        let started = Instant::now();
        let backend = Backend::select(
            &unreachable_shared(),
            LocalStoreOptions::default(),
            Arc::new(SystemClock),
        )
        .await;

        assert_eq!(backend.kind(), BackendKind::Local);
        assert!(started.elapsed() < Duration::from_secs(5));
    });
}

#[test]
fn disabled_shared_store_skips_probe() {
    block_on(async {
        let shared = SharedStoreOptions {
            enabled: false,
            ..unreachable_shared()
        };

        let backend =
            Backend::select(&shared, LocalStoreOptions::default(), Arc::new(SystemClock)).await;

        assert!(!backend.is_shared());
    });
}

#[test]
fn malformed_url_falls_back_to_local() {
    block_on(async {
        let shared = SharedStoreOptions {
            url: Some("not a url".to_string()),
            ..SharedStoreOptions::default()
        };

        let backend =
            Backend::select(&shared, LocalStoreOptions::default(), Arc::new(SystemClock)).await;

        assert_eq!(backend.kind(), BackendKind::Local);
    });
}

#[test]
fn fallback_media_cache_still_serves_requests() {
    block_on(async {
        let mc = MediaCache::connect(MediaCacheOptions {
            local: LocalStoreOptions::default(),
            shared: unreachable_shared(),
        })
        .await;

        assert_eq!(mc.backend_kind(), BackendKind::Local);

        mc.cache().setex("k", 60, &"v").await.unwrap();
        assert_eq!(
            mc.cache().get::<String>("k").await.unwrap().as_deref(),
            Some("v")
        );
        assert!(mc.rate_limiter().check_and_increment("rl", 1, 60).await.unwrap());
    });
}

#[test]
fn shared_options_build_url_from_parts_or_take_override() {
    let options = SharedStoreOptions {
        host: "redis.internal".to_string(),
        port: 6380,
        db: 3,
        ..SharedStoreOptions::default()
    };
    assert_eq!(options.connection_url(), "redis://redis.internal:6380/3");

    let options = SharedStoreOptions {
        url: Some("redis://other:6379/1".to_string()),
        ..options
    };
    assert_eq!(options.connection_url(), "redis://other:6379/1");
}

#[test]
fn options_deserialize_with_defaults() {
    let options: MediaCacheOptions = serde_json::from_str(
        r#"{ "shared": { "host": "cache", "prefix": "media" }, "local": { "max_entries": 50 } }"#,
    )
    .unwrap();

    assert_eq!(options.local.max_entries, 50);
    assert_eq!(options.shared.host, "cache");
    assert_eq!(options.shared.port, 6379);
    assert_eq!(options.shared.prefix.as_deref(), Some("media"));
    assert!(options.shared.enabled);

    let invalid = serde_json::from_str::<MediaCacheOptions>(r#"{ "shared": { "prefix": "a:b" } }"#);
    assert!(invalid.is_err());
}

#[test]
fn env_lookup_reads_host_port_db_and_enabled() {
    let options = SharedStoreOptions::from_lookup(lookup_from(&[
        ("REDIS_HOST", "redis.internal"),
        ("REDIS_PORT", " 6380 "),
        ("REDIS_DB", "4"),
        ("REDIS_ENABLED", "false"),
    ]))
    .unwrap();

    assert_eq!(options.host, "redis.internal");
    assert_eq!(options.port, 6380);
    assert_eq!(options.db, 4);
    assert!(!options.enabled);
    assert!(options.url.is_none());
    assert_eq!(options.connection_url(), "redis://redis.internal:6380/4");

    let options = SharedStoreOptions::from_lookup(lookup_from(&[
        ("REDIS_ENABLED", "yes"),
        ("REDIS_URL", "redis://other:6379/2"),
    ]))
    .unwrap();
    assert!(options.enabled);
    assert_eq!(options.connection_url(), "redis://other:6379/2");
}

#[test]
fn env_lookup_with_nothing_set_keeps_defaults() {
    let options = SharedStoreOptions::from_lookup(lookup_from(&[])).unwrap();

    assert!(options.enabled);
    assert_eq!(options.connection_url(), "redis://localhost:6379/0");
}

#[test]
fn env_lookup_rejects_unparsable_port_and_db() {
    let err = SharedStoreOptions::from_lookup(lookup_from(&[("REDIS_PORT", "six")])).unwrap_err();
    assert!(matches!(err, MediaCacheError::InvalidConfig(_)));
    assert!(err.to_string().contains("REDIS_PORT"));

    let err = SharedStoreOptions::from_lookup(lookup_from(&[("REDIS_PORT", "70000")])).unwrap_err();
    assert!(matches!(err, MediaCacheError::InvalidConfig(_)));

    let err = SharedStoreOptions::from_lookup(lookup_from(&[("REDIS_DB", "first")])).unwrap_err();
    assert!(matches!(err, MediaCacheError::InvalidConfig(_)));
    assert!(err.to_string().contains("REDIS_DB"));
}
