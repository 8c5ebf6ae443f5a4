use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::runtime::block_on;
use crate::{BackendKind, LocalStoreOptions, ManualClock, MediaCache, MediaCacheError};

fn local_cache() -> (MediaCache, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(1_700_000_000));
    let mc = MediaCache::local(LocalStoreOptions::default(), clock.clone());

    (mc, clock)
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Totals {
    total: u64,
}

#[test]
fn local_cache_reports_local_backend() {
    let (mc, _clock) = local_cache();

    assert_eq!(mc.backend_kind(), BackendKind::Local);
    assert!(!mc.backend().is_shared());
}

#[test]
fn get_missing_key_is_none_not_error() {
    block_on(async {
        let (mc, _clock) = local_cache();

        let value: Option<Totals> = mc.cache().get("missing").await.unwrap();
        assert!(value.is_none());
    });
}

#[test]
fn setex_then_get_returns_same_value() {
    block_on(async {
        let (mc, _clock) = local_cache();

        mc.cache()
            .setex("totals", 60, &Totals { total: 3 })
            .await
            .unwrap();

        let value: Option<Totals> = mc.cache().get("totals").await.unwrap();
        assert_eq!(value, Some(Totals { total: 3 }));
    });
}

#[test]
fn get_after_ttl_elapsed_is_none() {
    block_on(async {
        let (mc, clock) = local_cache();

        mc.cache().setex("k", 30, &json!("v")).await.unwrap();

        clock.advance(29);
        assert!(mc.cache().get::<String>("k").await.unwrap().is_some());

        clock.advance(1);
        assert!(mc.cache().get::<String>("k").await.unwrap().is_none());
    });
}

#[test]
fn setex_replaces_previous_value_and_ttl() {
    block_on(async {
        let (mc, clock) = local_cache();

        mc.cache().setex("k", 10, &1u32).await.unwrap();
        clock.advance(5);
        mc.cache().setex("k", 10, &2u32).await.unwrap();
        clock.advance(7);

        assert_eq!(mc.cache().get::<u32>("k").await.unwrap(), Some(2));
    });
}

#[test]
fn zero_ttl_on_local_store_keeps_entry() {
    block_on(async {
        let (mc, clock) = local_cache();

        mc.cache().setex("k", 0, &true).await.unwrap();
        clock.advance(86_400 * 365);

        assert_eq!(mc.cache().get::<bool>("k").await.unwrap(), Some(true));
    });
}

#[test]
fn delete_twice_and_on_missing_key_succeeds() {
    block_on(async {
        let (mc, _clock) = local_cache();

        mc.cache().setex("k", 60, &"v").await.unwrap();

        mc.cache().delete("k").await.unwrap();
        mc.cache().delete("k").await.unwrap();
        mc.cache().delete("never-set").await.unwrap();

        assert!(mc.cache().get::<String>("k").await.unwrap().is_none());
    });
}

#[test]
fn raw_bytes_round_trip_without_json() {
    block_on(async {
        let (mc, _clock) = local_cache();

        mc.cache().setex_raw("blob", 60, vec![0u8, 159, 146, 150]).await.unwrap();

        assert_eq!(
            mc.cache().get_raw("blob").await.unwrap(),
            Some(vec![0u8, 159, 146, 150])
        );
    });
}

#[test]
fn empty_key_is_invalid_argument_on_every_operation() {
    block_on(async {
        let (mc, _clock) = local_cache();

        assert!(matches!(
            mc.cache().get::<String>("").await,
            Err(MediaCacheError::InvalidArgument(_))
        ));
        assert!(matches!(
            mc.cache().setex("", 60, &"v").await,
            Err(MediaCacheError::InvalidArgument(_))
        ));
        assert!(matches!(
            mc.cache().delete("").await,
            Err(MediaCacheError::InvalidArgument(_))
        ));
    });
}

#[test]
fn value_of_wrong_shape_is_serialization_error() {
    block_on(async {
        let (mc, _clock) = local_cache();

        mc.cache().setex("k", 60, &json!({"total": "three"})).await.unwrap();

        assert!(matches!(
            mc.cache().get::<Totals>("k").await,
            Err(MediaCacheError::Serialization(_))
        ));
    });
}

#[test]
fn analytics_scenario_set_get_delete() {
    block_on(async {
        let (mc, _clock) = local_cache();

        mc.cache()
            .setex("analytics:42", 3600, &json!({"total": 3}))
            .await
            .unwrap();
        assert_eq!(
            mc.cache().get::<serde_json::Value>("analytics:42").await.unwrap(),
            Some(json!({"total": 3}))
        );

        mc.cache().delete("analytics:42").await.unwrap();
        assert!(
            mc.cache()
                .get::<serde_json::Value>("analytics:42")
                .await
                .unwrap()
                .is_none()
        );
    });
}
