//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the cache against a plain map model and to check
//! fetch deduplication under arbitrary fan-in.

use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::cache::{CacheEventKind, MapCache};
use crate::events::handler;

type TestCache = MapCache<String, String, String>;

// == Strategies ==
/// Small key space so operations collide often
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-d]"
}

fn value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{1,32}"
}

#[derive(Debug, Clone)]
enum CacheOp {
    Set {
        key: String,
        value: String,
        expire_at: u64,
    },
    Remove {
        key: String,
    },
    RemoveExpiredAt {
        key: String,
        now: u64,
    },
    Clean,
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (key_strategy(), value_strategy(), 0u64..2_000).prop_map(|(key, value, expire_at)| {
            CacheOp::Set {
                key,
                value,
                expire_at,
            }
        }),
        key_strategy().prop_map(|key| CacheOp::Remove { key }),
        (key_strategy(), 0u64..2_000).prop_map(|(key, now)| CacheOp::RemoveExpiredAt { key, now }),
        Just(CacheOp::Clean),
    ]
}

fn counter_for(cache: &TestCache, kind: CacheEventKind) -> Arc<AtomicUsize> {
    let count = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&count);
    cache.events().subscribe(
        kind,
        handler(move |_| {
            sink.fetch_add(1, Ordering::SeqCst);
        }),
    );
    count
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Stored state and emitted events follow a plain map model for any
    // sequence of store/remove/expiry operations.
    #[test]
    fn prop_matches_map_model(ops in prop::collection::vec(cache_op_strategy(), 1..60)) {
        let cache = TestCache::new();
        let sets = counter_for(&cache, CacheEventKind::Set);
        let deletes = counter_for(&cache, CacheEventKind::Delete);

        let mut model: HashMap<String, (String, u64)> = HashMap::new();
        let mut expected_sets = 0;
        let mut expected_deletes = 0;

        for op in ops {
            match op {
                CacheOp::Set { key, value, expire_at } => {
                    cache.set(key.clone(), value.clone(), Some(expire_at));
                    model.insert(key, (value, expire_at));
                    expected_sets += 1;
                }
                CacheOp::Remove { key } => {
                    cache.remove(&key);
                    model.remove(&key);
                    expected_deletes += 1;
                }
                CacheOp::RemoveExpiredAt { key, now } => {
                    let expired = model.get(&key).is_some_and(|(_, at)| *at < now);
                    prop_assert_eq!(cache.remove_expired_at(&key, now), expired);
                    if expired {
                        model.remove(&key);
                        expected_deletes += 1;
                    }
                }
                CacheOp::Clean => {
                    // Every generated expiry lies in 1970, so a sweep clears all
                    expected_deletes += model.len();
                    prop_assert_eq!(cache.clean(), model.len());
                    model.clear();
                }
            }

            prop_assert_eq!(cache.len(), model.len());
            for (key, (value, _)) in &model {
                let got = cache.get_immediate(key);
                prop_assert_eq!(got.as_ref(), Some(value));
            }
        }

        prop_assert_eq!(sets.load(Ordering::SeqCst), expected_sets);
        prop_assert_eq!(deletes.load(Ordering::SeqCst), expected_deletes);
    }

    // Removing a stored key always makes it absent.
    #[test]
    fn prop_remove_makes_absent(key in key_strategy(), value in value_strategy()) {
        let cache = TestCache::new();
        cache.set(key.clone(), value.clone(), None);
        prop_assert_eq!(cache.get_immediate(&key), Some(value));

        cache.remove(&key);
        prop_assert_eq!(cache.get_immediate(&key), None);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(30))]

    // Any number of fetches issued for one absent key before it settles
    // invoke the fallback once and all observe the identical result.
    #[test]
    fn prop_fetch_fan_in_invokes_fallback_once(callers in 1usize..24, value in value_strategy()) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        rt.block_on(async {
            let cache = TestCache::new();
            let calls = Arc::new(AtomicUsize::new(0));

            let pending: Vec<_> = (0..callers)
                .map(|_| {
                    let calls = Arc::clone(&calls);
                    let value = value.clone();
                    cache.get("k".to_string(), move || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        async move { Ok(Some(value)) }
                    })
                })
                .collect();

            let results = futures::future::join_all(pending).await;

            prop_assert_eq!(calls.load(Ordering::SeqCst), 1);
            for result in results {
                prop_assert_eq!(result, Ok(Ok(Some(value.clone()))));
            }
            prop_assert_eq!(cache.in_flight_count(), 0);
            Ok(())
        })?;
    }
}
