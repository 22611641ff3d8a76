//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check key derivation and ephemeral store invariants.

use proptest::prelude::*;

use crate::cache::store::{EphemeralStore, Store};
use crate::cache::{KeyDeriver, Operation};

// == Test Configuration ==
const TEST_MAX_ENTRIES: usize = 16;

// == Strategies ==
/// Generates short free-text filter descriptions
fn filter_strategy() -> impl Strategy<Value = String> {
    "[a-z ,\"]{1,12}".prop_map(|s| s)
}

/// Generates listing URLs on a single host
fn resource_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9]{1,8}".prop_map(|id| format!("https://vinted.example/items/{}", id))
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // **Property 1: Filter Order Independence**
    // *For any* filter list, reversing it or repeating entries SHALL yield the
    // same cache key.
    #[test]
    fn prop_fingerprint_ignores_order_and_duplicates(
        filters in prop::collection::vec(filter_strategy(), 0..8),
        level in 0u32..10,
    ) {
        let mut shuffled = filters.clone();
        shuffled.reverse();
        shuffled.extend(filters.iter().cloned());

        let a = KeyDeriver::derive(Operation::Analysis, "vinted", "https://vinted.example/items/1", level, &filters);
        let b = KeyDeriver::derive(Operation::Analysis, "vinted", "https://vinted.example/items/1", level, &shuffled);
        prop_assert_eq!(a, b);
    }

    // **Property 2: Distinct Filter Sets Do Not Collide**
    // *For any* two filter lists with different normalized sets, the
    // fingerprints SHALL differ.
    #[test]
    fn prop_distinct_filter_sets_distinct_fingerprints(
        left in prop::collection::vec(filter_strategy(), 0..5),
        right in prop::collection::vec(filter_strategy(), 0..5),
    ) {
        let same_set = KeyDeriver::normalize_filters(&left) == KeyDeriver::normalize_filters(&right);
        let same_fp = KeyDeriver::fingerprint(&left) == KeyDeriver::fingerprint(&right);
        prop_assert_eq!(same_set, same_fp);
    }

    // **Property 3: Detail Level Is Part Of Identity**
    // *For any* two different levels, the derived keys SHALL differ but share
    // a family.
    #[test]
    fn prop_levels_share_family(a in 0u32..50, b in 0u32..50) {
        prop_assume!(a != b);
        let ka = KeyDeriver::derive(Operation::Scrape, "ebay", "https://ebay.example/1", a, &[] as &[&str]);
        let kb = ka.at_level(b);
        prop_assert_ne!(&ka, &kb);
        prop_assert_eq!(ka.family(), kb.family());
    }

    // **Property 4: Capacity Bound**
    // *For any* sequence of inserts, the ephemeral store SHALL never hold more
    // than its configured number of entries.
    #[test]
    fn prop_ephemeral_capacity_never_exceeded(
        resources in prop::collection::vec(resource_strategy(), 1..60),
    ) {
        let rt = runtime();
        rt.block_on(async {
            let store = EphemeralStore::new(TEST_MAX_ENTRIES);
            for resource in &resources {
                let key = KeyDeriver::derive(Operation::Scrape, "vinted", resource, 1, &[] as &[&str]);
                store.put(&key, resource.as_bytes().to_vec(), None).await.unwrap();
                assert!(store.len().await <= TEST_MAX_ENTRIES);
            }

            // The most recent insert always survives.
            let last = resources.last().unwrap();
            let key = KeyDeriver::derive(Operation::Scrape, "vinted", last, 1, &[] as &[&str]);
            assert_eq!(store.get(&key).await.unwrap(), Some(last.as_bytes().to_vec()));
        });
    }

    // **Property 5: Monotonic Lookup**
    // *For any* stored level and request level, `find_at_least` SHALL return
    // the record exactly when stored >= requested.
    #[test]
    fn prop_find_at_least_is_monotonic(stored in 0u32..20, requested in 0u32..20) {
        let rt = runtime();
        let found = rt.block_on(async {
            let store = EphemeralStore::new(TEST_MAX_ENTRIES);
            let key = KeyDeriver::derive(Operation::Scrape, "vinted", "https://vinted.example/items/7", stored, &[] as &[&str]);
            store.put(&key, b"x".to_vec(), None).await.unwrap();
            store.find_at_least(&key, requested).await.unwrap()
        });
        prop_assert_eq!(found.is_some(), stored >= requested);
        if let Some(found) = found {
            prop_assert_eq!(found.detail_level, stored);
        }
    }
}
