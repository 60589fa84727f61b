//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check accounting, capacity, codec and invalidation
//! properties over random operation sequences.

use proptest::prelude::*;
use std::collections::{BTreeMap, HashSet};

use crate::cache::codec;
use crate::cache::CacheStore;
use crate::config::CacheConfig;

// == Test Configuration ==
const TAGS: [&str; 3] = ["users", "invoices", "reports"];

fn bounded_store(max_size: u64, max_keys: usize, enable_compression: bool) -> CacheStore {
    CacheStore::new(CacheConfig {
        max_size,
        max_keys,
        enable_compression,
        compression_threshold: 64,
        ..CacheConfig::default()
    })
}

// == Strategies ==
/// Small key space so operations collide often
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-e]:[0-9]".prop_map(|s| s)
}

/// Values that sometimes cross the compression threshold
fn value_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z0-9 ]{0,40}",
        "[ab]{100,400}",
        "[a-zA-Z0-9]{100,200}",
    ]
}

fn tags_strategy() -> impl Strategy<Value = Vec<&'static str>> {
    prop::sample::subsequence(TAGS.to_vec(), 0..=TAGS.len())
}

/// A cache operation for random sequences
#[derive(Debug, Clone)]
enum CacheOp {
    Set {
        key: String,
        value: String,
        tags: Vec<&'static str>,
    },
    Get {
        key: String,
    },
    Has {
        key: String,
    },
    Delete {
        key: String,
    },
    InvalidateTag {
        tag: &'static str,
    },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        4 => (key_strategy(), value_strategy(), tags_strategy())
            .prop_map(|(key, value, tags)| CacheOp::Set { key, value, tags }),
        2 => key_strategy().prop_map(|key| CacheOp::Get { key }),
        1 => key_strategy().prop_map(|key| CacheOp::Has { key }),
        1 => key_strategy().prop_map(|key| CacheOp::Delete { key }),
        1 => prop::sample::select(TAGS.to_vec()).prop_map(|tag| CacheOp::InvalidateTag { tag }),
    ]
}

fn apply(store: &mut CacheStore, op: &CacheOp) {
    match op {
        CacheOp::Set { key, value, tags } => {
            store.set(key, value, None, tags).unwrap();
        }
        CacheOp::Get { key } => {
            let _: Option<String> = store.get(key);
        }
        CacheOp::Has { key } => {
            store.has(key);
        }
        CacheOp::Delete { key } => {
            store.delete(key);
        }
        CacheOp::InvalidateTag { tag } => {
            store.invalidate_by_tags(&[*tag]);
        }
    }
}

/// Any JSON-representable value shape a caller might cache
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
struct Row {
    id: u64,
    name: String,
    amounts: Vec<i64>,
    flags: BTreeMap<String, bool>,
    note: Option<String>,
}

fn row_strategy() -> impl Strategy<Value = Row> {
    (
        any::<u64>(),
        "\\PC{0,50}",
        prop::collection::vec(any::<i64>(), 0..300),
        prop::collection::btree_map("[a-z]{1,8}", any::<bool>(), 0..10),
        prop::option::of("[a-z ]{0,20}"),
    )
        .prop_map(|(id, name, amounts, flags, note)| Row {
            id,
            name,
            amounts,
            flags,
            note,
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // After every operation, the size aggregate equals the sum of stored
    // entry sizes and both budgets hold.
    #[test]
    fn prop_size_accounting_invariant(
        ops in prop::collection::vec(cache_op_strategy(), 1..80),
        compression in any::<bool>(),
    ) {
        // Every generated value encodes to well under this budget
        let max_size = 1200;
        let max_keys = 8;
        let mut store = bounded_store(max_size, max_keys, compression);

        for op in &ops {
            apply(&mut store, op);
            prop_assert_eq!(store.total_size(), store.computed_size(), "after {:?}", op);
            prop_assert!(store.len() <= max_keys);
            prop_assert!(store.total_size() <= max_size);
            prop_assert_eq!(store.metrics().total_keys, store.len());
        }
    }

    // Hits and misses count exactly the get outcomes; has never counts.
    #[test]
    fn prop_statistics_accuracy(ops in prop::collection::vec(cache_op_strategy(), 1..60)) {
        let mut store = bounded_store(u64::MAX, 1000, true);
        let mut expected_hits: u64 = 0;
        let mut expected_misses: u64 = 0;

        for op in &ops {
            match op {
                CacheOp::Get { key } => match store.get::<String>(key) {
                    Some(_) => expected_hits += 1,
                    None => expected_misses += 1,
                },
                other => apply(&mut store, other),
            }
        }

        let metrics = store.metrics();
        prop_assert_eq!(metrics.hits, expected_hits);
        prop_assert_eq!(metrics.misses, expected_misses);
        prop_assert_eq!(metrics.evictions, 0);
    }

    // Encoding then decoding yields the original value, compressed or not.
    #[test]
    fn prop_codec_roundtrip(row in row_strategy(), compression in any::<bool>()) {
        let config = CacheConfig {
            enable_compression: compression,
            compression_threshold: 32,
            ..CacheConfig::default()
        };

        let payload = codec::encode(&row, &config).unwrap();
        prop_assert!(payload.bytes.len() as u64 <= payload.original_size);
        let back: Row = codec::decode(&payload.bytes, payload.compressed).unwrap();
        prop_assert_eq!(back, row);
    }

    // The last value written to a key is the one read back.
    #[test]
    fn prop_overwrite_semantics(
        key in key_strategy(),
        value1 in value_strategy(),
        value2 in value_strategy(),
    ) {
        let mut store = bounded_store(u64::MAX, 100, true);

        store.set(&key, &value1, None, &[]).unwrap();
        store.set(&key, &value2, None, &[]).unwrap();

        prop_assert_eq!(store.get::<String>(&key), Some(value2));
        prop_assert_eq!(store.len(), 1);
        prop_assert_eq!(store.total_size(), store.computed_size());
    }

    // has() never changes access stats or counters.
    #[test]
    fn prop_has_is_idempotent(
        keys in prop::collection::vec(key_strategy(), 1..20),
        probes in prop::collection::vec(key_strategy(), 1..40),
    ) {
        let mut store = bounded_store(u64::MAX, 100, false);
        for key in &keys {
            store.set(key, key, None, &[]).unwrap();
        }
        let before: Vec<_> = keys.iter().map(|k| store.get_key_info(k)).collect();
        let metrics_before = store.metrics();

        for probe in &probes {
            store.has(probe);
        }

        let after: Vec<_> = keys.iter().map(|k| store.get_key_info(k)).collect();
        let metrics_after = store.metrics();
        prop_assert_eq!(before, after);
        prop_assert_eq!(metrics_before.hits, metrics_after.hits);
        prop_assert_eq!(metrics_before.misses, metrics_after.misses);
    }

    // Tag invalidation removes exactly the entries carrying the tag.
    #[test]
    fn prop_tag_invalidation_exact(
        entries in prop::collection::btree_map(key_strategy(), tags_strategy(), 1..30),
        target in prop::sample::select(TAGS.to_vec()),
    ) {
        let mut store = bounded_store(u64::MAX, 1000, false);
        for (key, tags) in &entries {
            store.set(key, "v", None, tags).unwrap();
        }
        let tagged: HashSet<&String> = entries
            .iter()
            .filter(|(_, tags)| tags.contains(&target))
            .map(|(key, _)| key)
            .collect();

        let removed = store.invalidate_by_tags(&[target]);

        prop_assert_eq!(removed, tagged.len());
        for key in entries.keys() {
            prop_assert_eq!(store.has(key), !tagged.contains(key));
        }
    }

    // Recency, not insertion order, picks the victim.
    #[test]
    fn prop_lru_evicts_least_recently_read(
        count in 3usize..10,
        reread in any::<prop::sample::Index>(),
    ) {
        let mut store = bounded_store(u64::MAX, count, false);
        let keys: Vec<String> = (0..count).map(|i| format!("k:{}", i)).collect();
        for key in &keys {
            store.set(key, key, None, &[]).unwrap();
        }

        // Read every key except one, oldest first
        let skipped = reread.index(count);
        for (i, key) in keys.iter().enumerate() {
            if i != skipped {
                let _: Option<String> = store.get(key);
            }
        }
        store.set("new", "v", None, &[]).unwrap();

        prop_assert!(!store.has(&keys[skipped]));
        prop_assert_eq!(store.len(), count);
    }
}
