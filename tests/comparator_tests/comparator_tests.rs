//! Tests for Key Comparators
//!
//! These tests verify:
//! - The built-in comparators' orders
//! - A custom comparator is consulted for every structural insert decision
//! - Key identity follows comparator equality, not byte identity
//! - Comparator replacement is only allowed on an empty store

use std::cmp::Ordering;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

use hoardkv::comparator::{BytewiseComparator, DefaultComparator, KeyComparator};
use hoardkv::{Config, ErrorKind, HoardError, Store};

// =============================================================================
// Helper Functions
// =============================================================================

/// Length first, then bytes from the last to the first, counting calls
#[derive(Default)]
struct CountingComparator {
    calls: AtomicUsize,
}

impl CountingComparator {
    fn calls(&self) -> usize {
        self.calls.load(AtomicOrdering::SeqCst)
    }
}

impl KeyComparator for CountingComparator {
    fn compare(&self, lhs: &[u8], rhs: &[u8]) -> Ordering {
        self.calls.fetch_add(1, AtomicOrdering::SeqCst);
        lhs.len()
            .cmp(&rhs.len())
            .then_with(|| lhs.iter().rev().cmp(rhs.iter().rev()))
    }

    fn name(&self) -> &str {
        "counting"
    }
}

fn collect_keys(store: &Store) -> Vec<Vec<u8>> {
    let mut cursor = store.cursor();
    let mut keys = Vec::new();
    while cursor.move_next().is_ok() {
        keys.push(cursor.key().unwrap().to_vec());
    }
    keys
}

// =============================================================================
// Built-in Comparator Tests
// =============================================================================

#[test]
fn test_default_comparator_orders_by_length_first() {
    let cmp = DefaultComparator;
    assert_eq!(cmp.compare(b"zz", b"aaa"), Ordering::Less);
    assert_eq!(cmp.compare(b"abc", b"abd"), Ordering::Less);
    assert_eq!(cmp.compare(b"abc", b"abc"), Ordering::Equal);
    assert_eq!(cmp.compare(b"", b"a"), Ordering::Less);
}

#[test]
fn test_bytewise_comparator_is_lexicographic() {
    let cmp = BytewiseComparator;
    assert_eq!(cmp.compare(b"zz", b"aaa"), Ordering::Greater);
    assert_eq!(cmp.compare(b"ab", b"abc"), Ordering::Less);
}

#[test]
fn test_closure_comparator() {
    let reverse = |a: &[u8], b: &[u8]| b.cmp(a);
    assert_eq!(reverse.compare(b"a", b"b"), Ordering::Greater);
    assert_eq!(reverse.name(), "custom");
}

#[test]
fn test_default_store_order() {
    let store = Store::in_memory();
    for key in [&b"ccc"[..], b"b", b"aa", b"a"] {
        store.insert(key, b"r").unwrap();
    }

    assert_eq!(
        collect_keys(&store),
        vec![b"a".to_vec(), b"b".to_vec(), b"aa".to_vec(), b"ccc".to_vec()]
    );
}

// =============================================================================
// Custom Comparator Tests
// =============================================================================

#[test]
fn test_custom_comparator_consulted_on_each_insert() {
    let store = Store::in_memory();
    let cmp = Arc::new(CountingComparator::default());
    store.set_comparator(cmp.clone()).unwrap();

    for i in 0u8..5 {
        let before = cmp.calls();
        store.insert(&[i], &[i]).unwrap();
        if i > 0 {
            assert!(
                cmp.calls() > before,
                "insert of key {} did not consult the comparator",
                i
            );
        }
    }
    assert_eq!(store.len(), 5);
}

#[test]
fn test_custom_comparator_defines_order() {
    let store = Store::in_memory();
    store
        .set_comparator(Arc::new(CountingComparator::default()))
        .unwrap();

    // Same length, compared from the last byte backwards
    store.insert(b"ba", b"1").unwrap();
    store.insert(b"ab", b"2").unwrap();
    store.insert(b"aa", b"3").unwrap();

    assert_eq!(
        collect_keys(&store),
        vec![b"aa".to_vec(), b"ba".to_vec(), b"ab".to_vec()]
    );
    store.verify().unwrap();
}

#[test]
fn test_comparator_equality_defines_key_identity() {
    // Case-insensitive keys
    let cmp = |a: &[u8], b: &[u8]| a.to_ascii_lowercase().cmp(&b.to_ascii_lowercase());
    let config = Config::builder().comparator(Arc::new(cmp)).build();
    let store = Store::open(config).unwrap();

    store.insert(b"Key", b"1").unwrap();
    let err = store.insert(b"KEY", b"2").unwrap_err();
    assert!(matches!(err, HoardError::KeyExists));

    assert_eq!(&store.find(b"key").unwrap()[..], b"1");

    // The stored spelling is the first one inserted
    let mut cursor = store.cursor();
    cursor.find(b"kEy").unwrap();
    assert_eq!(&cursor.key().unwrap()[..], b"Key");
}

#[test]
fn test_large_tree_under_custom_comparator() {
    let reverse = |a: &[u8], b: &[u8]| b.cmp(a);
    let config = Config::builder()
        .comparator(Arc::new(reverse))
        .node_capacity(4)
        .build();
    let store = Store::open(config).unwrap();

    for i in 0u32..500 {
        store.insert(&i.to_be_bytes(), b"r").unwrap();
    }
    store.verify().unwrap();
    assert!(store.depth() > 2);

    let keys = collect_keys(&store);
    let expected: Vec<Vec<u8>> = (0u32..500).rev().map(|i| i.to_be_bytes().to_vec()).collect();
    assert_eq!(keys, expected);
}

// =============================================================================
// Comparator Replacement Tests
// =============================================================================

#[test]
fn test_set_comparator_on_non_empty_store_fails() {
    let store = Store::in_memory();
    store.insert(b"a", b"1").unwrap();

    let err = store
        .set_comparator(Arc::new(BytewiseComparator))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    // Still usable under the old order
    assert_eq!(&store.find(b"a").unwrap()[..], b"1");
}

#[test]
fn test_set_comparator_after_store_emptied() {
    let store = Store::in_memory();
    store.insert(b"a", b"1").unwrap();
    store.erase(b"a").unwrap();

    store.set_comparator(Arc::new(BytewiseComparator)).unwrap();
    store.insert(b"zz", b"1").unwrap();
    store.insert(b"aaa", b"2").unwrap();
    assert_eq!(collect_keys(&store), vec![b"aaa".to_vec(), b"zz".to_vec()]);
}
