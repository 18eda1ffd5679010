//! Tests for Cursors
//!
//! These tests verify:
//! - Movement in both directions, over records and over keys
//! - Exact, duplicate and approximate positioning
//! - Reads, overwrite, insert and erase through a cursor
//! - Failure states (unpositioned reads, failed moves and finds)
//! - Clone and release

use std::cmp::Ordering;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

use hoardkv::{
    Config, CursorMove, DuplicateMode, DuplicatePosition, HoardError, InsertFlags, KeyComparator,
    Match, Store,
};

// =============================================================================
// Helper Functions
// =============================================================================

fn dup_store() -> Store {
    Store::open(Config::builder().enable_duplicates(true).node_capacity(4).build()).unwrap()
}

/// Ten-byte key whose first byte is `first`
fn key10(first: u8) -> Vec<u8> {
    let mut key = vec![0u8; 10];
    key[0] = first;
    key
}

/// Store with keys a..e, key c holding three records c0 c1 c2
fn lettered_store() -> Store {
    let store = dup_store();
    for k in ["a", "b", "d", "e"] {
        store.insert(k.as_bytes(), format!("{}0", k).as_bytes()).unwrap();
    }
    for r in ["c0", "c1", "c2"] {
        store
            .insert_with(b"c", r.as_bytes(), InsertFlags::DUPLICATE)
            .unwrap();
    }
    store
}

fn record_str(cursor: &hoardkv::Cursor<'_>) -> String {
    String::from_utf8(cursor.record().unwrap().to_vec()).unwrap()
}

// =============================================================================
// Movement Tests
// =============================================================================

#[test]
fn test_move_next_on_empty_store() {
    let store = dup_store();
    let mut cursor = store.cursor();

    let err = cursor.move_next().unwrap_err();
    assert!(matches!(err, HoardError::KeyNotFound));
    assert!(!cursor.is_positioned());

    store.insert(b"only", b"record").unwrap();
    cursor.move_first().unwrap();
    assert_eq!(&cursor.key().unwrap()[..], b"only");
    assert_eq!(&cursor.record().unwrap()[..], b"record");
}

#[test]
fn test_move_first_last_on_empty_store() {
    let store = dup_store();
    let mut cursor = store.cursor();

    assert!(cursor.move_first().unwrap_err().is_not_found());
    assert!(cursor.move_last().unwrap_err().is_not_found());
    assert!(cursor.move_previous().unwrap_err().is_not_found());
}

#[test]
fn test_move_sequence() {
    let store = dup_store();
    for i in 0u8..5 {
        store.insert(&key10(i), &[0u8; 10]).unwrap();
    }

    let mut cursor = store.cursor();
    cursor.move_to(CursorMove::Next, DuplicateMode::All).unwrap();
    assert_eq!(cursor.key().unwrap()[0], 0);
    cursor.move_to(CursorMove::Next, DuplicateMode::All).unwrap();
    assert_eq!(cursor.key().unwrap()[0], 1);
    cursor.move_to(CursorMove::Previous, DuplicateMode::All).unwrap();
    assert_eq!(cursor.key().unwrap()[0], 0);
    cursor.move_to(CursorMove::Last, DuplicateMode::All).unwrap();
    assert_eq!(cursor.key().unwrap()[0], 4);
    cursor.move_to(CursorMove::First, DuplicateMode::All).unwrap();
    assert_eq!(cursor.key().unwrap()[0], 0);
}

#[test]
fn test_forward_traversal_visits_every_key_in_order() {
    let store = Store::open(Config::builder().node_capacity(4).build()).unwrap();
    for i in (0u32..300).rev() {
        store.insert(&i.to_be_bytes(), b"r").unwrap();
    }

    let mut cursor = store.cursor();
    cursor.move_first().unwrap();
    let mut seen = vec![cursor.key().unwrap()];
    while cursor.move_next().is_ok() {
        seen.push(cursor.key().unwrap());
    }

    let expected: Vec<Vec<u8>> = (0u32..300).map(|i| i.to_be_bytes().to_vec()).collect();
    let seen: Vec<Vec<u8>> = seen.iter().map(|k| k.to_vec()).collect();
    assert_eq!(seen, expected);

    // One more step still fails
    assert!(matches!(cursor.move_next(), Err(HoardError::KeyNotFound)));
}

#[test]
fn test_backward_traversal() {
    let store = lettered_store();
    let mut cursor = store.cursor();
    cursor.move_last().unwrap();

    let mut seen = vec![record_str(&cursor)];
    while cursor.move_previous().is_ok() {
        seen.push(record_str(&cursor));
    }
    assert_eq!(seen, vec!["e0", "d0", "c2", "c1", "c0", "b0", "a0"]);
}

#[test]
fn test_forward_traversal_visits_duplicates() {
    let store = lettered_store();
    let mut cursor = store.cursor();

    let mut seen = Vec::new();
    while cursor.move_next().is_ok() {
        seen.push((record_str(&cursor), cursor.duplicate_position().unwrap()));
    }
    assert_eq!(
        seen,
        vec![
            ("a0".to_string(), 0),
            ("b0".to_string(), 0),
            ("c0".to_string(), 0),
            ("c1".to_string(), 1),
            ("c2".to_string(), 2),
            ("d0".to_string(), 0),
            ("e0".to_string(), 0),
        ]
    );
}

#[test]
fn test_move_skip_duplicates() {
    let store = lettered_store();
    let mut cursor = store.cursor();

    let mut keys = Vec::new();
    while cursor.move_to(CursorMove::Next, DuplicateMode::Skip).is_ok() {
        keys.push(String::from_utf8(cursor.key().unwrap().to_vec()).unwrap());
        assert_eq!(cursor.duplicate_position().unwrap(), 0);
    }
    assert_eq!(keys, vec!["a", "b", "c", "d", "e"]);

    cursor.find_duplicate(b"d", 0).unwrap();
    cursor
        .move_to(CursorMove::Previous, DuplicateMode::Skip)
        .unwrap();
    assert_eq!(&cursor.key().unwrap()[..], b"c");
    assert_eq!(cursor.duplicate_position().unwrap(), 0);
}

#[test]
fn test_move_only_duplicates() {
    let store = lettered_store();
    let mut cursor = store.cursor();
    cursor.find(b"c").unwrap();

    cursor.move_to(CursorMove::Next, DuplicateMode::Only).unwrap();
    cursor.move_to(CursorMove::Next, DuplicateMode::Only).unwrap();
    assert_eq!(record_str(&cursor), "c2");

    // Chain boundary: fails and stays put
    let err = cursor
        .move_to(CursorMove::Next, DuplicateMode::Only)
        .unwrap_err();
    assert!(matches!(err, HoardError::KeyNotFound));
    assert_eq!(record_str(&cursor), "c2");

    cursor.move_to(CursorMove::First, DuplicateMode::Only).unwrap();
    assert_eq!(record_str(&cursor), "c0");
    assert!(cursor
        .move_to(CursorMove::Previous, DuplicateMode::Only)
        .is_err());
    cursor.move_to(CursorMove::Last, DuplicateMode::Only).unwrap();
    assert_eq!(record_str(&cursor), "c2");
}

#[test]
fn test_move_only_requires_position() {
    let store = lettered_store();
    let mut cursor = store.cursor();
    let err = cursor
        .move_to(CursorMove::Next, DuplicateMode::Only)
        .unwrap_err();
    assert!(matches!(err, HoardError::CursorNotPositioned));
}

#[test]
fn test_move_last_lands_on_first_duplicate() {
    let store = dup_store();
    store.insert(b"k", b"r0").unwrap();
    store.insert_with(b"k", b"r1", InsertFlags::DUPLICATE).unwrap();

    let mut cursor = store.cursor();
    cursor.move_last().unwrap();
    assert_eq!(cursor.duplicate_position().unwrap(), 0);
    assert_eq!(&cursor.record().unwrap()[..], b"r0");
}

#[test]
fn test_move_previous_into_entry_lands_on_last_duplicate() {
    let store = lettered_store();
    let mut cursor = store.cursor();
    cursor.find(b"d").unwrap();

    cursor.move_previous().unwrap();
    assert_eq!(record_str(&cursor), "c2");
    assert_eq!(cursor.duplicate_position().unwrap(), 2);
}

#[test]
fn test_unpositioned_previous_starts_at_last() {
    let store = lettered_store();
    let mut cursor = store.cursor();
    cursor.move_previous().unwrap();
    assert_eq!(record_str(&cursor), "e0");
}

#[test]
fn test_failed_move_keeps_position() {
    let store = lettered_store();
    let mut cursor = store.cursor();
    cursor.move_last().unwrap();

    assert!(cursor.move_next().is_err());
    assert_eq!(record_str(&cursor), "e0");

    cursor.move_first().unwrap();
    assert!(cursor.move_previous().is_err());
    assert_eq!(record_str(&cursor), "a0");
}

// =============================================================================
// Positioning Tests
// =============================================================================

#[test]
fn test_find_positions_on_first_duplicate() {
    let store = lettered_store();
    let mut cursor = store.cursor();

    cursor.find(b"c").unwrap();
    assert_eq!(&cursor.key().unwrap()[..], b"c");
    assert_eq!(record_str(&cursor), "c0");
    assert_eq!(cursor.duplicate_count().unwrap(), 3);
}

#[test]
fn test_find_duplicate() {
    let store = lettered_store();
    let mut cursor = store.cursor();

    cursor.find_duplicate(b"c", 2).unwrap();
    assert_eq!(record_str(&cursor), "c2");

    let err = cursor.find_duplicate(b"c", 3).unwrap_err();
    assert!(matches!(err, HoardError::DuplicateOutOfRange { position: 3, count: 3 }));
    assert!(!cursor.is_positioned());
}

#[test]
fn test_failed_find_unpositions() {
    let store = lettered_store();
    let mut cursor = store.cursor();
    cursor.find(b"a").unwrap();

    let err = cursor.find(b"zz").unwrap_err();
    assert!(matches!(err, HoardError::KeyNotFound));
    assert!(matches!(cursor.key(), Err(HoardError::CursorNotPositioned)));
    assert!(matches!(cursor.record(), Err(HoardError::CursorNotPositioned)));
}

#[test]
fn test_find_nearest() {
    let store = Store::in_memory();
    for k in ["b", "d", "f"] {
        store.insert(k.as_bytes(), b"r").unwrap();
    }
    let mut cursor = store.cursor();

    cursor.find_nearest(b"c", Match::GreaterOrEqual).unwrap();
    assert_eq!(&cursor.key().unwrap()[..], b"d");
    cursor.find_nearest(b"c", Match::LessOrEqual).unwrap();
    assert_eq!(&cursor.key().unwrap()[..], b"b");
    cursor.find_nearest(b"d", Match::Greater).unwrap();
    assert_eq!(&cursor.key().unwrap()[..], b"f");
    cursor.find_nearest(b"d", Match::Less).unwrap();
    assert_eq!(&cursor.key().unwrap()[..], b"b");

    assert!(cursor.find_nearest(b"g", Match::GreaterOrEqual).is_err());
    assert!(!cursor.is_positioned());
}

// =============================================================================
// Read Tests
// =============================================================================

#[test]
fn test_unpositioned_reads_fail() {
    let store = lettered_store();
    let cursor = store.cursor();

    assert!(matches!(cursor.key(), Err(HoardError::CursorNotPositioned)));
    assert!(matches!(cursor.record(), Err(HoardError::CursorNotPositioned)));
    assert!(matches!(cursor.current(), Err(HoardError::CursorNotPositioned)));
    assert!(matches!(
        cursor.duplicate_count(),
        Err(HoardError::CursorNotPositioned)
    ));
    assert!(cursor.key().unwrap_err().is_not_found());
}

#[test]
fn test_current_returns_key_and_record() {
    let store = lettered_store();
    let mut cursor = store.cursor();
    cursor.find_duplicate(b"c", 1).unwrap();

    let (key, record) = cursor.current().unwrap();
    assert_eq!(&key[..], b"c");
    assert_eq!(&record[..], b"c1");
}

// =============================================================================
// Mutation Tests
// =============================================================================

#[test]
fn test_insert_then_find_round_trip() {
    let store = dup_store();
    let mut cursor = store.cursor();

    cursor.insert(b"key", b"record").unwrap();
    assert_eq!(&cursor.key().unwrap()[..], b"key");

    cursor.find(b"key").unwrap();
    assert_eq!(&cursor.record().unwrap()[..], b"record");
}

#[test]
fn test_cursor_insert_overwrite_flag() {
    let store = dup_store();
    let mut cursor = store.cursor();

    cursor.insert(b"key", b"one").unwrap();
    cursor.insert_with(b"key", b"two", InsertFlags::OVERWRITE).unwrap();
    cursor.insert_with(b"key", b"three", InsertFlags::OVERWRITE).unwrap();

    assert_eq!(&cursor.record().unwrap()[..], b"three");
    assert_eq!(store.duplicate_count(b"key").unwrap(), 1);
}

#[test]
fn test_overwrite_replaces_current_record() {
    let store = dup_store();
    store.insert(b"key", b"r1").unwrap();

    let mut cursor = store.cursor();
    cursor.move_first().unwrap();
    cursor.overwrite(b"r2").unwrap();

    assert_eq!(&cursor.record().unwrap()[..], b"r2");
    assert_eq!(&store.find(b"key").unwrap()[..], b"r2");
}

#[test]
fn test_overwrite_targets_current_duplicate() {
    let store = lettered_store();
    let mut cursor = store.cursor();
    cursor.find_duplicate(b"c", 1).unwrap();

    cursor.overwrite(b"C1").unwrap();
    assert_eq!(cursor.duplicate_position().unwrap(), 1);

    let records: Vec<Vec<u8>> = store
        .records(b"c")
        .unwrap()
        .iter()
        .map(|r| r.to_vec())
        .collect();
    assert_eq!(records, vec![b"c0".to_vec(), b"C1".to_vec(), b"c2".to_vec()]);
}

#[test]
fn test_overwrite_unpositioned_fails() {
    let store = lettered_store();
    let mut cursor = store.cursor();
    assert!(matches!(
        cursor.overwrite(b"x"),
        Err(HoardError::CursorNotPositioned)
    ));
}

#[test]
fn test_duplicate_count_grows_through_cursor() {
    let store = dup_store();
    let mut cursor = store.cursor();
    let key = key10(0);

    for (expected, first) in [(1, 0x00u8), (2, 0x14), (3, 0x15)] {
        let mut record = vec![0u8; 10];
        record[0] = first;
        cursor
            .insert_with(&key, &record, InsertFlags::DUPLICATE)
            .unwrap();
        assert_eq!(cursor.duplicate_count().unwrap(), expected);
    }

    for (position, first) in [0x00u8, 0x14, 0x15].into_iter().enumerate() {
        cursor.find_duplicate(&key, position).unwrap();
        assert_eq!(cursor.record().unwrap()[0], first);
    }
}

#[test]
fn test_cursor_insert_positions_on_new_duplicate() {
    let store = lettered_store();
    let mut cursor = store.cursor();
    cursor.find_duplicate(b"c", 1).unwrap();

    cursor
        .insert_with(
            b"c",
            b"c1.5",
            InsertFlags::duplicate_at(DuplicatePosition::After),
        )
        .unwrap();
    assert_eq!(cursor.duplicate_position().unwrap(), 2);
    assert_eq!(record_str(&cursor), "c1.5");

    cursor
        .insert_with(
            b"c",
            b"c1.2",
            InsertFlags::duplicate_at(DuplicatePosition::Before),
        )
        .unwrap();
    assert_eq!(cursor.duplicate_position().unwrap(), 2);

    cursor
        .insert_with(b"c", b"first", InsertFlags::duplicate_at(DuplicatePosition::First))
        .unwrap();
    assert_eq!(cursor.duplicate_position().unwrap(), 0);

    let records: Vec<String> = store
        .records(b"c")
        .unwrap()
        .iter()
        .map(|r| String::from_utf8(r.to_vec()).unwrap())
        .collect();
    assert_eq!(records, vec!["first", "c0", "c1", "c1.2", "c1.5", "c2"]);
}

#[test]
fn test_cursor_before_after_on_other_key_is_invalid() {
    let store = lettered_store();
    let mut cursor = store.cursor();
    cursor.find(b"a").unwrap();

    let err = cursor
        .insert_with(
            b"c",
            b"x",
            InsertFlags::duplicate_at(DuplicatePosition::Before),
        )
        .unwrap_err();
    assert!(matches!(err, HoardError::InvalidArgument(_)));
    // Position untouched
    assert_eq!(record_str(&cursor), "a0");
}

#[test]
fn test_failed_insert_keeps_position() {
    let store = lettered_store();
    let mut cursor = store.cursor();
    cursor.find(b"b").unwrap();

    assert!(matches!(
        cursor.insert(b"a", b"again"),
        Err(HoardError::KeyExists)
    ));
    assert_eq!(record_str(&cursor), "b0");
}

#[test]
fn test_erase_through_cursor() {
    let store = dup_store();
    store.insert(b"key", b"record").unwrap();

    let mut cursor = store.cursor();
    cursor.find(b"key").unwrap();
    cursor.erase().unwrap();
    assert!(!cursor.is_positioned());

    assert!(matches!(cursor.find(b"key"), Err(HoardError::KeyNotFound)));
    assert!(store.is_empty());
}

#[test]
fn test_erase_one_duplicate_through_cursor() {
    let store = lettered_store();
    let mut cursor = store.cursor();
    cursor.find_duplicate(b"c", 1).unwrap();

    cursor.erase().unwrap();
    assert!(!cursor.is_positioned());
    assert_eq!(store.duplicate_count(b"c").unwrap(), 2);
    assert_eq!(&store.find_duplicate(b"c", 1).unwrap()[..], b"c2");
}

#[test]
fn test_erase_unpositioned_fails() {
    let store = lettered_store();
    let mut cursor = store.cursor();
    assert!(matches!(cursor.erase(), Err(HoardError::CursorNotPositioned)));
    assert_eq!(store.key_count(DuplicateMode::All).unwrap(), 7);
}

// =============================================================================
// Comparator Tests
// =============================================================================

#[derive(Default)]
struct CountingComparator {
    calls: AtomicUsize,
}

impl KeyComparator for CountingComparator {
    fn compare(&self, lhs: &[u8], rhs: &[u8]) -> Ordering {
        self.calls.fetch_add(1, AtomicOrdering::SeqCst);
        lhs.len()
            .cmp(&rhs.len())
            .then_with(|| lhs.iter().rev().cmp(rhs.iter().rev()))
    }
}

#[test]
fn test_cursor_inserts_consult_custom_comparator() {
    let store = dup_store();
    let cmp = Arc::new(CountingComparator::default());
    store.set_comparator(cmp.clone()).unwrap();

    let mut cursor = store.cursor();
    let mut key = [0u8; 5];
    let record = [0u8; 5];
    cursor.insert(&key, &record).unwrap();
    for i in 1u8..4 {
        key[0] = i;
        let before = cmp.calls.load(AtomicOrdering::SeqCst);
        cursor.insert(&key, &record).unwrap();
        assert!(cmp.calls.load(AtomicOrdering::SeqCst) > before);
    }
    assert_eq!(store.len(), 4);
}

// =============================================================================
// Clone / Release Tests
// =============================================================================

#[test]
fn test_clone_is_independent() {
    let store = lettered_store();
    let mut c1 = store.cursor();
    c1.find(b"b").unwrap();

    let mut c2 = c1.clone();
    assert_eq!(store.open_cursors(), 2);
    assert_eq!(record_str(&c2), "b0");

    c2.move_next().unwrap();
    assert_eq!(record_str(&c2), "c0");
    assert_eq!(record_str(&c1), "b0");

    c1.move_previous().unwrap();
    assert_eq!(record_str(&c1), "a0");
    assert_eq!(record_str(&c2), "c0");
}

#[test]
fn test_clone_of_unpositioned_cursor() {
    let store = lettered_store();
    let c1 = store.cursor();
    let c2 = c1.clone();
    assert!(!c2.is_positioned());
}

#[test]
fn test_close_releases_cursor() {
    let store = lettered_store();
    let c1 = store.cursor();
    let c2 = store.cursor();
    assert_eq!(store.open_cursors(), 2);

    c1.close();
    assert_eq!(store.open_cursors(), 1);
    drop(c2);
    assert_eq!(store.open_cursors(), 0);

    // Entries are unaffected by releasing cursors
    assert_eq!(store.key_count(DuplicateMode::All).unwrap(), 7);
}
