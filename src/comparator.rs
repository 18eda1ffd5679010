//! Key Comparators
//!
//! The ordered index never compares raw bytes itself; every ordering
//! decision goes through a [`KeyComparator`] owned by the store.
//!
//! ## Contract
//! A comparator must be a strict total order: deterministic, antisymmetric
//! and transitive over every pair of keys it will ever see. Two keys that
//! compare `Equal` are the same key, even if their bytes differ. A
//! comparator that breaks this contract leaves the index structure
//! undefined; [`crate::Store::verify`] can detect the damage after the
//! fact but nothing checks it at insert time.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Shared handle to a comparator, cloned into the index and config
pub type SharedComparator = Arc<dyn KeyComparator>;

/// Total order over byte-sequence keys
pub trait KeyComparator: Send + Sync {
    /// Compare two keys
    fn compare(&self, lhs: &[u8], rhs: &[u8]) -> Ordering;

    /// Identity tag recorded in snapshots. Reopening a persisted store
    /// with a comparator of a different name is refused.
    fn name(&self) -> &str {
        "custom"
    }
}

impl<F> KeyComparator for F
where
    F: Fn(&[u8], &[u8]) -> Ordering + Send + Sync,
{
    fn compare(&self, lhs: &[u8], rhs: &[u8]) -> Ordering {
        self(lhs, rhs)
    }
}

impl fmt::Debug for dyn KeyComparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyComparator")
            .field("name", &self.name())
            .finish()
    }
}

/// Default order: shorter keys sort first, equal lengths compare byte by byte
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultComparator;

impl KeyComparator for DefaultComparator {
    fn compare(&self, lhs: &[u8], rhs: &[u8]) -> Ordering {
        lhs.len().cmp(&rhs.len()).then_with(|| lhs.cmp(rhs))
    }

    fn name(&self) -> &str {
        "length-then-bytes"
    }
}

/// Plain lexicographic byte order (`memcmp` semantics)
#[derive(Debug, Clone, Copy, Default)]
pub struct BytewiseComparator;

impl KeyComparator for BytewiseComparator {
    fn compare(&self, lhs: &[u8], rhs: &[u8]) -> Ordering {
        lhs.cmp(rhs)
    }

    fn name(&self) -> &str {
        "bytewise"
    }
}

/// The comparator a store uses when none is configured
pub fn default_comparator() -> SharedComparator {
    Arc::new(DefaultComparator)
}
