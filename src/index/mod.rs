//! Index Module
//!
//! The authoritative ordered structure: each distinct key maps to a
//! duplicate chain of one or more records.
//!
//! ## Responsibilities
//! - Keep entries sorted by the store's comparator
//! - O(log n) point lookup and neighbor (successor / predecessor) queries
//! - Own all key and record bytes
//! - Apply insert / overwrite / erase under the caller's flags
//!
//! ## Data Structure Choice
//! An in-memory B+tree rather than `BTreeMap`: the order is defined by a
//! runtime comparator object, not by `Ord` on the key type, and neighbor
//! queries must work for keys that are not stored.

mod duplicates;
mod flags;
mod node;
mod ops;
mod tree;

use bytes::Bytes;

pub use duplicates::{ChainStatus, DuplicateChain, InsertPolicy};
pub use flags::{DuplicatePosition, InsertFlags};
pub use ops::{Mutation, Placement};
pub use tree::{EntryRef, Iter, Match, OrderedIndex};

/// Key bytes. Cheap to clone, so cursors can hold their own copy.
pub type Key = Bytes;

/// Record bytes
pub type Record = Bytes;
