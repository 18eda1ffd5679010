//! # hoardkv
//!
//! An embedded ordered key/value store with:
//! - A pluggable comparator deciding key order and key identity
//! - Duplicate keys: one key, an ordered chain of records
//! - Cursors that stay consistent while the store is mutated under them
//! - Optional durability through a journal plus checkpoint snapshots
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Store / Cursor API                        │
//! │            (Single Writer / Multi Reader)                    │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      Executor                                │
//! │        resolve → journal → apply → correct cursors           │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┼─────────────────┐
//!          │            │                 │
//!          ▼            ▼                 ▼
//!   ┌─────────────┐ ┌─────────────┐ ┌─────────────┐
//!   │   Journal   │ │    Index    │ │   Cursor    │
//!   │  (Append)   │ │  (B+tree)   │ │  Registry   │
//!   └─────────────┘ └──────┬──────┘ └─────────────┘
//!                          │ checkpoint
//!                          ▼
//!                   ┌─────────────┐
//!                   │  Snapshot   │
//!                   └─────────────┘
//! ```
//!
//! ## Example
//! ```
//! use hoardkv::{InsertFlags, Store, Config};
//!
//! let store = Store::open(Config::builder().enable_duplicates(true).build())?;
//! store.insert(b"apple", b"1")?;
//! store.insert_with(b"apple", b"2", InsertFlags::DUPLICATE)?;
//!
//! let mut cursor = store.cursor();
//! cursor.find(b"apple")?;
//! assert_eq!(cursor.duplicate_count()?, 2);
//! cursor.move_next()?;
//! assert_eq!(&cursor.record()?[..], b"2");
//! # Ok::<(), hoardkv::HoardError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod comparator;

pub mod index;
pub mod cursor;
pub mod executor;
pub mod journal;
pub mod storage;
pub mod store;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use comparator::{BytewiseComparator, DefaultComparator, KeyComparator, SharedComparator};
pub use config::{Config, JournalSyncStrategy};
pub use cursor::{Cursor, CursorMove, DuplicateMode};
pub use error::{ErrorKind, HoardError, Result};
pub use executor::{Command, Response};
pub use index::{DuplicatePosition, InsertFlags, Match};
pub use store::Store;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of hoardkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
