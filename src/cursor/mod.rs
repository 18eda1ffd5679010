//! Cursor Module
//!
//! A cursor is a logical position in the store: a key plus a duplicate
//! index. The handle itself holds nothing but an id; the position lives in
//! the store's [`registry`] so that mutations issued through any path can
//! correct it.
//!
//! ## Responsibilities
//! - Ordered traversal in both directions, over records or keys
//! - Exact and approximate positioning
//! - Reads and mutations relative to the current position
//!
//! ## State
//! ```text
//!   new ──► Unpositioned ──move/find ok──► Positioned(key, dup)
//!                ▲                              │
//!                └── failed find / erase ───────┘
//! ```
//! A failed move leaves the state unchanged. A positioned cursor whose
//! record is erased elsewhere becomes unpositioned; one whose chain shifts
//! is moved along with it. Every access revalidates the position against
//! the live index.

pub mod registry;

use std::fmt;

use crate::error::{HoardError, Result};
use crate::index::{EntryRef, InsertFlags, Key, Match, OrderedIndex, Record};
use crate::store::Store;

use registry::{CursorId, CursorState};

/// Direction of a cursor move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorMove {
    First,
    Last,
    Next,
    Previous,
}

/// How moves treat duplicate chains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicateMode {
    /// Visit every record
    #[default]
    All,
    /// Visit every key once, on its first duplicate
    Skip,
    /// Stay within the current key's chain
    Only,
}

/// A position in a [`Store`]. Cannot outlive the store it was opened on.
pub struct Cursor<'s> {
    store: &'s Store,
    id: CursorId,
}

impl<'s> Cursor<'s> {
    pub(crate) fn new(store: &'s Store, id: CursorId) -> Self {
        Self { store, id }
    }

    // =========================================================================
    // Movement
    // =========================================================================

    pub fn move_first(&mut self) -> Result<()> {
        self.move_to(CursorMove::First, DuplicateMode::All)
    }

    pub fn move_last(&mut self) -> Result<()> {
        self.move_to(CursorMove::Last, DuplicateMode::All)
    }

    pub fn move_next(&mut self) -> Result<()> {
        self.move_to(CursorMove::Next, DuplicateMode::All)
    }

    pub fn move_previous(&mut self) -> Result<()> {
        self.move_to(CursorMove::Previous, DuplicateMode::All)
    }

    /// Move the cursor. On failure the position is left as it was.
    pub fn move_to(&mut self, direction: CursorMove, mode: DuplicateMode) -> Result<()> {
        let id = self.id;
        self.store.with_cursors(|index, cursors| {
            let current = cursors.state(id);
            let next = step(index, &current, direction, mode)?;
            cursors.set(id, next);
            Ok(())
        })
    }

    // =========================================================================
    // Positioning
    // =========================================================================

    /// Position on the first duplicate of `key`
    pub fn find(&mut self, key: &[u8]) -> Result<()> {
        self.find_duplicate(key, 0)
    }

    /// Position on one duplicate of `key`
    pub fn find_duplicate(&mut self, key: &[u8], position: usize) -> Result<()> {
        self.position_with(|index| {
            let entry = index.find(key)?;
            entry.chain.record_at(position)?;
            Ok(CursorState::Positioned {
                key: entry.key.clone(),
                duplicate: position,
            })
        })
    }

    /// Position on the entry nearest to `key` under `mode`
    pub fn find_nearest(&mut self, key: &[u8], mode: Match) -> Result<()> {
        self.position_with(|index| {
            let entry = index.seek(key, mode).ok_or(HoardError::KeyNotFound)?;
            Ok(at(entry, 0))
        })
    }

    fn position_with(
        &mut self,
        locate: impl FnOnce(&OrderedIndex) -> Result<CursorState>,
    ) -> Result<()> {
        let id = self.id;
        self.store.with_cursors(|index, cursors| match locate(index) {
            Ok(state) => {
                cursors.set(id, state);
                Ok(())
            }
            Err(e) => {
                cursors.set(id, CursorState::Unpositioned);
                Err(e)
            }
        })
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn is_positioned(&self) -> bool {
        self.read(|_, _, _| Ok(())).is_ok()
    }

    /// Key at the current position (as stored)
    pub fn key(&self) -> Result<Key> {
        self.read(|entry, _, _| Ok(entry.key.clone()))
    }

    /// Record at the current position
    pub fn record(&self) -> Result<Record> {
        self.read(|_, record, _| Ok(record.clone()))
    }

    /// Key and record at the current position
    pub fn current(&self) -> Result<(Key, Record)> {
        self.read(|entry, record, _| Ok((entry.key.clone(), record.clone())))
    }

    /// Length of the current key's chain
    pub fn duplicate_count(&self) -> Result<usize> {
        self.read(|entry, _, _| Ok(entry.chain.count()))
    }

    /// Index of the current record within its chain
    pub fn duplicate_position(&self) -> Result<usize> {
        self.read(|_, _, position| Ok(position))
    }

    fn read<T>(&self, f: impl FnOnce(EntryRef<'_>, &Record, usize) -> Result<T>) -> Result<T> {
        let id = self.id;
        self.store.with_cursors(|index, cursors| {
            let (entry, duplicate) = resolve(index, &cursors.state(id))?;
            let record = entry.chain.record_at(duplicate)?;
            f(entry, record, duplicate)
        })
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Insert a new key; fails with `KeyExists` if it is already stored
    pub fn insert(&mut self, key: &[u8], record: &[u8]) -> Result<()> {
        self.insert_with(key, record, InsertFlags::NONE)
    }

    /// Insert under `flags`. Duplicate placement and overwrite are relative
    /// to this cursor when it sits on the same key. Afterwards the cursor
    /// points at the record written.
    pub fn insert_with(&mut self, key: &[u8], record: &[u8], flags: InsertFlags) -> Result<()> {
        let id = self.id;
        let key = Key::copy_from_slice(key);
        let record = Record::copy_from_slice(record);
        self.store
            .mutate(|executor| executor.insert(key, record, flags, Some(id)))
            .map(drop)
    }

    /// Replace the record at the current position
    pub fn overwrite(&mut self, record: &[u8]) -> Result<()> {
        let id = self.id;
        let record = Record::copy_from_slice(record);
        self.store
            .mutate(|executor| executor.overwrite_at(id, record))
            .map(drop)
    }

    /// Remove the record at the current position; the cursor becomes
    /// unpositioned
    pub fn erase(&mut self) -> Result<()> {
        let id = self.id;
        self.store.mutate(|executor| executor.erase_at(id)).map(drop)
    }

    /// Release the cursor
    pub fn close(self) {}
}

impl Clone for Cursor<'_> {
    /// An independent cursor at the same position
    fn clone(&self) -> Self {
        let id = self.store.with_registry(|cursors| {
            let state = cursors.state(self.id);
            cursors.register(state)
        });
        Self {
            store: self.store,
            id,
        }
    }
}

impl Drop for Cursor<'_> {
    fn drop(&mut self) {
        let id = self.id;
        self.store.with_registry(|cursors| cursors.release(id));
    }
}

impl fmt::Debug for Cursor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.store.with_registry(|cursors| cursors.state(self.id));
        f.debug_struct("Cursor")
            .field("id", &self.id)
            .field("state", &state)
            .finish()
    }
}

// =============================================================================
// Position Arithmetic
// =============================================================================

fn at(entry: EntryRef<'_>, duplicate: usize) -> CursorState {
    CursorState::Positioned {
        key: entry.key.clone(),
        duplicate,
    }
}

/// Revalidate a position against the live index
fn resolve<'i>(index: &'i OrderedIndex, state: &CursorState) -> Result<(EntryRef<'i>, usize)> {
    match state {
        CursorState::Unpositioned => Err(HoardError::CursorNotPositioned),
        CursorState::Positioned { key, duplicate } => {
            let entry = index.get(key).ok_or(HoardError::CursorNotPositioned)?;
            Ok((entry, *duplicate))
        }
    }
}

/// Compute the state after one move, or fail with `KeyNotFound` at an end
fn step(
    index: &OrderedIndex,
    current: &CursorState,
    direction: CursorMove,
    mode: DuplicateMode,
) -> Result<CursorState> {
    if mode == DuplicateMode::Only {
        let (entry, duplicate) = resolve(index, current)?;
        let count = entry.chain.count();
        let target = match direction {
            CursorMove::First => Some(0),
            CursorMove::Last => Some(count - 1),
            CursorMove::Next => duplicate.checked_add(1).filter(|&d| d < count),
            CursorMove::Previous => duplicate.min(count).checked_sub(1),
        };
        return target
            .map(|d| at(entry, d))
            .ok_or(HoardError::KeyNotFound);
    }

    let skip = mode == DuplicateMode::Skip;
    let moved = match (direction, current) {
        (CursorMove::First, _) | (CursorMove::Next, CursorState::Unpositioned) => {
            index.first().map(|entry| at(entry, 0))
        }
        (CursorMove::Last, _) | (CursorMove::Previous, CursorState::Unpositioned) => {
            index.last().map(|entry| at(entry, 0))
        }
        (CursorMove::Next, CursorState::Positioned { key, duplicate }) => {
            let within = index
                .get(key)
                .filter(|entry| !skip && duplicate + 1 < entry.chain.count());
            match within {
                Some(entry) => Some(at(entry, duplicate + 1)),
                None => index.successor(key).map(|entry| at(entry, 0)),
            }
        }
        (CursorMove::Previous, CursorState::Positioned { key, duplicate }) => {
            let within = index.get(key).filter(|_| !skip && *duplicate > 0);
            match within {
                Some(entry) => Some(at(entry, (*duplicate).min(entry.chain.count()) - 1)),
                None => index.predecessor(key).map(|entry| {
                    let last = if skip { 0 } else { entry.chain.count() - 1 };
                    at(entry, last)
                }),
            }
        }
    };
    moved.ok_or(HoardError::KeyNotFound)
}
