//! Key-level index operations
//!
//! Insert and erase are split in two steps so the store can journal a
//! mutation before touching the tree:
//! 1. `resolve_*` reads the index and decides exactly what will change
//!    (or fails, leaving everything untouched)
//! 2. `place` / `erase` apply that decision
//!
//! `insert` runs both steps back to back for callers that do not journal.

use tracing::trace;

use crate::error::{HoardError, Result};

use super::duplicates::{ChainStatus, InsertPolicy};
use super::flags::{DuplicatePosition, InsertFlags};
use super::tree::{EntryRef, OrderedIndex};
use super::{DuplicateChain, Key, Record};

/// A resolved insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Key absent: create the entry
    NewEntry,
    /// Add a record at this chain position
    Duplicate(usize),
    /// Replace the record at this chain position
    Overwrite(usize),
}

/// What a mutation did, in terms cursors can be corrected against.
/// `key` is always the key as stored in the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// A record now lives at `position`; `created` if the entry is new
    Inserted {
        key: Key,
        position: usize,
        created: bool,
    },
    /// The record at `position` was replaced in place
    Overwritten { key: Key, position: usize },
    /// One record left a chain that still has others
    DuplicateRemoved { key: Key, position: usize },
    /// The entry is gone, with all `records` it held
    EntryRemoved { key: Key, records: usize },
}

impl Mutation {
    pub fn key(&self) -> &Key {
        match self {
            Mutation::Inserted { key, .. }
            | Mutation::Overwritten { key, .. }
            | Mutation::DuplicateRemoved { key, .. }
            | Mutation::EntryRemoved { key, .. } => key,
        }
    }
}

impl OrderedIndex {
    /// Exact lookup, failing with `KeyNotFound`
    pub fn find(&self, key: &[u8]) -> Result<EntryRef<'_>> {
        self.get(key).ok_or(HoardError::KeyNotFound)
    }

    /// Decide where an insert goes.
    ///
    /// `anchor` is the duplicate position of the issuing cursor when that
    /// cursor sits on this same key. It is the target of an overwrite
    /// (position 0 without one) and the reference point of the
    /// before/after duplicate policies (which fail without one).
    pub fn resolve_insert(
        &self,
        key: &[u8],
        flags: InsertFlags,
        anchor: Option<usize>,
    ) -> Result<Placement> {
        flags.validate(self.duplicates_enabled())?;

        let Some(entry) = self.get(key) else {
            return Ok(Placement::NewEntry);
        };

        if flags.is_overwrite() {
            let position = anchor.unwrap_or(0);
            entry.chain.record_at(position)?;
            return Ok(Placement::Overwrite(position));
        }

        let Some(position) = flags.duplicate() else {
            return Err(HoardError::KeyExists);
        };
        let policy = match position {
            DuplicatePosition::First => InsertPolicy::Prepend,
            DuplicatePosition::Last => InsertPolicy::Append,
            DuplicatePosition::Before => InsertPolicy::Before(require_anchor(anchor)?),
            DuplicatePosition::After => InsertPolicy::After(require_anchor(anchor)?),
        };
        Ok(Placement::Duplicate(entry.chain.position_for(policy)?))
    }

    /// Apply a resolved insert
    pub fn place(&mut self, key: Key, record: Record, placement: Placement) -> Result<Mutation> {
        match placement {
            Placement::NewEntry => {
                self.insert_entry(key.clone(), DuplicateChain::new(record))?;
                trace!(key = ?key, "entry created");
                Ok(Mutation::Inserted {
                    key,
                    position: 0,
                    created: true,
                })
            }
            Placement::Duplicate(position) => {
                let (stored, chain) = self.get_mut(&key).ok_or(HoardError::KeyNotFound)?;
                chain.insert_at(position, record)?;
                trace!(key = ?stored, position, count = chain.count(), "duplicate inserted");
                Ok(Mutation::Inserted {
                    key: stored.clone(),
                    position,
                    created: false,
                })
            }
            Placement::Overwrite(position) => {
                let (stored, chain) = self.get_mut(&key).ok_or(HoardError::KeyNotFound)?;
                chain.overwrite(position, record)?;
                Ok(Mutation::Overwritten {
                    key: stored.clone(),
                    position,
                })
            }
        }
    }

    /// Resolve and apply an insert in one step
    pub fn insert(
        &mut self,
        key: Key,
        record: Record,
        flags: InsertFlags,
        anchor: Option<usize>,
    ) -> Result<Mutation> {
        let placement = self.resolve_insert(&key, flags, anchor)?;
        self.place(key, record, placement)
    }

    /// Check that an erase would succeed
    pub fn resolve_erase(&self, key: &[u8], position: Option<usize>) -> Result<()> {
        let entry = self.find(key)?;
        if let Some(position) = position {
            entry.chain.record_at(position)?;
        }
        Ok(())
    }

    /// Remove one record (`Some(position)`) or the whole entry (`None`).
    /// Removing the last record of a chain removes the entry.
    pub fn erase(&mut self, key: &[u8], position: Option<usize>) -> Result<Mutation> {
        let Some(position) = position else {
            let (key, chain) = self.remove_entry(key).ok_or(HoardError::KeyNotFound)?;
            trace!(key = ?key, records = chain.count(), "entry removed");
            return Ok(Mutation::EntryRemoved {
                key,
                records: chain.count(),
            });
        };

        let (stored, chain) = self.get_mut(key).ok_or(HoardError::KeyNotFound)?;
        let stored = stored.clone();
        let (_, status) = chain.remove_at(position)?;
        match status {
            ChainStatus::Remaining(count) => {
                trace!(key = ?stored, position, count, "duplicate removed");
                Ok(Mutation::DuplicateRemoved {
                    key: stored,
                    position,
                })
            }
            ChainStatus::Empty => {
                self.remove_entry(&stored);
                trace!(key = ?stored, "last record removed, entry dropped");
                Ok(Mutation::EntryRemoved {
                    key: stored,
                    records: 1,
                })
            }
        }
    }
}

fn require_anchor(anchor: Option<usize>) -> Result<usize> {
    anchor.ok_or_else(|| {
        HoardError::InvalidArgument(
            "before/after duplicate insert needs a cursor positioned on the key".to_string(),
        )
    })
}
