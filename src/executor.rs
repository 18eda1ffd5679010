//! Operation Executor
//!
//! Every mutation of a store, whether it comes from the store API, from a
//! cursor, or from journal replay, runs through here.
//!
//! ## Responsibilities
//! - Resolve flags and the issuing cursor's position into an exact
//!   [`Operation`] before anything changes
//! - Journal that operation (persisted stores) ahead of applying it
//! - Apply it to the index through the same path replay uses
//! - Correct every open cursor for the change, then reposition the issuer
//!
//! A failure in any step before the journal append leaves index, cursors
//! and journal untouched.

use bytes::Bytes;
use tracing::trace;

use crate::cursor::registry::{CursorId, CursorRegistry, CursorState};
use crate::cursor::DuplicateMode;
use crate::error::{HoardError, Result};
use crate::index::{InsertFlags, Key, Mutation, OrderedIndex, Placement, Record};
use crate::journal::{JournalWriter, Operation};

// =============================================================================
// Commands
// =============================================================================

/// A store operation, for callers that dispatch on data rather than methods
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Insert under the given flags
    Insert {
        key: Bytes,
        record: Bytes,
        flags: InsertFlags,
    },

    /// First record of a key
    Find { key: Bytes },

    /// Remove a key with all its duplicates
    Erase { key: Bytes },

    /// Remove a single duplicate
    EraseDuplicate { key: Bytes, position: usize },

    /// Records (`All`) or distinct keys (`Skip`)
    Count { mode: DuplicateMode },
}

/// Result of executing a [`Command`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Ok,
    Record(Bytes),
    Count(usize),
}

// =============================================================================
// Executor
// =============================================================================

/// Borrowed view of everything a mutation touches. The store builds one
/// while holding its locks.
pub(crate) struct Executor<'a> {
    index: &'a mut OrderedIndex,
    cursors: &'a mut CursorRegistry,
    journal: Option<&'a mut JournalWriter>,
}

impl<'a> Executor<'a> {
    pub fn new(
        index: &'a mut OrderedIndex,
        cursors: &'a mut CursorRegistry,
        journal: Option<&'a mut JournalWriter>,
    ) -> Self {
        Self {
            index,
            cursors,
            journal,
        }
    }

    /// Insert a record. With an `issuer`, its position on the same key is
    /// the anchor for overwrite and before/after duplicates, and it ends up
    /// on the record that was written.
    pub fn insert(
        &mut self,
        key: Key,
        record: Record,
        flags: InsertFlags,
        issuer: Option<CursorId>,
    ) -> Result<Mutation> {
        let anchor = issuer.and_then(|id| {
            self.cursors
                .state(id)
                .duplicate_on(&key, self.index.comparator().as_ref())
        });

        let operation = match self.index.resolve_insert(&key, flags, anchor)? {
            Placement::NewEntry => Operation::Insert {
                key,
                record,
                position: 0,
            },
            Placement::Duplicate(position) => Operation::Insert {
                key,
                record,
                position,
            },
            Placement::Overwrite(position) => Operation::Overwrite {
                key,
                record,
                position,
            },
        };

        let mutation = self.commit(operation)?;
        if let Some(id) = issuer {
            let position = match mutation {
                Mutation::Inserted { position, .. } | Mutation::Overwritten { position, .. } => {
                    position
                }
                _ => 0,
            };
            self.cursors.set(
                id,
                CursorState::Positioned {
                    key: mutation.key().clone(),
                    duplicate: position,
                },
            );
        }
        Ok(mutation)
    }

    /// Replace the record under a cursor
    pub fn overwrite_at(&mut self, id: CursorId, record: Record) -> Result<Mutation> {
        let CursorState::Positioned { key, .. } = self.cursors.state(id) else {
            return Err(HoardError::CursorNotPositioned);
        };
        self.insert(key, record, InsertFlags::OVERWRITE, Some(id))
    }

    /// Remove one duplicate, or the whole entry when `position` is None
    pub fn erase(
        &mut self,
        key: &[u8],
        position: Option<usize>,
        issuer: Option<CursorId>,
    ) -> Result<Mutation> {
        self.index.resolve_erase(key, position)?;
        let operation = Operation::Erase {
            key: Bytes::copy_from_slice(key),
            duplicate: position,
        };

        let mutation = self.commit(operation)?;
        if let Some(id) = issuer {
            self.cursors.set(id, CursorState::Unpositioned);
        }
        Ok(mutation)
    }

    /// Remove the record under a cursor
    pub fn erase_at(&mut self, id: CursorId) -> Result<Mutation> {
        let CursorState::Positioned { key, duplicate } = self.cursors.state(id) else {
            return Err(HoardError::CursorNotPositioned);
        };
        self.erase(&key, Some(duplicate), Some(id))
    }

    /// Apply a journaled operation without logging it again
    pub fn replay(&mut self, operation: Operation) -> Result<Mutation> {
        let mutation = apply(self.index, operation)?;
        self.cursors
            .apply(&mutation, self.index.comparator().as_ref());
        Ok(mutation)
    }

    /// Journal then apply. A failed append leaves no frame behind, so the
    /// operation is neither applied nor replayed later.
    fn commit(&mut self, operation: Operation) -> Result<Mutation> {
        if let Some(journal) = self.journal.as_deref_mut() {
            let lsn = journal.append(operation.clone())?;
            trace!(lsn, "operation journaled");
        }
        self.replay(operation)
    }
}

/// Apply one resolved operation to the index. Inserts at a key that is not
/// stored create the entry.
pub(crate) fn apply(index: &mut OrderedIndex, operation: Operation) -> Result<Mutation> {
    match operation {
        Operation::Insert {
            key,
            record,
            position,
        } => {
            let placement = if index.contains(&key) {
                Placement::Duplicate(position)
            } else if position == 0 {
                Placement::NewEntry
            } else {
                return Err(HoardError::DuplicateOutOfRange { position, count: 0 });
            };
            index.place(key, record, placement)
        }
        Operation::Overwrite {
            key,
            record,
            position,
        } => index.place(key, record, Placement::Overwrite(position)),
        Operation::Erase { key, duplicate } => index.erase(&key, duplicate),
    }
}

impl DuplicateMode {
    /// Count records or keys of an index under this mode
    pub(crate) fn count(self, index: &OrderedIndex) -> Result<usize> {
        match self {
            DuplicateMode::All => Ok(index.record_count()),
            DuplicateMode::Skip => Ok(index.len()),
            DuplicateMode::Only => Err(HoardError::InvalidArgument(
                "key count needs All or Skip, not Only".to_string(),
            )),
        }
    }
}
