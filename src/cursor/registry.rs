//! Cursor registry
//!
//! Positions of every open cursor live here, not in the cursor handles,
//! so that a mutation issued anywhere can correct all of them in one
//! place. A position is logical: the stored key plus a duplicate index.
//! It never points into index memory.
//!
//! Corrections after a mutation on key `K` (cursors on other keys are
//! untouched):
//!
//! | Mutation                       | Cursor on `K` at `d`            |
//! |--------------------------------|---------------------------------|
//! | duplicate inserted at `p`      | `d >= p` → `d + 1`              |
//! | duplicate removed at `p`       | `d == p` → unpositioned, `d > p` → `d - 1` |
//! | entry removed                  | unpositioned                    |
//! | record overwritten             | unchanged                       |

use std::cmp::Ordering;

use tracing::debug;

use crate::comparator::KeyComparator;
use crate::index::{Key, Mutation};

/// Logical cursor position
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CursorState {
    #[default]
    Unpositioned,
    Positioned { key: Key, duplicate: usize },
}

impl CursorState {
    /// Duplicate index if positioned on `key`
    pub fn duplicate_on(&self, key: &[u8], cmp: &dyn KeyComparator) -> Option<usize> {
        match self {
            CursorState::Positioned { key: current, duplicate }
                if cmp.compare(current, key) == Ordering::Equal =>
            {
                Some(*duplicate)
            }
            _ => None,
        }
    }
}

/// Handle to a registry slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CursorId(usize);

/// Slab of cursor positions, indexed by `CursorId`
#[derive(Debug, Default)]
pub struct CursorRegistry {
    slots: Vec<Option<CursorState>>,
    free: Vec<usize>,
    live: usize,
}

impl CursorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, state: CursorState) -> CursorId {
        self.live += 1;
        match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(state);
                CursorId(slot)
            }
            None => {
                self.slots.push(Some(state));
                CursorId(self.slots.len() - 1)
            }
        }
    }

    pub fn release(&mut self, id: CursorId) {
        if let Some(slot) = self.slots.get_mut(id.0) {
            if slot.take().is_some() {
                self.live -= 1;
                self.free.push(id.0);
            }
        }
    }

    /// Current state (released ids read as unpositioned)
    pub fn state(&self, id: CursorId) -> CursorState {
        self.slots
            .get(id.0)
            .and_then(Option::as_ref)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set(&mut self, id: CursorId, state: CursorState) {
        if let Some(Some(slot)) = self.slots.get_mut(id.0) {
            *slot = state;
        }
    }

    /// Number of open cursors
    pub fn live(&self) -> usize {
        self.live
    }

    /// Correct every cursor on the mutated key. Returns how many moved or
    /// lost their position.
    pub fn apply(&mut self, mutation: &Mutation, cmp: &dyn KeyComparator) -> usize {
        let mut touched = 0;
        for state in self.slots.iter_mut().flatten() {
            let Some(duplicate) = state.duplicate_on(mutation.key(), cmp) else {
                continue;
            };
            let next = match *mutation {
                Mutation::Inserted {
                    position,
                    created: false,
                    ..
                } if duplicate >= position => Some(duplicate + 1),
                Mutation::DuplicateRemoved { position, .. } if duplicate == position => None,
                Mutation::DuplicateRemoved { position, .. } if duplicate > position => {
                    Some(duplicate - 1)
                }
                Mutation::EntryRemoved { .. } => None,
                _ => continue,
            };
            touched += 1;
            match next {
                Some(duplicate) => {
                    if let CursorState::Positioned { duplicate: d, .. } = state {
                        *d = duplicate;
                    }
                }
                None => {
                    debug!(key = ?mutation.key(), duplicate, "cursor invalidated by erase");
                    *state = CursorState::Unpositioned;
                }
            }
        }
        touched
    }
}
