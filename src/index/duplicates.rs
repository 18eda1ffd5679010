//! Duplicate chains
//!
//! Every entry in the index owns one chain. A store without duplicate
//! support simply never grows a chain past one record.
//!
//! Positions are plain zero-based indexes. The shift rule is the only
//! thing cursors rely on:
//! - inserting at `p` moves every position `>= p` up by one
//! - removing `p` moves every position `> p` down by one

use crate::error::{HoardError, Result};

use super::Record;

/// Where a new record lands inside a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPolicy {
    /// After the last record
    Append,
    /// Before the first record
    Prepend,
    /// Directly before the anchor position
    Before(usize),
    /// Directly after the anchor position
    After(usize),
}

/// What is left of a chain after a removal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainStatus {
    /// Records remain (the new count)
    Remaining(usize),
    /// The chain is empty; its entry has to go
    Empty,
}

/// Ordered records sharing one key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateChain {
    records: Vec<Record>,
}

impl DuplicateChain {
    /// A chain holding a single record
    pub fn new(record: Record) -> Self {
        Self {
            records: vec![record],
        }
    }

    /// Rebuild a chain from stored records
    pub fn from_records(records: Vec<Record>) -> Result<Self> {
        if records.is_empty() {
            return Err(HoardError::Storage(
                "duplicate chain must hold at least one record".to_string(),
            ));
        }
        Ok(Self { records })
    }

    /// Number of records (always >= 1 while the entry is indexed)
    pub fn count(&self) -> usize {
        self.records.len()
    }

    pub fn record_at(&self, position: usize) -> Result<&Record> {
        self.records
            .get(position)
            .ok_or(HoardError::DuplicateOutOfRange {
                position,
                count: self.records.len(),
            })
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    /// Resolve a policy to the position the new record would occupy
    pub fn position_for(&self, policy: InsertPolicy) -> Result<usize> {
        let count = self.records.len();
        match policy {
            InsertPolicy::Append => Ok(count),
            InsertPolicy::Prepend => Ok(0),
            InsertPolicy::Before(anchor) => {
                self.check_anchor(anchor)?;
                Ok(anchor)
            }
            InsertPolicy::After(anchor) => {
                self.check_anchor(anchor)?;
                Ok(anchor + 1)
            }
        }
    }

    /// Insert according to a policy, returning the new record's position
    pub fn insert(&mut self, record: Record, policy: InsertPolicy) -> Result<usize> {
        let position = self.position_for(policy)?;
        self.records.insert(position, record);
        Ok(position)
    }

    /// Insert at an already-resolved position (`position <= count`)
    pub fn insert_at(&mut self, position: usize, record: Record) -> Result<()> {
        if position > self.records.len() {
            return Err(HoardError::InvalidArgument(format!(
                "insert position {} beyond chain end {}",
                position,
                self.records.len()
            )));
        }
        self.records.insert(position, record);
        Ok(())
    }

    /// Replace one record, returning the old one
    pub fn overwrite(&mut self, position: usize, record: Record) -> Result<Record> {
        let count = self.records.len();
        let slot = self
            .records
            .get_mut(position)
            .ok_or(HoardError::DuplicateOutOfRange { position, count })?;
        Ok(std::mem::replace(slot, record))
    }

    /// Remove one record
    pub fn remove_at(&mut self, position: usize) -> Result<(Record, ChainStatus)> {
        if position >= self.records.len() {
            return Err(HoardError::DuplicateOutOfRange {
                position,
                count: self.records.len(),
            });
        }
        let record = self.records.remove(position);
        let status = match self.records.len() {
            0 => ChainStatus::Empty,
            n => ChainStatus::Remaining(n),
        };
        Ok((record, status))
    }

    fn check_anchor(&self, anchor: usize) -> Result<()> {
        if anchor >= self.records.len() {
            return Err(HoardError::InvalidArgument(format!(
                "duplicate anchor {} out of range (chain holds {} records)",
                anchor,
                self.records.len()
            )));
        }
        Ok(())
    }
}
