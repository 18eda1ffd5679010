//! Storage Module
//!
//! Checkpoint snapshots of the ordered index.
//!
//! ## Responsibilities
//! - Persist every entry with its full duplicate chain, in key order
//! - Record which comparator ordered the keys and whether duplicates were on
//! - Detect torn or corrupt files before anything is loaded
//!
//! A snapshot is always written to a temporary file and renamed over the
//! previous one, so a crash mid-checkpoint leaves the old snapshot intact.
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Header                                                       │
//! │   Magic: "HKVS" (4) | Version: u16 (2) | Flags: u16 (2)      │
//! │   EntryCount: u64 (8) | CheckpointLsn: u64 (8)               │
//! │   NameLen: u16 (2) | Comparator name                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Data Block (variable)                                        │
//! │   [KeyLen: u32][DupCount: u32][Key]                          │
//! │     [RecLen: u32][Record] ... repeated DupCount times ...    │
//! │   ... repeated for each entry ...                            │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Footer (16 bytes)                                            │
//! │   DataEnd: u64 (8) | DataCRC: u32 (4) | Padding (4)          │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//! All integers little-endian. The CRC covers the data block only.

mod builder;
mod reader;

use std::path::PathBuf;

pub use builder::SnapshotBuilder;
pub use reader::{SnapshotIterator, SnapshotReader};

// =============================================================================
// Shared Constants (used by builder and reader)
// =============================================================================

/// Magic bytes identifying a snapshot file
pub(crate) const MAGIC: &[u8; 4] = b"HKVS";

/// Current snapshot format version
pub(crate) const VERSION: u16 = 1;

/// Fixed header part: Magic (4) + Version (2) + Flags (2) + EntryCount (8)
/// + CheckpointLsn (8) + NameLen (2)
pub(crate) const FIXED_HEADER_SIZE: usize = 26;

/// Offset of the entry count inside the header
pub(crate) const ENTRY_COUNT_OFFSET: u64 = 8;

/// Offset of the checkpoint LSN inside the header
pub(crate) const CHECKPOINT_LSN_OFFSET: usize = 16;

/// Offset of the comparator name length inside the header
pub(crate) const NAME_LEN_OFFSET: usize = 24;

/// Footer size: DataEnd (8) + DataCRC (4) + Padding (4)
pub(crate) const FOOTER_SIZE: usize = 16;

/// Header flag: the index accepted duplicate keys
pub(crate) const FLAG_DUPLICATES: u16 = 0x0001;

// =============================================================================
// Snapshot Metadata
// =============================================================================

/// What a snapshot declares about the index it was taken from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotHeader {
    /// Duplicate keys were enabled
    pub duplicates: bool,
    /// `KeyComparator::name` of the comparator that ordered the keys
    pub comparator: String,
    /// Last journal LSN whose effect is included (0 if none)
    pub checkpoint_lsn: u64,
}

/// Summary of a freshly written snapshot
#[derive(Debug, Clone)]
pub struct SnapshotInfo {
    pub path: PathBuf,
    /// Number of distinct keys
    pub entry_count: u64,
    /// Number of records across all chains
    pub record_count: u64,
    pub file_size: u64,
}
