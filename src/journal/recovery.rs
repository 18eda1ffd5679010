//! Journal Recovery
//!
//! Handles crash recovery by reading back the journal.
//!
//! Entries carry resolved duplicate positions, so each one only makes
//! sense on top of all its predecessors. Recovery therefore keeps the
//! longest valid prefix and cuts the file at the first torn or corrupt
//! frame instead of skipping over it.

use std::fs::OpenOptions;
use std::path::Path;

use tracing::warn;

use crate::error::Result;

use super::reader::{Frame, JournalReader};
use super::JournalEntry;

/// Handles journal recovery after crash
pub struct JournalRecovery;

/// Result of a recovery operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of entries successfully recovered
    pub entries_recovered: u64,

    /// Number of corrupted frames found (recovery stops at the first)
    pub entries_corrupted: u64,

    /// Last valid LSN (0 if none)
    pub last_lsn: u64,

    /// Whether bytes after the valid prefix were (or would be) cut off
    pub was_truncated: bool,
}

impl JournalRecovery {
    /// Recover entries from a journal file
    ///
    /// This will:
    /// 1. Read all valid entries in order
    /// 2. Stop at the first torn or corrupt frame
    /// 3. Truncate the file to the valid prefix
    /// 4. Return the valid entries
    pub fn recover(path: &Path) -> Result<(Vec<JournalEntry>, RecoveryResult)> {
        let (entries, result, valid_len) = Self::scan(path, true)?;

        if result.was_truncated {
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(valid_len)?;
            file.sync_all()?;
            warn!(
                path = %path.display(),
                valid_len,
                corrupted = result.entries_corrupted,
                "journal tail discarded"
            );
        }

        Ok((entries, result))
    }

    /// Verify integrity of a journal file without modifying it
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        let (_, result, _) = Self::scan(path, false)?;
        Ok(result)
    }

    fn scan(path: &Path, keep: bool) -> Result<(Vec<JournalEntry>, RecoveryResult, u64)> {
        let mut reader = JournalReader::open(path)?;
        let mut entries = Vec::new();
        let mut result = RecoveryResult::default();

        loop {
            match reader.read_frame()? {
                Frame::Entry(entry) => {
                    if entry.lsn <= result.last_lsn {
                        warn!(lsn = entry.lsn, last = result.last_lsn, "journal lsn went backwards");
                        result.entries_corrupted += 1;
                        result.was_truncated = true;
                        let valid = reader.position() - entry_frame_len(&entry)?;
                        return Ok((entries, result, valid));
                    }
                    result.entries_recovered += 1;
                    result.last_lsn = entry.lsn;
                    if keep {
                        entries.push(entry);
                    }
                }
                Frame::End => break,
                Frame::Torn => {
                    result.was_truncated = true;
                    break;
                }
                Frame::Corrupt(reason) => {
                    warn!(reason = %reason, offset = reader.position(), "corrupt journal frame");
                    result.entries_corrupted += 1;
                    result.was_truncated = true;
                    break;
                }
            }
        }

        Ok((entries, result, reader.position()))
    }
}

fn entry_frame_len(entry: &JournalEntry) -> Result<u64> {
    Ok(entry.serialized_size()? as u64)
}
