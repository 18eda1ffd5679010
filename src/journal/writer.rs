//! Journal Writer
//!
//! Handles appending entries to the journal file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{error, trace, warn};

use crate::config::JournalSyncStrategy;
use crate::error::{HoardError, Result};

use super::{JournalEntry, JournalRecovery, Operation};

/// Writes entries to the journal file
pub struct JournalWriter {
    file: File,
    path: PathBuf,
    /// LSN the next append will use
    next_lsn: u64,
    sync_strategy: JournalSyncStrategy,
    /// Entries written since the last fsync
    unsynced: usize,
    size_bytes: u64,
    /// Set when a failed append could not be cut back off the file
    poisoned: bool,
}

impl JournalWriter {
    /// Open or create a journal file, continuing after its last valid LSN
    pub fn open(path: &Path, sync_strategy: JournalSyncStrategy) -> Result<Self> {
        let next_lsn = if path.exists() {
            JournalRecovery::verify(path)?.last_lsn + 1
        } else {
            1
        };
        Self::open_with_lsn(path, sync_strategy, next_lsn)
    }

    /// Open or create a journal file with an explicit next LSN
    /// (the caller already recovered the file)
    pub fn open_with_lsn(
        path: &Path,
        sync_strategy: JournalSyncStrategy,
        next_lsn: u64,
    ) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let size_bytes = file.metadata()?.len();

        Ok(Self {
            file,
            path: path.to_path_buf(),
            next_lsn: next_lsn.max(1),
            sync_strategy,
            unsynced: 0,
            size_bytes,
            poisoned: false,
        })
    }

    /// Append an operation, returning the LSN it was logged under.
    ///
    /// Either the frame is written (and synced when the strategy says so)
    /// or the file is cut back to where it was and the LSN is not used.
    /// If even that cut fails the writer refuses further appends, since
    /// the file may end in a frame the caller never applied.
    pub fn append(&mut self, operation: Operation) -> Result<u64> {
        if self.poisoned {
            return Err(HoardError::JournalWrite(format!(
                "{} has an unrecoverable tail; reopen the store",
                self.path.display()
            )));
        }

        let lsn = self.next_lsn;
        let frame = JournalEntry::new(lsn, operation).serialize()?;
        let start = self.size_bytes;

        if let Err(e) = self.write_frame(&frame) {
            self.roll_back(start, lsn);
            return Err(e);
        }

        self.size_bytes += frame.len() as u64;
        self.next_lsn += 1;
        trace!(lsn, bytes = frame.len(), "journal append");
        Ok(lsn)
    }

    fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.file.write_all(frame)?;
        self.unsynced += 1;

        let due = match self.sync_strategy {
            JournalSyncStrategy::EveryWrite => true,
            JournalSyncStrategy::EveryNEntries { count } => self.unsynced >= count.max(1),
        };
        if due {
            self.sync()?;
        }
        Ok(())
    }

    /// Cut a failed frame off the end of the file
    fn roll_back(&mut self, start: u64, lsn: u64) {
        self.unsynced = self.unsynced.saturating_sub(1);
        match self.file.set_len(start) {
            Ok(()) => warn!(lsn, offset = start, "journal append failed, frame rolled back"),
            Err(e) => {
                self.poisoned = true;
                error!(lsn, offset = start, error = %e, "journal append failed and could not be rolled back");
            }
        }
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Discard every entry (they are covered by a checkpoint).
    /// LSNs keep increasing across truncations.
    pub fn truncate(&mut self) -> Result<()> {
        self.file.set_len(0)?;
        self.file.sync_all()?;
        self.size_bytes = 0;
        self.unsynced = 0;
        self.poisoned = false;
        Ok(())
    }

    /// LSN the next append will use
    pub fn current_lsn(&self) -> u64 {
        self.next_lsn
    }

    /// Current file size in bytes
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
