//! Journal Reader
//!
//! Handles reading entries from the journal file.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::{HoardError, Result};

use super::entry::{FrameHeader, HEADER_SIZE};
use super::JournalEntry;

/// Frames larger than this are treated as garbage rather than allocated
const MAX_FRAME_PAYLOAD: u32 = 256 * 1024 * 1024;

/// What the next frame turned out to be
#[derive(Debug)]
pub(crate) enum Frame {
    /// A valid entry
    Entry(JournalEntry),
    /// Clean end of file
    End,
    /// The file ends partway through a frame
    Torn,
    /// A complete frame that fails validation
    Corrupt(String),
}

/// Reads entries from the journal file
pub struct JournalReader {
    reader: BufReader<File>,
    /// Offset just past the last valid frame
    position: u64,
    file_len: u64,
}

impl JournalReader {
    /// Open a journal file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        Ok(Self {
            reader: BufReader::new(file),
            position: 0,
            file_len,
        })
    }

    /// Offset just past the last valid frame
    pub fn position(&self) -> u64 {
        self.position
    }

    pub(crate) fn read_frame(&mut self) -> Result<Frame> {
        let remaining = self.file_len - self.position;
        if remaining == 0 {
            return Ok(Frame::End);
        }
        if remaining < HEADER_SIZE as u64 {
            return Ok(Frame::Torn);
        }

        let mut header = [0u8; HEADER_SIZE];
        self.reader.read_exact(&mut header)?;
        let header = FrameHeader::parse(&header)?;

        if header.len > MAX_FRAME_PAYLOAD {
            return Ok(Frame::Corrupt(format!(
                "frame length {} at offset {} is implausible",
                header.len, self.position
            )));
        }
        if remaining < HEADER_SIZE as u64 + header.len as u64 {
            return Ok(Frame::Torn);
        }

        let mut payload = vec![0u8; header.len as usize];
        self.reader.read_exact(&mut payload)?;

        match header.decode(&payload) {
            Ok(entry) => {
                self.position += (HEADER_SIZE + payload.len()) as u64;
                Ok(Frame::Entry(entry))
            }
            Err(HoardError::JournalCorruption(reason)) => Ok(Frame::Corrupt(reason)),
            Err(e) => Err(e),
        }
    }

    /// Read the next entry from the journal.
    ///
    /// `Ok(None)` at a clean end of file; torn or corrupt frames are errors.
    pub fn next_entry(&mut self) -> Result<Option<JournalEntry>> {
        match self.read_frame()? {
            Frame::Entry(entry) => Ok(Some(entry)),
            Frame::End => Ok(None),
            Frame::Torn => Err(HoardError::JournalCorruption(format!(
                "partial frame at offset {}",
                self.position
            ))),
            Frame::Corrupt(reason) => Err(HoardError::JournalCorruption(reason)),
        }
    }

    /// Iterate over all entries; stops after the first error
    pub fn entries(self) -> JournalIterator {
        JournalIterator {
            reader: self,
            done: false,
        }
    }
}

/// Iterator over journal entries
pub struct JournalIterator {
    reader: JournalReader,
    done: bool,
}

impl Iterator for JournalIterator {
    type Item = Result<JournalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
