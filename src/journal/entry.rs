//! Journal entry definitions
//!
//! Defines the structure of individual journal entries and their frame.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{HoardError, Result};

/// Frame header: LSN (8) + CRC (4) + payload length (4)
pub const HEADER_SIZE: usize = 16;

/// A single entry in the journal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// The resolved mutation
    pub operation: Operation,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

/// Mutations as they were applied, with every duplicate position already
/// resolved. Replaying them in order rebuilds the exact same chains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Create the entry (position 0) or add a duplicate at `position`
    Insert {
        key: Bytes,
        record: Bytes,
        position: usize,
    },

    /// Replace the record at `position`
    Overwrite {
        key: Bytes,
        record: Bytes,
        position: usize,
    },

    /// Remove one duplicate, or the whole entry when `duplicate` is None
    Erase {
        key: Bytes,
        duplicate: Option<usize>,
    },
}

impl Operation {
    pub fn key(&self) -> &Bytes {
        match self {
            Operation::Insert { key, .. }
            | Operation::Overwrite { key, .. }
            | Operation::Erase { key, .. } => key,
        }
    }
}

impl JournalEntry {
    /// Create an entry stamped with the current time
    pub fn new(lsn: u64, operation: Operation) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            lsn,
            operation,
            timestamp,
        }
    }

    fn payload(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| HoardError::Serialization(e.to_string()))
    }

    /// CRC32 of the serialized payload
    pub fn compute_crc(&self) -> Result<u32> {
        Ok(crc32fast::hash(&self.payload()?))
    }

    /// Size of the full frame in bytes
    pub fn serialized_size(&self) -> Result<usize> {
        let payload = bincode::serialized_size(self)
            .map_err(|e| HoardError::Serialization(e.to_string()))?;
        Ok(HEADER_SIZE + payload as usize)
    }

    /// Encode as `[lsn][crc][len][payload]`
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let payload = self.payload()?;
        let len = u32::try_from(payload.len()).map_err(|_| {
            HoardError::JournalWrite(format!("entry of {} bytes exceeds frame limit", payload.len()))
        })?;

        let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
        frame.extend_from_slice(&self.lsn.to_le_bytes());
        frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&payload);
        Ok(frame)
    }

    /// Decode one complete frame, validating length, CRC and LSN
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let header = FrameHeader::parse(bytes)?;
        let end = HEADER_SIZE + header.len as usize;
        if bytes.len() < end {
            return Err(HoardError::JournalCorruption(format!(
                "truncated frame: need {} bytes, have {}",
                end,
                bytes.len()
            )));
        }
        header.decode(&bytes[HEADER_SIZE..end])
    }
}

/// Parsed frame header
#[derive(Debug, Clone, Copy)]
pub(crate) struct FrameHeader {
    pub lsn: u64,
    pub crc: u32,
    pub len: u32,
}

impl FrameHeader {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let header: &[u8; HEADER_SIZE] = bytes
            .get(..HEADER_SIZE)
            .and_then(|h| h.try_into().ok())
            .ok_or_else(|| {
                HoardError::JournalCorruption(format!(
                    "frame header needs {} bytes, have {}",
                    HEADER_SIZE,
                    bytes.len()
                ))
            })?;

        let mut lsn = [0u8; 8];
        let mut crc = [0u8; 4];
        let mut len = [0u8; 4];
        lsn.copy_from_slice(&header[0..8]);
        crc.copy_from_slice(&header[8..12]);
        len.copy_from_slice(&header[12..16]);

        Ok(Self {
            lsn: u64::from_le_bytes(lsn),
            crc: u32::from_le_bytes(crc),
            len: u32::from_le_bytes(len),
        })
    }

    /// Check the payload against this header and decode it
    pub fn decode(&self, payload: &[u8]) -> Result<JournalEntry> {
        let actual = crc32fast::hash(payload);
        if actual != self.crc {
            return Err(HoardError::JournalCorruption(format!(
                "CRC mismatch at lsn {}: stored {:#010x}, computed {:#010x}",
                self.lsn, self.crc, actual
            )));
        }

        let entry: JournalEntry = bincode::deserialize(payload)
            .map_err(|e| HoardError::JournalCorruption(format!("undecodable entry: {}", e)))?;
        if entry.lsn != self.lsn {
            return Err(HoardError::JournalCorruption(format!(
                "header lsn {} disagrees with entry lsn {}",
                self.lsn, entry.lsn
            )));
        }
        Ok(entry)
    }
}
