//! Snapshot Reader
//!
//! Loads a snapshot file, validates it as a whole, then hands out its
//! entries without copying key or record bytes.

use std::fs;
use std::path::Path;

use bytes::Bytes;

use crate::error::{HoardError, Result};
use crate::index::{Key, Record};

use super::{
    SnapshotHeader, CHECKPOINT_LSN_OFFSET, FIXED_HEADER_SIZE, FLAG_DUPLICATES, FOOTER_SIZE, MAGIC,
    NAME_LEN_OFFSET, VERSION,
};

/// Reader for a validated snapshot file
#[derive(Debug)]
pub struct SnapshotReader {
    data: Bytes,
    header: SnapshotHeader,
    entry_count: u64,
    /// Data block bounds within `data`
    data_start: usize,
    data_end: usize,
}

impl SnapshotReader {
    /// Open a snapshot, checking magic, version, footer and data CRC
    pub fn open(path: &Path) -> Result<Self> {
        let data = Bytes::from(fs::read(path)?);

        if data.len() < FIXED_HEADER_SIZE + FOOTER_SIZE {
            return Err(corrupt(format!("file of {} bytes is too short", data.len())));
        }
        if &data[0..4] != MAGIC {
            return Err(corrupt(format!(
                "invalid magic: expected HKVS, got {:?}",
                &data[0..4]
            )));
        }

        let version = read_u16(&data, 4)?;
        if version != VERSION {
            return Err(corrupt(format!("unsupported version: {}", version)));
        }
        let flags = read_u16(&data, 6)?;
        let entry_count = read_u64(&data, 8)?;
        let checkpoint_lsn = read_u64(&data, CHECKPOINT_LSN_OFFSET)?;
        let name_len = read_u16(&data, NAME_LEN_OFFSET)? as usize;

        let data_start = FIXED_HEADER_SIZE + name_len;
        let footer_start = data.len() - FOOTER_SIZE;
        if data_start > footer_start {
            return Err(corrupt("header overruns the footer".to_string()));
        }
        let comparator = String::from_utf8(data[FIXED_HEADER_SIZE..data_start].to_vec())
            .map_err(|_| corrupt("comparator name is not UTF-8".to_string()))?;

        let data_end = read_u64(&data, footer_start)? as usize;
        if data_end != footer_start {
            return Err(corrupt(format!(
                "footer says data ends at {}, file has it at {}",
                data_end, footer_start
            )));
        }
        let stored_crc = read_u32(&data, footer_start + 8)?;
        let actual_crc = crc32fast::hash(&data[data_start..data_end]);
        if stored_crc != actual_crc {
            return Err(corrupt(format!(
                "data CRC mismatch: stored {:#010x}, computed {:#010x}",
                stored_crc, actual_crc
            )));
        }

        Ok(Self {
            data,
            header: SnapshotHeader {
                duplicates: flags & FLAG_DUPLICATES != 0,
                comparator,
                checkpoint_lsn,
            },
            entry_count,
            data_start,
            data_end,
        })
    }

    pub fn header(&self) -> &SnapshotHeader {
        &self.header
    }

    /// Number of distinct keys
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Iterate over `(key, chain)` pairs in stored order
    pub fn entries(&self) -> SnapshotIterator {
        SnapshotIterator {
            data: self.data.slice(self.data_start..self.data_end),
            pos: 0,
            remaining: self.entry_count,
            failed: false,
        }
    }
}

/// Iterator over snapshot entries
pub struct SnapshotIterator {
    data: Bytes,
    pos: usize,
    remaining: u64,
    failed: bool,
}

impl SnapshotIterator {
    fn read_entry(&mut self) -> Result<(Key, Vec<Record>)> {
        let key_len = self.take_u32()? as usize;
        let dup_count = self.take_u32()? as usize;
        if dup_count == 0 {
            return Err(corrupt(format!("entry at offset {} has no records", self.pos)));
        }
        let key = self.take(key_len)?;

        let mut records = Vec::with_capacity(dup_count.min(1024));
        for _ in 0..dup_count {
            let len = self.take_u32()? as usize;
            records.push(self.take(len)?);
        }
        Ok((key, records))
    }

    fn take(&mut self, len: usize) -> Result<Bytes> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| corrupt(format!("entry overruns data block at offset {}", self.pos)))?;
        let bytes = self.data.slice(self.pos..end);
        self.pos = end;
        Ok(bytes)
    }

    fn take_u32(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        read_u32(&bytes, 0)
    }
}

impl Iterator for SnapshotIterator {
    type Item = Result<(Key, Vec<Record>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if self.remaining == 0 {
            if self.pos != self.data.len() {
                self.failed = true;
                return Some(Err(corrupt(format!(
                    "{} trailing bytes after the last entry",
                    self.data.len() - self.pos
                ))));
            }
            return None;
        }

        self.remaining -= 1;
        let entry = self.read_entry();
        if entry.is_err() {
            self.failed = true;
        }
        Some(entry)
    }
}

fn corrupt(reason: String) -> HoardError {
    HoardError::Storage(format!("corrupt snapshot: {}", reason))
}

fn field<const N: usize>(bytes: &[u8], at: usize) -> Result<[u8; N]> {
    bytes
        .get(at..at + N)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| corrupt(format!("field at offset {} is out of bounds", at)))
}

fn read_u16(bytes: &[u8], at: usize) -> Result<u16> {
    field::<2>(bytes, at).map(u16::from_le_bytes)
}

fn read_u32(bytes: &[u8], at: usize) -> Result<u32> {
    field::<4>(bytes, at).map(u32::from_le_bytes)
}

fn read_u64(bytes: &[u8], at: usize) -> Result<u64> {
    field::<8>(bytes, at).map(u64::from_le_bytes)
}
