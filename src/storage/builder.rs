//! Snapshot Builder
//!
//! Writes entries, in index order, to a new snapshot file.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::error::{HoardError, Result};

use super::{
    SnapshotHeader, SnapshotInfo, ENTRY_COUNT_OFFSET, FLAG_DUPLICATES, MAGIC, VERSION,
};

/// Builder for a snapshot file
///
/// Everything goes to `<path>.tmp` until `finish()` renames it into place.
pub struct SnapshotBuilder {
    /// Final file path
    path: PathBuf,
    /// Temporary file path being written
    tmp_path: PathBuf,
    writer: BufWriter<File>,
    entry_count: u64,
    record_count: u64,
    /// Current write position
    offset: u64,
    /// Running CRC hasher for the data block
    data_hasher: crc32fast::Hasher,
}

impl SnapshotBuilder {
    /// Start a snapshot; the header is written immediately with a
    /// placeholder entry count
    pub fn new(path: &Path, header: &SnapshotHeader) -> Result<Self> {
        let name = header.comparator.as_bytes();
        let name_len = u16::try_from(name.len()).map_err(|_| {
            HoardError::Storage(format!("comparator name of {} bytes is too long", name.len()))
        })?;

        let tmp_path = path.with_extension("tmp");
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;
        let mut writer = BufWriter::new(file);

        let flags = if header.duplicates { FLAG_DUPLICATES } else { 0 };
        writer.write_all(MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&flags.to_le_bytes())?;
        writer.write_all(&0u64.to_le_bytes())?; // entry count, patched in finish
        writer.write_all(&header.checkpoint_lsn.to_le_bytes())?;
        writer.write_all(&name_len.to_le_bytes())?;
        writer.write_all(name)?;

        Ok(Self {
            path: path.to_path_buf(),
            tmp_path,
            writer,
            entry_count: 0,
            record_count: 0,
            offset: (super::FIXED_HEADER_SIZE + name.len()) as u64,
            data_hasher: crc32fast::Hasher::new(),
        })
    }

    /// Add one entry and its chain (must be called in index order)
    pub fn add(&mut self, key: &[u8], records: &[Bytes]) -> Result<()> {
        if records.is_empty() {
            return Err(HoardError::Storage(format!(
                "entry {:?} has an empty duplicate chain",
                String::from_utf8_lossy(key)
            )));
        }

        self.put_u32(len_u32(key.len())?)?;
        self.put_u32(len_u32(records.len())?)?;
        self.put(key)?;
        for record in records {
            self.put_u32(len_u32(record.len())?)?;
            self.put(record)?;
        }

        self.entry_count += 1;
        self.record_count += records.len() as u64;
        Ok(())
    }

    /// Write the footer, sync, and atomically replace any previous snapshot
    pub fn finish(mut self) -> Result<SnapshotInfo> {
        let data_end = self.offset;
        let data_crc = self.data_hasher.clone().finalize();

        self.writer.write_all(&data_end.to_le_bytes())?;
        self.writer.write_all(&data_crc.to_le_bytes())?;
        self.writer.write_all(&[0u8; 4])?;
        self.writer.flush()?;

        let mut file = self
            .writer
            .into_inner()
            .map_err(|e| HoardError::Storage(format!("Failed to flush snapshot: {}", e)))?;
        file.seek(SeekFrom::Start(ENTRY_COUNT_OFFSET))?;
        file.write_all(&self.entry_count.to_le_bytes())?;
        file.sync_all()?;
        let file_size = file.metadata()?.len();
        drop(file);

        fs::rename(&self.tmp_path, &self.path)?;

        Ok(SnapshotInfo {
            path: self.path,
            entry_count: self.entry_count,
            record_count: self.record_count,
            file_size,
        })
    }

    fn put(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes)?;
        self.data_hasher.update(bytes);
        self.offset += bytes.len() as u64;
        Ok(())
    }

    fn put_u32(&mut self, value: u32) -> Result<()> {
        self.put(&value.to_le_bytes())
    }
}

fn len_u32(len: usize) -> Result<u32> {
    u32::try_from(len)
        .map_err(|_| HoardError::Storage(format!("{} bytes exceeds the snapshot field limit", len)))
}
