//! Store Module
//!
//! The store handle that ties the index, the cursor registry and the
//! persistence collaborators together.
//!
//! ## Responsibilities
//! - Open, recover and close stores (in-memory or directory-backed)
//! - Serialize writers; let readers and cursors proceed concurrently
//! - Route every mutation through the executor
//! - Checkpoint: snapshot the index and truncate the journal
//!
//! ## Concurrency Model: Single-Writer / Multiple-Reader
//!
//! - **Writes** take the index write lock, then the cursor registry, then
//!   the journal. Only one mutation runs at a time.
//! - **Reads** take the index read lock (and the registry for cursor reads),
//!   so lookups and cursor moves run side by side.
//!
//! Locks are always taken in that order: index → cursors → journal.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::comparator::{default_comparator, SharedComparator};
use crate::config::Config;
use crate::cursor::registry::{CursorRegistry, CursorState};
use crate::cursor::{Cursor, DuplicateMode};
use crate::error::{HoardError, Result};
use crate::executor::{Command, Executor, Response};
use crate::index::{DuplicateChain, InsertFlags, OrderedIndex, Record};
use crate::journal::{JournalRecovery, JournalWriter};
use crate::storage::{SnapshotBuilder, SnapshotHeader, SnapshotInfo, SnapshotReader};

/// File locations of a directory-backed store
#[derive(Debug, Clone)]
struct StorePaths {
    snapshot: PathBuf,
    journal: PathBuf,
}

/// An ordered key/value store
///
/// Keys are kept in the order of the store's comparator. With duplicates
/// enabled, a key holds an ordered chain of records.
pub struct Store {
    /// Store configuration
    config: Config,

    /// The authoritative entries
    index: RwLock<OrderedIndex>,

    /// Positions of every open cursor
    cursors: Mutex<CursorRegistry>,

    /// Journal of a directory-backed store (`None` in memory)
    journal: Mutex<Option<JournalWriter>>,

    paths: Option<StorePaths>,
}

impl Store {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const SNAPSHOT_FILENAME: &'static str = "store.hkv";
    const JOURNAL_FILENAME: &'static str = "journal.log";

    /// Open or create a store with the given config
    ///
    /// For a directory-backed store:
    /// 1. Create the data directory if needed
    /// 2. Load the last snapshot, checking comparator and duplicate flag
    /// 3. Replay the journal on top of it
    /// 4. Checkpoint if anything was replayed, so the journal starts empty
    pub fn open(config: Config) -> Result<Self> {
        let comparator = config.comparator.clone().unwrap_or_else(default_comparator);
        let mut index =
            OrderedIndex::new(comparator, config.node_capacity, config.enable_duplicates);

        let Some(data_dir) = config.data_dir.clone() else {
            debug!(duplicates = config.enable_duplicates, "in-memory store opened");
            return Ok(Self::assemble(config, index, None, None));
        };

        fs::create_dir_all(&data_dir)?;
        let paths = StorePaths {
            snapshot: data_dir.join(Self::SNAPSHOT_FILENAME),
            journal: data_dir.join(Self::JOURNAL_FILENAME),
        };

        let checkpoint_lsn = if paths.snapshot.exists() {
            load_snapshot(&mut index, &paths.snapshot)?
        } else {
            0
        };

        let mut registry = CursorRegistry::new();
        let mut last_lsn = checkpoint_lsn;
        let mut replayed = 0u64;
        if paths.journal.exists() {
            let (entries, recovery) = JournalRecovery::recover(&paths.journal)?;
            let mut executor = Executor::new(&mut index, &mut registry, None);
            // Entries at or below the checkpoint LSN are already in the snapshot
            for entry in entries.into_iter().filter(|e| e.lsn > checkpoint_lsn) {
                let lsn = entry.lsn;
                executor.replay(entry.operation).map_err(|e| {
                    HoardError::JournalCorruption(format!("replay of lsn {} failed: {}", lsn, e))
                })?;
                replayed += 1;
            }
            last_lsn = last_lsn.max(recovery.last_lsn);

            if recovery.entries_recovered > 0 || recovery.entries_corrupted > 0 {
                info!(
                    recovered = recovery.entries_recovered,
                    corrupted = recovery.entries_corrupted,
                    last_lsn = recovery.last_lsn,
                    "journal recovery"
                );
            }
        }

        let journal =
            JournalWriter::open_with_lsn(&paths.journal, config.journal_sync_strategy, last_lsn + 1)?;

        info!(
            path = %data_dir.display(),
            entries = index.len(),
            duplicates = config.enable_duplicates,
            comparator = index.comparator().name(),
            "store opened"
        );

        let store = Self::assemble(config, index, Some(journal), Some(paths));
        if replayed > 0 {
            store.checkpoint()?;
        }
        Ok(store)
    }

    /// Open a directory-backed store with default settings
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    /// An empty in-memory store with default settings
    pub fn in_memory() -> Self {
        let config = Config::in_memory();
        let index = OrderedIndex::new(
            default_comparator(),
            config.node_capacity,
            config.enable_duplicates,
        );
        Self::assemble(config, index, None, None)
    }

    fn assemble(
        config: Config,
        index: OrderedIndex,
        journal: Option<JournalWriter>,
        paths: Option<StorePaths>,
    ) -> Self {
        Self {
            config,
            index: RwLock::new(index),
            cursors: Mutex::new(CursorRegistry::new()),
            journal: Mutex::new(journal),
            paths,
        }
    }

    /// Install a comparator. Fails with `InvalidArgument` unless the store
    /// is empty.
    ///
    /// A directory-backed store checkpoints straight away so the snapshot
    /// header names the new comparator before any key is written under it.
    pub fn set_comparator(&self, comparator: SharedComparator) -> Result<()> {
        let mut index = self.index.write();
        let previous = Arc::clone(index.comparator());
        index.set_comparator(comparator)?;

        let mut journal = self.journal.lock();
        if let Some(writer) = journal.as_mut() {
            if let Err(e) = self.write_checkpoint(&index, writer) {
                index.set_comparator(previous)?;
                return Err(e);
            }
        }
        Ok(())
    }

    // =========================================================================
    // Key Operations
    // =========================================================================

    /// Insert a new key; fails with `KeyExists` if it is already stored
    pub fn insert(&self, key: &[u8], record: &[u8]) -> Result<()> {
        self.insert_with(key, record, InsertFlags::NONE)
    }

    /// Insert under `flags`. Overwrite targets the first duplicate;
    /// before/after duplicate placement needs a cursor (see
    /// [`Cursor::insert_with`]).
    pub fn insert_with(&self, key: &[u8], record: &[u8], flags: InsertFlags) -> Result<()> {
        let key = Bytes::copy_from_slice(key);
        let record = Bytes::copy_from_slice(record);
        self.mutate(|executor| executor.insert(key, record, flags, None))
            .map(drop)
    }

    /// First record of `key`
    pub fn find(&self, key: &[u8]) -> Result<Record> {
        self.find_duplicate(key, 0)
    }

    /// Record at one duplicate position of `key`
    pub fn find_duplicate(&self, key: &[u8], position: usize) -> Result<Record> {
        let index = self.index.read();
        let entry = index.find(key)?;
        entry.chain.record_at(position).cloned()
    }

    /// All records of `key`, in chain order
    pub fn records(&self, key: &[u8]) -> Result<Vec<Record>> {
        let index = self.index.read();
        Ok(index.find(key)?.chain.records().to_vec())
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.index.read().contains(key)
    }

    /// Remove `key` with all its duplicates
    pub fn erase(&self, key: &[u8]) -> Result<()> {
        self.mutate(|executor| executor.erase(key, None, None))
            .map(drop)
    }

    /// Remove one duplicate of `key`; removing the last one removes the key
    pub fn erase_duplicate(&self, key: &[u8], position: usize) -> Result<()> {
        self.mutate(|executor| executor.erase(key, Some(position), None))
            .map(drop)
    }

    /// Chain length of `key`
    pub fn duplicate_count(&self, key: &[u8]) -> Result<usize> {
        Ok(self.index.read().find(key)?.chain.count())
    }

    /// Number of records (`All`) or distinct keys (`Skip`)
    pub fn key_count(&self, mode: DuplicateMode) -> Result<usize> {
        mode.count(&self.index.read())
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }

    /// Open an unpositioned cursor
    pub fn cursor(&self) -> Cursor<'_> {
        let id = self.cursors.lock().register(CursorState::Unpositioned);
        Cursor::new(self, id)
    }

    /// Execute a command
    pub fn execute(&self, command: Command) -> Result<Response> {
        match command {
            Command::Insert { key, record, flags } => {
                self.mutate(|executor| executor.insert(key, record, flags, None))?;
                Ok(Response::Ok)
            }
            Command::Find { key } => self.find(&key).map(Response::Record),
            Command::Erase { key } => {
                self.erase(&key)?;
                Ok(Response::Ok)
            }
            Command::EraseDuplicate { key, position } => {
                self.erase_duplicate(&key, position)?;
                Ok(Response::Ok)
            }
            Command::Count { mode } => self.key_count(mode).map(Response::Count),
        }
    }

    /// Check the index structure and ordering
    pub fn verify(&self) -> Result<()> {
        self.index.read().verify()
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Write a snapshot and truncate the journal. A no-op in memory.
    pub fn checkpoint(&self) -> Result<Option<SnapshotInfo>> {
        let index = self.index.read();
        let mut journal = self.journal.lock();
        match journal.as_mut() {
            Some(writer) => self.write_checkpoint(&index, writer).map(Some),
            None => Ok(None),
        }
    }

    fn write_checkpoint(
        &self,
        index: &OrderedIndex,
        journal: &mut JournalWriter,
    ) -> Result<SnapshotInfo> {
        let paths = self
            .paths
            .as_ref()
            .ok_or_else(|| HoardError::Config("in-memory store has no snapshot".to_string()))?;

        let header = SnapshotHeader {
            duplicates: index.duplicates_enabled(),
            comparator: index.comparator().name().to_string(),
            checkpoint_lsn: journal.current_lsn() - 1,
        };
        let mut builder = SnapshotBuilder::new(&paths.snapshot, &header)?;
        for entry in index.iter() {
            builder.add(entry.key, entry.chain.records())?;
        }
        let snapshot = builder.finish()?;

        // The snapshot is durable, so the entries it covers can go
        journal.truncate()?;

        info!(
            entries = snapshot.entry_count,
            records = snapshot.record_count,
            bytes = snapshot.file_size,
            checkpoint_lsn = header.checkpoint_lsn,
            "checkpoint written"
        );
        Ok(snapshot)
    }

    /// Close the store, checkpointing a directory-backed one
    pub fn close(self) -> Result<()> {
        if let Some(writer) = self.journal.lock().as_mut() {
            writer.sync()?;
        }
        self.checkpoint()?;
        debug!("store closed");
        Ok(())
    }

    // =========================================================================
    // Crate-internal Access
    // =========================================================================

    /// Run a mutation with all locks held, then checkpoint if the journal
    /// outgrew its limit
    pub(crate) fn mutate<T>(&self, f: impl FnOnce(&mut Executor<'_>) -> Result<T>) -> Result<T> {
        let mut index = self.index.write();
        let mut cursors = self.cursors.lock();
        let mut journal = self.journal.lock();

        let result = {
            let mut executor = Executor::new(&mut index, &mut cursors, journal.as_mut());
            f(&mut executor)?
        };

        if let Some(writer) = journal.as_mut() {
            if writer.size_bytes() >= self.config.journal_size_limit {
                debug!(
                    size = writer.size_bytes(),
                    limit = self.config.journal_size_limit,
                    "journal limit reached"
                );
                // The mutation is applied and journaled; a failed
                // checkpoint only leaves the journal longer
                if let Err(e) = self.write_checkpoint(&index, writer) {
                    warn!(error = %e, "automatic checkpoint failed");
                }
            }
        }
        Ok(result)
    }

    /// Run a cursor read or move against a consistent index
    pub(crate) fn with_cursors<T>(
        &self,
        f: impl FnOnce(&OrderedIndex, &mut CursorRegistry) -> Result<T>,
    ) -> Result<T> {
        let index = self.index.read();
        let mut cursors = self.cursors.lock();
        f(&index, &mut cursors)
    }

    /// Touch the registry alone (cursor open, clone, release)
    pub(crate) fn with_registry<T>(&self, f: impl FnOnce(&mut CursorRegistry) -> T) -> T {
        f(&mut self.cursors.lock())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the data directory path (`None` in memory)
    pub fn data_dir(&self) -> Option<&Path> {
        self.config.data_dir.as_deref()
    }

    /// Number of cursors currently open on this store
    pub fn open_cursors(&self) -> usize {
        self.cursors.lock().live()
    }

    /// Number of index levels
    pub fn depth(&self) -> usize {
        self.index.read().depth()
    }

    /// Current journal size in bytes (0 in memory)
    pub fn journal_size(&self) -> u64 {
        self.journal
            .lock()
            .as_ref()
            .map_or(0, JournalWriter::size_bytes)
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("data_dir", &self.config.data_dir)
            .field("entries", &self.len())
            .field("open_cursors", &self.open_cursors())
            .finish()
    }
}

/// Fill an empty index from a snapshot file, returning its checkpoint LSN
fn load_snapshot(index: &mut OrderedIndex, path: &Path) -> Result<u64> {
    let reader = SnapshotReader::open(path)?;
    let header = reader.header();

    if header.duplicates != index.duplicates_enabled() {
        return Err(HoardError::Config(format!(
            "snapshot was written with duplicates {}, store opened with duplicates {}",
            on_off(header.duplicates),
            on_off(index.duplicates_enabled())
        )));
    }
    if header.comparator != index.comparator().name() {
        return Err(HoardError::Config(format!(
            "snapshot keys are ordered by comparator '{}', store opened with '{}'",
            header.comparator,
            index.comparator().name()
        )));
    }

    for entry in reader.entries() {
        let (key, records) = entry?;
        let chain = DuplicateChain::from_records(records)?;
        index.insert_entry(key, chain).map_err(|e| match e {
            HoardError::KeyExists => {
                HoardError::Storage("snapshot holds the same key twice".to_string())
            }
            other => other,
        })?;
    }

    debug!(
        path = %path.display(),
        entries = index.len(),
        checkpoint_lsn = header.checkpoint_lsn,
        "snapshot loaded"
    );
    Ok(header.checkpoint_lsn)
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}
