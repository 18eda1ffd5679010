//! Configuration for hoardkv
//!
//! Store settings: where data lives, key semantics, index shape and
//! journal durability.

use std::path::PathBuf;

use crate::comparator::SharedComparator;

/// Main configuration for a store instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for the store files. `None` keeps everything in memory.
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── store.hkv        (last checkpoint snapshot)
    ///     └── journal.log      (operations since that checkpoint)
    pub data_dir: Option<PathBuf>,

    // -------------------------------------------------------------------------
    // Key Configuration
    // -------------------------------------------------------------------------
    /// Allow several records under one key
    pub enable_duplicates: bool,

    /// Comparator installed at open time (default: length-then-bytes)
    pub comparator: Option<SharedComparator>,

    // -------------------------------------------------------------------------
    // Index Configuration
    // -------------------------------------------------------------------------
    /// Max entries per leaf / separators per interior node
    pub node_capacity: usize,

    // -------------------------------------------------------------------------
    // Journal Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync the journal
    pub journal_sync_strategy: JournalSyncStrategy,

    /// Journal size (in bytes) that triggers an automatic checkpoint
    pub journal_size_limit: u64,
}

/// Journal sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalSyncStrategy {
    /// fsync after each appended operation
    EveryWrite,

    /// fsync after N unsynced entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Config {
    /// Smallest node capacity that still leaves room to borrow and merge
    pub const MIN_NODE_CAPACITY: usize = 4;

    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Default config for a purely in-memory store
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Whether this config persists data to disk
    pub fn is_persistent(&self) -> bool {
        self.data_dir.is_some()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            enable_duplicates: false,
            comparator: None,
            node_capacity: 64,
            journal_sync_strategy: JournalSyncStrategy::EveryNEntries { count: 100 },
            journal_size_limit: 16 * 1024 * 1024, // 16 MB
        }
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (enables persistence)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = Some(path.into());
        self
    }

    /// Enable or disable duplicate keys
    pub fn enable_duplicates(mut self, enabled: bool) -> Self {
        self.config.enable_duplicates = enabled;
        self
    }

    /// Install a comparator at open time
    pub fn comparator(mut self, comparator: SharedComparator) -> Self {
        self.config.comparator = Some(comparator);
        self
    }

    /// Set the B-tree node capacity (clamped to at least 4)
    pub fn node_capacity(mut self, capacity: usize) -> Self {
        self.config.node_capacity = capacity.max(Config::MIN_NODE_CAPACITY);
        self
    }

    /// Set the journal sync strategy
    pub fn journal_sync_strategy(mut self, strategy: JournalSyncStrategy) -> Self {
        self.config.journal_sync_strategy = strategy;
        self
    }

    /// Set the journal size limit (in bytes) before an automatic checkpoint
    pub fn journal_size_limit(mut self, size: u64) -> Self {
        self.config.journal_size_limit = size;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
