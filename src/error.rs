//! Error types for hoardkv
//!
//! Provides a unified error type for all operations, plus a coarse
//! [`ErrorKind`] classification that bindings map onto their own codes.

use thiserror::Error;

/// Result type alias using HoardError
pub type Result<T> = std::result::Result<T, HoardError>;

/// Unified error type for hoardkv operations
#[derive(Debug, Error)]
pub enum HoardError {
    // -------------------------------------------------------------------------
    // Lookup Errors (NotFound)
    // -------------------------------------------------------------------------
    #[error("Key not found")]
    KeyNotFound,

    #[error("Cursor is not positioned")]
    CursorNotPositioned,

    #[error("Duplicate position {position} out of range (chain holds {count} records)")]
    DuplicateOutOfRange { position: usize, count: usize },

    // -------------------------------------------------------------------------
    // Insert Errors (AlreadyExists)
    // -------------------------------------------------------------------------
    #[error("Key already exists")]
    KeyExists,

    // -------------------------------------------------------------------------
    // Caller Errors
    // -------------------------------------------------------------------------
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The comparator does not define a total order over the stored keys.
    /// Only the integrity check reports this; ordinary operations assume
    /// a well-behaved comparator.
    #[error("Comparator precondition violated: {0}")]
    Precondition(String),

    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Journal Errors
    // -------------------------------------------------------------------------
    #[error("Journal corruption detected: {0}")]
    JournalCorruption(String),

    #[error("Journal write failed: {0}")]
    JournalWrite(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing key, exhausted traversal, unpositioned cursor, bad duplicate index
    NotFound,
    /// Insert collided with existing data
    AlreadyExists,
    /// Malformed flags or positions
    InvalidArgument,
    /// Comparator is not a valid total order
    Precondition,
    /// Underlying file I/O failed
    Io,
    /// Persisted data failed validation
    Corruption,
    /// Store configuration mismatch
    Config,
}

impl HoardError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            HoardError::KeyNotFound
            | HoardError::CursorNotPositioned
            | HoardError::DuplicateOutOfRange { .. } => ErrorKind::NotFound,
            HoardError::KeyExists => ErrorKind::AlreadyExists,
            HoardError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            HoardError::Precondition(_) => ErrorKind::Precondition,
            HoardError::Io(_) | HoardError::JournalWrite(_) => ErrorKind::Io,
            HoardError::JournalCorruption(_)
            | HoardError::Storage(_)
            | HoardError::Serialization(_) => ErrorKind::Corruption,
            HoardError::Config(_) => ErrorKind::Config,
        }
    }

    /// True for every NotFound-class error
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}
