//! Insert flags
//!
//! `OVERWRITE` replaces an existing record; `DUPLICATE` (or
//! [`InsertFlags::duplicate_at`]) adds another record under an existing
//! key. Without either flag, inserting an existing key fails.

use crate::error::{HoardError, Result};

/// Where a duplicate goes relative to the existing chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePosition {
    /// Before every existing duplicate
    First,
    /// After every existing duplicate
    #[default]
    Last,
    /// Before the duplicate the issuing cursor points at
    Before,
    /// After the duplicate the issuing cursor points at
    After,
}

/// Flags for insert operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InsertFlags {
    overwrite: bool,
    duplicate: Option<DuplicatePosition>,
}

impl InsertFlags {
    /// Plain insert: the key must not exist yet
    pub const NONE: Self = Self {
        overwrite: false,
        duplicate: None,
    };

    /// Replace the record if the key exists
    pub const OVERWRITE: Self = Self {
        overwrite: true,
        duplicate: None,
    };

    /// Append a duplicate if the key exists
    pub const DUPLICATE: Self = Self {
        overwrite: false,
        duplicate: Some(DuplicatePosition::Last),
    };

    /// Add a duplicate at the given position
    pub const fn duplicate_at(position: DuplicatePosition) -> Self {
        Self {
            overwrite: false,
            duplicate: Some(position),
        }
    }

    pub fn is_overwrite(&self) -> bool {
        self.overwrite
    }

    pub fn duplicate(&self) -> Option<DuplicatePosition> {
        self.duplicate
    }

    /// Add the overwrite flag
    pub fn with_overwrite(mut self) -> Self {
        self.overwrite = true;
        self
    }

    /// Reject combinations the store cannot honour
    pub fn validate(&self, duplicates_enabled: bool) -> Result<()> {
        if self.overwrite && self.duplicate.is_some() {
            return Err(HoardError::InvalidArgument(
                "overwrite and duplicate flags are mutually exclusive".to_string(),
            ));
        }
        if self.duplicate.is_some() && !duplicates_enabled {
            return Err(HoardError::InvalidArgument(
                "duplicate flag on a store without duplicate keys".to_string(),
            ));
        }
        Ok(())
    }
}
