//! Scanned file records and duplicate groups.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A candidate file found by the scanner.
///
/// Only lives between the scan and the merge of one search.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileRecord {
    /// Canonical absolute path.
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
}

impl FileRecord {
    /// Create a new record.
    pub fn new(path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            path: path.into(),
            size,
        }
    }
}

/// Files judged to have identical content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// Size of each file in bytes.
    pub size: u64,

    /// Member paths, sorted. Always at least two.
    pub files: Vec<PathBuf>,
}

impl DuplicateGroup {
    /// Get the number of duplicate files.
    pub fn count(&self) -> usize {
        self.files.len()
    }

    /// How many files could be removed while keeping one copy.
    pub fn deletable_count(&self) -> usize {
        self.files.len().saturating_sub(1)
    }

    /// Bytes reclaimable by keeping a single copy.
    pub fn wasted_bytes(&self) -> u64 {
        self.size * self.deletable_count() as u64
    }
}
