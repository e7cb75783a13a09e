//! Duplicate detection for dupefind.
//!
//! Finds groups of files with identical content under one or more roots.
//! The pipeline runs in five stages:
//!
//! 1. Scan the roots into candidate records (`dupefind-scan`)
//! 2. Bucket records by exact size, dropping sizes held by a single file
//! 3. Compare files within each bucket by streaming them through a digest
//!    (crc32, md5 or blake3), optionally confirming matches byte for byte
//! 4. Union equal files in a disjoint-set forest, so equality is transitive
//! 5. Emit every class of two or more files as a sorted [`DuplicateGroup`]
//!
//! ```rust,no_run
//! use dupefind_analyze::{DuplicateFinder, ScanConfig};
//!
//! let config = ScanConfig::builder()
//!     .roots(vec!["/path/to/scan".into()])
//!     .masks(vec!["*.jpg".to_string()])
//!     .build()
//!     .unwrap();
//!
//! let report = DuplicateFinder::new().find_duplicates(&config).unwrap();
//! for group in &report.groups {
//!     println!("{} bytes:", group.size);
//!     for path in &group.files {
//!         println!("  {}", path.display());
//!     }
//! }
//! ```
//!
//! # Digest choice
//!
//! `crc32` is the default and the fastest, but two different files of equal
//! size can share a CRC. Use `md5` or `blake3`, or set `verify_bytes`, when a
//! false match is unacceptable.

mod assemble;
mod bucket;
mod compare;
mod digest;
mod finder;
mod merge;
mod union_find;

pub use assemble::assemble_groups;
pub use bucket::{SizeBucket, SizeBuckets};
pub use compare::{ContentComparator, ReadError};
pub use digest::{Fingerprint, StreamDigest, fingerprint_file, fingerprint_reader};
pub use finder::{DuplicateFinder, DuplicateReport};
pub use merge::{Classes, EquivalenceMerger, HashProgress};
pub use union_find::DisjointSet;

// Re-export core types
pub use dupefind_core::{
    CompareStrategy, DepthPolicy, DigestAlgorithm, DuplicateGroup, FileRecord, ScanConfig,
    ScanError, ScanWarning, WarningKind,
};
pub use dupefind_scan::{CancellationToken, ScanProgress};
