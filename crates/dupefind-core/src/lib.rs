//! Core types for dupefind.
//!
//! This crate holds the data shared by the scanning and analysis crates:
//! the immutable scan configuration, the transient file records produced by
//! the scanner, the duplicate groups handed back to callers, and the error
//! and warning types.

mod config;
mod error;
mod record;

pub use config::{CompareStrategy, DepthPolicy, DigestAlgorithm, ScanConfig, ScanConfigBuilder};
pub use error::{ScanError, ScanWarning, WarningKind};
pub use record::{DuplicateGroup, FileRecord};
