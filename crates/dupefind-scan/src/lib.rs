//! Directory scanning for dupefind.
//!
//! This crate walks the configured roots and yields one [`FileRecord`] per
//! candidate file. The walk is lazy, iterative and single-threaded:
//!
//! - **Exclusion** of directories by canonical path prefix, pruned before
//!   the directory is opened
//! - **Depth policy** (unlimited, top level only, or a maximum depth)
//! - **Size and name-mask filtering** of regular files
//! - **Progress updates** via a broadcast channel
//! - **Cooperative cancellation** through a [`CancellationToken`]
//!
//! Per-entry failures never stop the walk; they are collected as
//! [`ScanWarning`]s on the record iterator.
//!
//! # Example
//!
//! ```rust,no_run
//! use dupefind_scan::{ScanConfig, Scanner};
//!
//! let config = ScanConfig::new("/path/to/scan");
//! let scanner = Scanner::new();
//! let mut records = scanner.scan(&config);
//!
//! for record in records.by_ref() {
//!     println!("{} ({} bytes)", record.path.display(), record.size);
//! }
//! println!("{} warning(s)", records.warnings().len());
//! ```

mod filter;
mod progress;
mod scanner;

pub use filter::{ExclusionSet, NameMask};
pub use progress::ScanProgress;
pub use scanner::{FileRecords, Scanner};

// Re-export core types for convenience
pub use dupefind_core::{DepthPolicy, FileRecord, ScanConfig, ScanError, ScanWarning, WarningKind};
pub use tokio_util::sync::CancellationToken;
