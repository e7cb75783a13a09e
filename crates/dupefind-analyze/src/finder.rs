//! End-to-end duplicate search.
//!
//! Data flows strictly scanner → size buckets → comparator → disjoint sets →
//! groups. The whole search runs on the caller's thread; callers wanting a
//! responsive UI run it on a worker and cancel through the token.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use dupefind_core::{DuplicateGroup, ScanConfig, ScanError, ScanWarning};
use dupefind_scan::{ScanProgress, Scanner};

use crate::assemble::assemble_groups;
use crate::bucket::SizeBuckets;
use crate::compare::ContentComparator;
use crate::merge::{EquivalenceMerger, HashProgress};

/// Results of one duplicate search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateReport {
    /// Duplicate groups, sorted by first path.
    pub groups: Vec<DuplicateGroup>,

    /// Candidate files produced by the scanner.
    pub files_scanned: u64,

    /// Files that shared their size with another file and were compared.
    pub files_compared: u64,

    /// Content comparisons performed.
    pub comparisons: u64,

    /// Total wasted space (could be reclaimed).
    pub total_wasted_space: u64,

    /// Number of duplicate groups.
    pub group_count: usize,

    /// Entries skipped because of non-fatal errors.
    pub warnings: Vec<ScanWarning>,
}

impl DuplicateReport {
    /// Check if any duplicates were found.
    pub fn has_duplicates(&self) -> bool {
        !self.groups.is_empty()
    }

    /// Whether some entries were skipped, making the result partial.
    pub fn is_partial(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Get total number of duplicate files across all groups.
    pub fn total_duplicate_files(&self) -> usize {
        self.groups.iter().map(|g| g.files.len()).sum()
    }
}

/// Duplicate file finder.
///
/// Each call to [`find_duplicates`](Self::find_duplicates) owns its own
/// disjoint-set instance, so one finder may serve many searches.
pub struct DuplicateFinder {
    scanner: Scanner,
    progress_tx: broadcast::Sender<HashProgress>,
    cancel: CancellationToken,
}

impl DuplicateFinder {
    /// Create a new duplicate finder.
    pub fn new() -> Self {
        Self::with_cancellation(CancellationToken::new())
    }

    /// Create a finder whose searches stop once `cancel` is triggered.
    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        let (progress_tx, _) = broadcast::channel(100);
        Self {
            scanner: Scanner::with_cancellation(cancel.clone()),
            progress_tx,
            cancel,
        }
    }

    /// Subscribe to scanning progress.
    pub fn subscribe_scan(&self) -> broadcast::Receiver<ScanProgress> {
        self.scanner.subscribe()
    }

    /// Subscribe to comparison progress.
    pub fn subscribe(&self) -> broadcast::Receiver<HashProgress> {
        self.progress_tx.subscribe()
    }

    /// Token that cancels searches run by this finder.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Find duplicate files under the configured roots.
    ///
    /// Unreadable entries are skipped and listed in the report's warnings.
    /// The only error is [`ScanError::Interrupted`].
    pub fn find_duplicates(&self, config: &ScanConfig) -> Result<DuplicateReport, ScanError> {
        let mut records = self.scanner.scan(config);
        let buckets: SizeBuckets = records.by_ref().collect();
        if records.is_cancelled() {
            return Err(ScanError::Interrupted);
        }
        let mut warnings = records.take_warnings();

        let files_scanned = buckets.files_seen;
        let files_compared = buckets.candidate_count() as u64;
        tracing::info!(
            files_scanned,
            files_compared,
            buckets = buckets.buckets.len(),
            "scan complete"
        );

        let comparator = ContentComparator::from_config(config);
        let mut classes = EquivalenceMerger::new(comparator, config.strategy, &self.cancel)
            .with_progress(&self.progress_tx)
            .merge(buckets.buckets)?;
        warnings.append(&mut classes.warnings);

        let groups = assemble_groups(&mut classes);
        let total_wasted_space = groups.iter().map(DuplicateGroup::wasted_bytes).sum();
        let group_count = groups.len();
        tracing::info!(
            groups = group_count,
            comparisons = classes.comparisons,
            warnings = warnings.len(),
            "duplicate search complete"
        );

        Ok(DuplicateReport {
            groups,
            files_scanned,
            files_compared,
            comparisons: classes.comparisons,
            total_wasted_space,
            group_count,
            warnings,
        })
    }
}

impl Default for DuplicateFinder {
    fn default() -> Self {
        Self::new()
    }
}
