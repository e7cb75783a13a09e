//! Lazy, iterative directory scanner built on jwalk.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use jwalk::{DirEntry, Parallelism, WalkDir};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use dupefind_core::{DepthPolicy, FileRecord, ScanConfig, ScanWarning, WarningKind};

use crate::filter::{ExclusionSet, NameMask};
use crate::progress::{ProgressTracker, ScanProgress};

/// Number of accepted files between progress snapshots.
const PROGRESS_INTERVAL: u64 = 256;

type EntryIter = Box<dyn Iterator<Item = Result<DirEntry<((), ())>, jwalk::Error>>>;

/// Walks scan roots and produces candidate file records.
pub struct Scanner {
    progress_tx: broadcast::Sender<ScanProgress>,
    cancel: CancellationToken,
}

impl Scanner {
    /// Create a new scanner.
    pub fn new() -> Self {
        Self::with_cancellation(CancellationToken::new())
    }

    /// Create a scanner that stops once `cancel` is triggered.
    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        let (progress_tx, _) = broadcast::channel(100);
        Self {
            progress_tx,
            cancel,
        }
    }

    /// Subscribe to scan progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.progress_tx.subscribe()
    }

    /// Token that cancels scans started by this scanner.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Start scanning. Nothing is read until the returned iterator is polled.
    pub fn scan(&self, config: &ScanConfig) -> FileRecords {
        let (exclusions, warnings) = ExclusionSet::new(&config.exclude);
        FileRecords {
            roots: config.roots.iter().cloned().collect(),
            depth: config.depth,
            min_size: config.min_size,
            mask: NameMask::new(&config.masks, config.case_insensitive),
            exclusions: Arc::new(exclusions),
            current: None,
            seen: HashSet::new(),
            warnings: Arc::new(Mutex::new(warnings)),
            tracker: ProgressTracker::new(),
            progress_tx: self.progress_tx.clone(),
            cancel: self.cancel.clone(),
            cancelled: false,
            done: false,
        }
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}

/// The walk of one scan root.
struct RootWalk {
    canonical: PathBuf,
    entries: EntryIter,
}

/// Finite, non-restartable sequence of candidate files.
///
/// Every yielded record is a regular file of at least `min_size` bytes whose
/// name matches a mask and whose canonical path is outside every excluded
/// directory. A file reachable from several roots is yielded once.
pub struct FileRecords {
    roots: VecDeque<PathBuf>,
    depth: DepthPolicy,
    min_size: u64,
    mask: NameMask,
    exclusions: Arc<ExclusionSet>,
    current: Option<RootWalk>,
    seen: HashSet<PathBuf>,
    warnings: Arc<Mutex<Vec<ScanWarning>>>,
    tracker: ProgressTracker,
    progress_tx: broadcast::Sender<ScanProgress>,
    cancel: CancellationToken,
    cancelled: bool,
    done: bool,
}

impl FileRecords {
    /// Warnings collected so far.
    pub fn warnings(&self) -> Vec<ScanWarning> {
        self.warnings
            .lock()
            .map(|w| w.clone())
            .unwrap_or_default()
    }

    /// Take the collected warnings, leaving none behind.
    pub fn take_warnings(&mut self) -> Vec<ScanWarning> {
        self.warnings
            .lock()
            .map(|mut w| std::mem::take(&mut *w))
            .unwrap_or_default()
    }

    /// Whether the scan stopped because of cancellation.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    fn warn(&self, warning: ScanWarning) {
        tracing::debug!(path = %warning.path.display(), kind = ?warning.kind, "{}", warning.message);
        if let Ok(mut warnings) = self.warnings.lock() {
            warnings.push(warning);
        }
    }

    fn warning_count(&self) -> usize {
        self.warnings.lock().map(|w| w.len()).unwrap_or(0)
    }

    fn publish(&mut self, finished: bool) {
        self.tracker.set_errors(self.warning_count());
        let _ = self.progress_tx.send(self.tracker.snapshot(finished));
    }

    fn finish(&mut self) {
        if !self.done {
            self.done = true;
            self.current = None;
            self.publish(true);
        }
    }

    /// Open the next usable root. Returns `false` once no roots remain.
    fn start_next_root(&mut self) -> bool {
        while let Some(root) = self.roots.pop_front() {
            let canonical = match root.canonicalize() {
                Ok(path) => path,
                Err(err) => {
                    self.warn(ScanWarning::from_io(&root, &err, WarningKind::CanonicalizeError));
                    continue;
                }
            };

            if !canonical.is_dir() {
                self.warn(ScanWarning::not_a_directory(&root));
                continue;
            }

            if self.exclusions.is_excluded(&canonical) {
                tracing::debug!(root = %canonical.display(), "root is excluded");
                continue;
            }

            tracing::debug!(root = %canonical.display(), depth = ?self.depth, "scanning root");
            let entries = self.walk(&canonical);
            self.current = Some(RootWalk { canonical, entries });
            return true;
        }
        false
    }

    fn walk(&self, root: &Path) -> EntryIter {
        let exclusions = Arc::clone(&self.exclusions);
        let warnings = Arc::clone(&self.warnings);

        let walker = WalkDir::new(root)
            .parallelism(Parallelism::Serial)
            .sort(true)
            .skip_hidden(false)
            .follow_links(false)
            .min_depth(0)
            .max_depth(self.depth.max_entry_depth())
            .process_read_dir(move |_depth, _parent, _state, children| {
                // Prune excluded directories before they are read.
                for child in children.iter_mut().flatten() {
                    if !child.file_type.is_dir() {
                        continue;
                    }
                    let path = child.path();
                    match path.canonicalize() {
                        Ok(canonical) if exclusions.is_excluded(&canonical) => {
                            tracing::debug!(path = %path.display(), "skipping excluded directory");
                            child.read_children_path = None;
                        }
                        Ok(_) => {}
                        Err(err) => {
                            child.read_children_path = None;
                            if let Ok(mut warnings) = warnings.lock() {
                                warnings.push(ScanWarning::from_io(
                                    &path,
                                    &err,
                                    WarningKind::CanonicalizeError,
                                ));
                            }
                        }
                    }
                }
            });

        Box::new(walker.into_iter())
    }

    /// Apply the file filters to one walked entry.
    fn accept(&mut self, entry: DirEntry<((), ())>, root: &Path) -> Option<FileRecord> {
        let file_type = entry.file_type();
        let path = entry.path();

        if file_type.is_dir() {
            self.tracker.record_dir();
            return None;
        }
        if file_type.is_symlink() {
            if std::fs::metadata(&path).is_err() {
                self.warn(ScanWarning::broken_symlink(&path));
            }
            return None;
        }
        if !file_type.is_file() {
            return None;
        }

        if !self.mask.matches(&entry.file_name) {
            return None;
        }

        let size = match std::fs::metadata(&path) {
            Ok(metadata) => metadata.len(),
            Err(err) => {
                self.warn(ScanWarning::from_io(&path, &err, WarningKind::MetadataError));
                return None;
            }
        };
        if size < self.min_size {
            return None;
        }

        let canonical = match path.canonicalize() {
            Ok(canonical) => canonical,
            Err(err) => {
                self.warn(ScanWarning::from_io(&path, &err, WarningKind::CanonicalizeError));
                return None;
            }
        };
        if self.exclusions.is_excluded(&canonical) {
            return None;
        }
        if self.depth == DepthPolicy::TopLevelOnly && canonical.parent() != Some(root) {
            return None;
        }
        if !self.seen.insert(canonical.clone()) {
            return None;
        }

        self.tracker.record_file(&canonical, size);
        if self.tracker.files_scanned() % PROGRESS_INTERVAL == 0 {
            self.publish(false);
        }

        Some(FileRecord::new(canonical, size))
    }
}

impl Iterator for FileRecords {
    type Item = FileRecord;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            if self.cancel.is_cancelled() {
                tracing::debug!("scan cancelled");
                self.cancelled = true;
                self.finish();
                return None;
            }

            let Some(walk) = self.current.as_mut() else {
                if self.start_next_root() {
                    continue;
                }
                self.finish();
                return None;
            };

            let root = walk.canonical.clone();
            match walk.entries.next() {
                None => self.current = None,
                Some(Err(err)) => {
                    let path = err.path().map(Path::to_path_buf).unwrap_or_default();
                    let warning = match err.io_error() {
                        Some(io) => ScanWarning::from_io(path, io, WarningKind::ReadError),
                        None => ScanWarning::new(path, err.to_string(), WarningKind::ReadError),
                    };
                    self.warn(warning);
                }
                Some(Ok(entry)) => {
                    if let Some(record) = self.accept(entry, &root) {
                        return Some(record);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_tree() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();

        fs::create_dir(root.join("dir1")).unwrap();
        fs::create_dir(root.join("dir2")).unwrap();
        fs::create_dir(root.join("dir1/subdir")).unwrap();

        fs::write(root.join("file1.txt"), "hello").unwrap();
        fs::write(root.join("dir1/file2.txt"), "world world world").unwrap();
        fs::write(root.join("dir1/subdir/file3.txt"), "test").unwrap();
        fs::write(root.join("dir2/file4.log"), "another file here").unwrap();
        fs::write(root.join("empty.txt"), "").unwrap();

        temp
    }

    fn names(records: &[FileRecord]) -> Vec<String> {
        let mut names: Vec<String> = records
            .iter()
            .map(|r| r.path.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_basic_scan() {
        let temp = create_test_tree();
        let config = ScanConfig::new(temp.path());

        let records: Vec<_> = Scanner::new().scan(&config).collect();

        // empty.txt falls below the default minimum size of 1
        assert_eq!(
            names(&records),
            vec!["file1.txt", "file2.txt", "file3.txt", "file4.log"]
        );
        for record in &records {
            assert!(record.path.is_absolute());
            assert_eq!(record.size, fs::metadata(&record.path).unwrap().len());
        }
    }

    #[test]
    fn test_depth_policies() {
        let temp = create_test_tree();

        let mut config = ScanConfig::new(temp.path());
        config.depth = DepthPolicy::TopLevelOnly;
        let records: Vec<_> = Scanner::new().scan(&config).collect();
        assert_eq!(names(&records), vec!["file1.txt"]);

        config.depth = DepthPolicy::MaxDepth(1);
        let records: Vec<_> = Scanner::new().scan(&config).collect();
        assert_eq!(names(&records), vec!["file1.txt", "file2.txt", "file4.log"]);

        config.depth = DepthPolicy::MaxDepth(2);
        let records: Vec<_> = Scanner::new().scan(&config).collect();
        assert_eq!(records.len(), 4);
    }

    #[test]
    fn test_masks_and_min_size() {
        let temp = create_test_tree();

        let mut config = ScanConfig::new(temp.path());
        config.masks = vec!["*.log".to_string()];
        let records: Vec<_> = Scanner::new().scan(&config).collect();
        assert_eq!(names(&records), vec!["file4.log"]);

        let mut config = ScanConfig::new(temp.path());
        config.min_size = 6;
        let records: Vec<_> = Scanner::new().scan(&config).collect();
        assert_eq!(names(&records), vec!["file2.txt", "file4.log"]);

        let mut config = ScanConfig::new(temp.path());
        config.min_size = 0;
        let records: Vec<_> = Scanner::new().scan(&config).collect();
        assert_eq!(records.len(), 5);
    }

    #[test]
    fn test_exclusion() {
        let temp = create_test_tree();
        let mut config = ScanConfig::new(temp.path());
        config.exclude = vec![temp.path().join("dir1")];

        let records: Vec<_> = Scanner::new().scan(&config).collect();
        assert_eq!(names(&records), vec!["file1.txt", "file4.log"]);
    }

    #[test]
    fn test_overlapping_roots_yield_once() {
        let temp = create_test_tree();
        let mut config = ScanConfig::new(temp.path());
        config.roots.push(temp.path().join("dir1"));

        let records: Vec<_> = Scanner::new().scan(&config).collect();
        assert_eq!(records.len(), 4);
    }

    #[test]
    fn test_missing_root_is_a_warning() {
        let temp = create_test_tree();
        let mut config = ScanConfig::new(temp.path().join("nope"));
        config.roots.push(temp.path().to_path_buf());

        let mut records = Scanner::new().scan(&config);
        let found: Vec<_> = records.by_ref().collect();

        assert_eq!(found.len(), 4);
        let warnings = records.warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::NotFound);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_not_followed() {
        let temp = create_test_tree();
        let root = temp.path();
        std::os::unix::fs::symlink(root.join("file1.txt"), root.join("link.txt")).unwrap();
        std::os::unix::fs::symlink(root.join("dir1"), root.join("dirlink")).unwrap();
        std::os::unix::fs::symlink(root.join("gone"), root.join("broken")).unwrap();

        let mut records = Scanner::new().scan(&ScanConfig::new(root));
        let found: Vec<_> = records.by_ref().collect();

        assert_eq!(found.len(), 4);
        let warnings = records.warnings();
        assert!(warnings.iter().any(|w| w.kind == WarningKind::BrokenSymlink));
    }

    #[test]
    fn test_cancelled_scan_yields_nothing() {
        let temp = create_test_tree();
        let scanner = Scanner::new();
        scanner.cancellation_token().cancel();

        let mut records = scanner.scan(&ScanConfig::new(temp.path()));
        assert!(records.next().is_none());
        assert!(records.is_cancelled());
    }

    #[test]
    fn test_final_progress_is_published() {
        let temp = create_test_tree();
        let scanner = Scanner::new();
        let mut rx = scanner.subscribe();

        let count = scanner.scan(&ScanConfig::new(temp.path())).count();

        let mut last = None;
        while let Ok(progress) = rx.try_recv() {
            last = Some(progress);
        }
        let last = last.unwrap();
        assert!(last.finished);
        assert_eq!(last.files_scanned, count as u64);
    }
}
