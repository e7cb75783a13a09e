//! Merging content-equal files into equivalence classes.

use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::path::PathBuf;

use rayon::prelude::*;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use dupefind_core::{CompareStrategy, FileRecord, ScanError, ScanWarning};

use crate::bucket::SizeBucket;
use crate::compare::{ContentComparator, ReadError};
use crate::digest::Fingerprint;
use crate::union_find::DisjointSet;

/// Progress information during content comparison.
#[derive(Debug, Clone)]
pub struct HashProgress {
    /// Size buckets finished so far.
    pub buckets_done: usize,
    /// Total size buckets to process.
    pub buckets_total: usize,
    /// Content comparisons performed so far.
    pub comparisons: u64,
    /// Files digested so far.
    pub files_hashed: u64,
    /// Last file of the bucket just finished.
    pub current_file: Option<PathBuf>,
}

/// Files and the classes they were merged into.
///
/// Index `i` of the disjoint-set forest is `records[i]`; every record of one
/// size bucket occupies a contiguous range.
#[derive(Debug)]
pub struct Classes {
    pub records: Vec<FileRecord>,
    pub sets: DisjointSet,
    pub comparisons: u64,
    pub files_hashed: u64,
    pub warnings: Vec<ScanWarning>,
}

/// Runs the comparator over each size bucket and unions equal files.
pub struct EquivalenceMerger<'a> {
    comparator: ContentComparator,
    strategy: CompareStrategy,
    cancel: &'a CancellationToken,
    progress_tx: Option<&'a broadcast::Sender<HashProgress>>,
}

/// Mutable state of one merge run.
struct MergeState {
    records: Vec<FileRecord>,
    sets: DisjointSet,
    comparisons: u64,
    files_hashed: u64,
    warnings: Vec<ScanWarning>,
    failed: HashSet<PathBuf>,
}

impl MergeState {
    fn record_failure(&mut self, err: ReadError) {
        tracing::debug!(path = %err.path.display(), error = %err.source, "comparison read failed");
        if self.failed.insert(err.path.clone()) {
            self.warnings.push(ScanWarning::read_error(&err.path, &err.source));
        }
    }
}

impl<'a> EquivalenceMerger<'a> {
    /// Create a merger.
    pub fn new(
        comparator: ContentComparator,
        strategy: CompareStrategy,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            comparator,
            strategy,
            cancel,
            progress_tx: None,
        }
    }

    /// Publish [`HashProgress`] after each bucket.
    pub fn with_progress(mut self, progress_tx: &'a broadcast::Sender<HashProgress>) -> Self {
        self.progress_tx = Some(progress_tx);
        self
    }

    /// Compare within every bucket and merge equal files.
    ///
    /// Records from different buckets are never compared, so a class never
    /// mixes sizes. Fails only when cancelled.
    pub fn merge(&self, buckets: Vec<SizeBucket>) -> Result<Classes, ScanError> {
        let buckets_total = buckets.len();
        let mut ranges = Vec::with_capacity(buckets_total);
        let mut records = Vec::new();
        for bucket in buckets {
            let start = records.len();
            records.extend(bucket.files);
            ranges.push(start..records.len());
        }

        let mut state = MergeState {
            sets: DisjointSet::new(records.len()),
            records,
            comparisons: 0,
            files_hashed: 0,
            warnings: Vec::new(),
            failed: HashSet::new(),
        };

        for (done, range) in ranges.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(ScanError::Interrupted);
            }

            match self.strategy {
                CompareStrategy::Pairwise => self.merge_pairwise(&mut state, range.clone())?,
                CompareStrategy::DigestOnce => self.merge_by_digest(&mut state, range.clone())?,
            }

            if let Some(tx) = self.progress_tx {
                let _ = tx.send(HashProgress {
                    buckets_done: done + 1,
                    buckets_total,
                    comparisons: state.comparisons,
                    files_hashed: state.files_hashed,
                    current_file: range
                        .end
                        .checked_sub(1)
                        .and_then(|last| state.records.get(last))
                        .map(|r| r.path.clone()),
                });
            }
        }

        Ok(Classes {
            records: state.records,
            sets: state.sets,
            comparisons: state.comparisons,
            files_hashed: state.files_hashed,
            warnings: state.warnings,
        })
    }

    /// Compare every pair in the bucket, skipping pairs already unified.
    fn merge_pairwise(&self, state: &mut MergeState, range: Range<usize>) -> Result<(), ScanError> {
        for i in range.clone() {
            for j in (i + 1)..range.end {
                if self.cancel.is_cancelled() {
                    return Err(ScanError::Interrupted);
                }
                if state.sets.same_set(i, j) {
                    continue;
                }

                state.comparisons += 1;
                state.files_hashed += 2;
                match self
                    .comparator
                    .compare(&state.records[i].path, &state.records[j].path)
                {
                    Ok(true) => {
                        state.sets.union(i, j);
                    }
                    Ok(false) => {}
                    Err(err) => state.record_failure(err),
                }
            }
        }
        Ok(())
    }

    /// Digest each file once, then unify files with equal digests.
    fn merge_by_digest(&self, state: &mut MergeState, range: Range<usize>) -> Result<(), ScanError> {
        let cancel = self.cancel;
        let comparator = &self.comparator;
        let digests: Vec<Option<Result<Fingerprint, ReadError>>> = state.records[range.clone()]
            .par_iter()
            .map(|record| (!cancel.is_cancelled()).then(|| comparator.fingerprint(&record.path)))
            .collect();

        if self.cancel.is_cancelled() {
            return Err(ScanError::Interrupted);
        }

        let mut by_digest: HashMap<Fingerprint, Vec<usize>> = HashMap::new();
        for (index, digest) in range.zip(digests) {
            state.files_hashed += 1;
            match digest {
                Some(Ok(fingerprint)) => by_digest.entry(fingerprint).or_default().push(index),
                Some(Err(err)) => state.record_failure(err),
                None => return Err(ScanError::Interrupted),
            }
        }

        for members in by_digest.into_values().filter(|m| m.len() >= 2) {
            if !self.comparator.verifies_bytes() {
                state.comparisons += members.len() as u64 - 1;
                for &member in &members[1..] {
                    state.sets.union(members[0], member);
                }
                continue;
            }

            // Each member joins the first representative whose bytes match.
            let mut representatives: Vec<usize> = vec![members[0]];
            for &member in &members[1..] {
                let mut joined = false;
                for &rep in &representatives {
                    if self.cancel.is_cancelled() {
                        return Err(ScanError::Interrupted);
                    }
                    state.comparisons += 1;
                    match self
                        .comparator
                        .bytes_equal(&state.records[rep].path, &state.records[member].path)
                    {
                        Ok(true) => {
                            state.sets.union(rep, member);
                            joined = true;
                            break;
                        }
                        Ok(false) => {}
                        Err(err) => state.record_failure(err),
                    }
                }
                if !joined {
                    representatives.push(member);
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dupefind_core::{DigestAlgorithm, WarningKind};
    use std::fs;
    use tempfile::TempDir;

    fn bucket(root: &std::path::Path, files: &[(&str, &str)]) -> SizeBucket {
        let mut records = Vec::new();
        for (name, content) in files {
            let path = root.join(name);
            fs::write(&path, content).unwrap();
            records.push(FileRecord::new(path, content.len() as u64));
        }
        SizeBucket {
            size: records[0].size,
            files: records,
        }
    }

    fn merge(strategy: CompareStrategy, buckets: Vec<SizeBucket>) -> Classes {
        merge_with(ContentComparator::new(3, DigestAlgorithm::Md5), strategy, buckets)
    }

    fn merge_with(
        comparator: ContentComparator,
        strategy: CompareStrategy,
        buckets: Vec<SizeBucket>,
    ) -> Classes {
        let cancel = CancellationToken::new();
        EquivalenceMerger::new(comparator, strategy, &cancel)
            .merge(buckets)
            .unwrap()
    }

    #[test]
    fn test_pairwise_skips_unified_pairs() {
        let temp = TempDir::new().unwrap();
        let b = bucket(temp.path(), &[("a", "same"), ("b", "same"), ("c", "same")]);

        let mut classes = merge(CompareStrategy::Pairwise, vec![b]);
        // (a,b) and (a,c) unify everything, so (b,c) is never compared
        assert_eq!(classes.comparisons, 2);
        assert!(classes.sets.same_set(0, 1));
        assert!(classes.sets.same_set(1, 2));
    }

    #[test]
    fn test_strategies_agree() {
        let temp = TempDir::new().unwrap();
        let files = [("a", "1111"), ("b", "2222"), ("c", "1111"), ("d", "2222"), ("e", "3333")];

        let mut pairwise = merge(CompareStrategy::Pairwise, vec![bucket(temp.path(), &files)]);
        let mut by_digest = merge(CompareStrategy::DigestOnce, vec![bucket(temp.path(), &files)]);

        for i in 0..files.len() {
            for j in 0..files.len() {
                assert_eq!(
                    pairwise.sets.same_set(i, j),
                    by_digest.sets.same_set(i, j),
                    "pair ({i}, {j})"
                );
            }
        }
        assert!(pairwise.sets.same_set(0, 2));
        assert!(pairwise.sets.same_set(1, 3));
        assert!(!pairwise.sets.same_set(0, 1));
        assert!(!pairwise.sets.same_set(4, 0));
    }

    #[test]
    fn test_read_failure_is_warned_once() {
        for strategy in [CompareStrategy::Pairwise, CompareStrategy::DigestOnce] {
            let temp = TempDir::new().unwrap();
            let mut b = bucket(temp.path(), &[("a", "xy"), ("b", "xy"), ("c", "xy")]);
            b.files.push(FileRecord::new(temp.path().join("vanished"), 2));

            let mut classes = merge(strategy, vec![b]);
            assert_eq!(classes.warnings.len(), 1, "{strategy}");
            assert_eq!(classes.warnings[0].kind, WarningKind::ReadError, "{strategy}");
            assert_eq!(classes.warnings[0].path, temp.path().join("vanished"));
            assert!(classes.sets.same_set(0, 1), "{strategy}");
            assert!(classes.sets.same_set(0, 2), "{strategy}");
            assert!(!classes.sets.same_set(0, 3), "{strategy}");
        }
    }

    #[test]
    fn test_digest_once_verified_joins_first_match() {
        let temp = TempDir::new().unwrap();
        let b = bucket(temp.path(), &[("a", "same"), ("b", "same"), ("c", "same")]);
        let comparator = ContentComparator::new(2, DigestAlgorithm::Blake3).with_verify(true);

        let mut classes = merge_with(comparator, CompareStrategy::DigestOnce, vec![b]);
        assert!(classes.sets.same_set(0, 1));
        assert!(classes.sets.same_set(0, 2));
        // b and c are each checked once against a
        assert_eq!(classes.comparisons, 2);
        assert_eq!(classes.files_hashed, 3);
        assert!(classes.warnings.is_empty());
    }

    #[test]
    fn test_verify_rejects_crc_collision() {
        // "plumless" and "buckeroo" share a CRC-32
        let temp = TempDir::new().unwrap();
        let files = [("p", "plumless"), ("q", "buckeroo")];
        let comparator = ContentComparator::new(1024, DigestAlgorithm::Crc32);
        let b = bucket(temp.path(), &files);
        assert_eq!(
            comparator.fingerprint(&b.files[0].path).unwrap(),
            comparator.fingerprint(&b.files[1].path).unwrap()
        );

        let mut unverified = merge_with(comparator, CompareStrategy::DigestOnce, vec![b]);
        assert!(unverified.sets.same_set(0, 1));

        for strategy in [CompareStrategy::Pairwise, CompareStrategy::DigestOnce] {
            let mut verified = merge_with(
                comparator.with_verify(true),
                strategy,
                vec![bucket(temp.path(), &files)],
            );
            assert!(!verified.sets.same_set(0, 1), "{strategy}");
            assert!(verified.warnings.is_empty(), "{strategy}");
        }
    }

    #[test]
    fn test_cancelled_merge() {
        let temp = TempDir::new().unwrap();
        let b = bucket(temp.path(), &[("a", "xy"), ("b", "xy")]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let comparator = ContentComparator::new(1024, DigestAlgorithm::Crc32);
        let result = EquivalenceMerger::new(comparator, CompareStrategy::Pairwise, &cancel).merge(vec![b]);
        assert!(matches!(result, Err(ScanError::Interrupted)));
    }

    #[test]
    fn test_progress_per_bucket() {
        let temp = TempDir::new().unwrap();
        let first = bucket(temp.path(), &[("a", "xy"), ("b", "xy")]);
        let second = bucket(temp.path(), &[("c", "xyz"), ("d", "xyz")]);
        let cancel = CancellationToken::new();
        let (tx, mut rx) = broadcast::channel(16);

        let comparator = ContentComparator::new(1024, DigestAlgorithm::Crc32);
        EquivalenceMerger::new(comparator, CompareStrategy::Pairwise, &cancel)
            .with_progress(&tx)
            .merge(vec![first, second])
            .unwrap();

        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        assert_eq!(first.buckets_done, 1);
        assert_eq!(first.current_file, Some(temp.path().join("b")));
        assert_eq!(second.current_file, Some(temp.path().join("d")));
        assert_eq!(second.buckets_done, 2);
        assert_eq!(second.buckets_total, 2);
        assert_eq!(second.comparisons, 2);
    }
}
