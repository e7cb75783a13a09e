//! Grouping of candidate files by exact size.

use itertools::Itertools;

use dupefind_core::FileRecord;

/// Candidate files sharing one exact byte size. Always at least two files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeBucket {
    /// Size shared by every file in the bucket.
    pub size: u64,
    /// Files sorted by path.
    pub files: Vec<FileRecord>,
}

impl SizeBucket {
    /// Number of unordered pairs inside the bucket.
    pub fn pair_count(&self) -> u64 {
        let k = self.files.len() as u64;
        k * k.saturating_sub(1) / 2
    }
}

/// Size buckets built from a record stream.
///
/// Sizes held by a single file are dropped immediately: a unique size can
/// never have a duplicate.
#[derive(Debug, Clone, Default)]
pub struct SizeBuckets {
    /// Buckets ordered by size, largest first.
    pub buckets: Vec<SizeBucket>,
    /// Number of records consumed, including those in dropped sizes.
    pub files_seen: u64,
}

impl SizeBuckets {
    /// Total files across the surviving buckets.
    pub fn candidate_count(&self) -> usize {
        self.buckets.iter().map(|b| b.files.len()).sum()
    }

    /// Check whether any bucket survived.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

impl FromIterator<FileRecord> for SizeBuckets {
    fn from_iter<I: IntoIterator<Item = FileRecord>>(records: I) -> Self {
        let mut files_seen = 0u64;
        let by_size = records
            .into_iter()
            .inspect(|_| files_seen += 1)
            .into_group_map_by(|record| record.size);

        let buckets = by_size
            .into_iter()
            .filter_map(|(size, mut files)| {
                files.sort_by(|a, b| a.path.cmp(&b.path));
                files.dedup_by(|a, b| a.path == b.path);
                (files.len() >= 2).then_some(SizeBucket { size, files })
            })
            .sorted_by(|a, b| b.size.cmp(&a.size))
            .collect();

        Self {
            buckets,
            files_seen,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_singletons_are_dropped() {
        let buckets: SizeBuckets = vec![
            FileRecord::new("/a", 10),
            FileRecord::new("/b", 10),
            FileRecord::new("/c", 5),
            FileRecord::new("/d", 7),
            FileRecord::new("/e", 7),
            FileRecord::new("/f", 7),
        ]
        .into_iter()
        .collect();

        assert_eq!(buckets.files_seen, 6);
        assert_eq!(buckets.buckets.len(), 2);
        assert_eq!(buckets.buckets[0].size, 10);
        assert_eq!(buckets.buckets[1].size, 7);
        assert_eq!(buckets.buckets[1].pair_count(), 3);
        assert_eq!(buckets.candidate_count(), 5);
    }

    #[test]
    fn test_files_sorted_and_deduplicated() {
        let buckets: SizeBuckets = vec![
            FileRecord::new("/z", 3),
            FileRecord::new("/a", 3),
            FileRecord::new("/z", 3),
        ]
        .into_iter()
        .collect();

        let files: Vec<_> = buckets.buckets[0]
            .files
            .iter()
            .map(|f| f.path.to_string_lossy().to_string())
            .collect();
        assert_eq!(files, vec!["/a", "/z"]);
    }

    #[test]
    fn test_repeated_path_alone_is_not_a_bucket() {
        let buckets: SizeBuckets = vec![FileRecord::new("/x", 3), FileRecord::new("/x", 3)]
            .into_iter()
            .collect();
        assert!(buckets.is_empty());
    }
}
