//! Turning equivalence classes into duplicate groups.

use std::collections::HashMap;

use dupefind_core::DuplicateGroup;

use crate::merge::Classes;

/// Collect every class with at least two members into a [`DuplicateGroup`].
///
/// Paths are sorted inside each group and groups are sorted by their first
/// path, so the output is reproducible for an unchanged filesystem.
pub fn assemble_groups(classes: &mut Classes) -> Vec<DuplicateGroup> {
    let mut members: HashMap<usize, Vec<usize>> = HashMap::new();
    for index in 0..classes.records.len() {
        let root = classes.sets.find(index);
        members.entry(root).or_default().push(index);
    }

    let mut groups: Vec<DuplicateGroup> = members
        .into_values()
        .filter(|indices| indices.len() >= 2)
        .map(|indices| {
            let size = classes.records[indices[0]].size;
            debug_assert!(indices.iter().all(|&i| classes.records[i].size == size));

            let mut files: Vec<_> = indices
                .into_iter()
                .map(|i| classes.records[i].path.clone())
                .collect();
            files.sort();
            DuplicateGroup { size, files }
        })
        .collect();

    groups.sort_by(|a, b| a.files[0].cmp(&b.files[0]));
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::union_find::DisjointSet;
    use dupefind_core::FileRecord;
    use std::path::PathBuf;

    fn classes(records: Vec<FileRecord>, unions: &[(usize, usize)]) -> Classes {
        let mut sets = DisjointSet::new(records.len());
        for &(a, b) in unions {
            sets.union(a, b);
        }
        Classes {
            records,
            sets,
            comparisons: 0,
            files_hashed: 0,
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_singletons_are_discarded() {
        let mut classes = classes(
            vec![
                FileRecord::new("/b", 4),
                FileRecord::new("/a", 4),
                FileRecord::new("/c", 4),
            ],
            &[(0, 1)],
        );

        let groups = assemble_groups(&mut classes);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].size, 4);
        assert_eq!(groups[0].files, vec![PathBuf::from("/a"), PathBuf::from("/b")]);
    }

    #[test]
    fn test_groups_are_ordered() {
        let mut classes = classes(
            vec![
                FileRecord::new("/z1", 9),
                FileRecord::new("/z2", 9),
                FileRecord::new("/m2", 3),
                FileRecord::new("/m1", 3),
                FileRecord::new("/m3", 3),
            ],
            &[(0, 1), (2, 3), (3, 4)],
        );

        let groups = assemble_groups(&mut classes);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].files[0], PathBuf::from("/m1"));
        assert_eq!(groups[0].count(), 3);
        assert_eq!(groups[1].files[0], PathBuf::from("/z1"));
    }

    #[test]
    fn test_no_classes() {
        let mut classes = classes(Vec::new(), &[]);
        assert!(assemble_groups(&mut classes).is_empty());
    }
}
