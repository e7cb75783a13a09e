//! Array-backed disjoint-set forest.

/// Disjoint sets over the dense indices `0..len`.
///
/// Union by rank with path compression; `find` is amortized near-constant.
#[derive(Debug, Clone, Default)]
pub struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    /// Create `len` singleton sets.
    pub fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
            rank: vec![0; len],
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.parent.len()
    }

    /// Check if the forest has no elements.
    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Representative of the set containing `x`.
    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }

        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }

        root
    }

    /// Merge the sets containing `a` and `b`. Returns `false` if they were
    /// already one set.
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a == root_b {
            return false;
        }

        match self.rank[root_a].cmp(&self.rank[root_b]) {
            std::cmp::Ordering::Less => self.parent[root_a] = root_b,
            std::cmp::Ordering::Greater => self.parent[root_b] = root_a,
            std::cmp::Ordering::Equal => {
                self.parent[root_b] = root_a;
                self.rank[root_a] = self.rank[root_a].saturating_add(1);
            }
        }
        true
    }

    /// Check whether `a` and `b` are in the same set.
    pub fn same_set(&mut self, a: usize, b: usize) -> bool {
        self.find(a) == self.find(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_singletons() {
        let mut sets = DisjointSet::new(3);
        assert_eq!(sets.len(), 3);
        for i in 0..3 {
            assert_eq!(sets.find(i), i);
        }
        assert!(!sets.same_set(0, 1));
    }

    #[test]
    fn test_transitivity() {
        let mut sets = DisjointSet::new(5);
        assert!(sets.union(0, 1));
        assert!(sets.union(1, 2));
        assert!(sets.same_set(0, 2));
        assert!(!sets.union(2, 0));
        assert!(!sets.same_set(0, 3));

        sets.union(3, 4);
        sets.union(4, 0);
        let root = sets.find(0);
        assert!((0..5).all(|i| sets.find(i) == root));
    }

    #[test]
    fn test_find_is_idempotent() {
        let mut sets = DisjointSet::new(100);
        for i in 1..100 {
            sets.union(i - 1, i);
        }
        let first = sets.find(99);
        assert_eq!(sets.find(99), first);
        assert_eq!(sets.find(first), first);
    }

    #[test]
    fn test_empty() {
        let sets = DisjointSet::new(0);
        assert!(sets.is_empty());
    }
}
