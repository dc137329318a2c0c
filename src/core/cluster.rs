// Transitive-closure clustering over fingerprint distance.
//
// Two records end up in the same cluster when a chain of records connects
// them with every consecutive pair within `threshold`. Members are not
// guaranteed to be pairwise within `threshold` of each other.
//
// Pairwise comparison is O(n²) and is the scalability ceiling here; the merge
// structure itself is amortized near-constant per operation.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use rayon::prelude::*;

use crate::core::fingerprint::distance;
use crate::core::record::AudioRecord;

/// Array-backed disjoint-set with union-by-rank and path compression.
#[derive(Debug, Clone)]
pub struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    pub fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
            rank: vec![0; len],
        }
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Canonical representative of `x`, compressing the path on the way.
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

    /// Merge the sets containing `a` and `b`. Returns false if already merged.
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return false;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
        true
    }

    /// Group every element by representative. Groups are sorted internally
    /// and ordered by their smallest element.
    pub fn groups(&mut self) -> Vec<Vec<usize>> {
        let mut by_root: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for i in 0..self.len() {
            let root = self.find(i);
            by_root.entry(root).or_default().push(i);
        }
        let mut groups: Vec<Vec<usize>> = by_root.into_values().collect();
        groups.sort_by_key(|g| g[0]);
        groups
    }
}

/// Partition `records` into clusters of indices whose fingerprints are
/// connected by distances of at most `threshold`.
///
/// Rows of the comparison triangle are dealt round-robin to one shard per
/// rayon worker; merges go through a single lock.
pub fn cluster(records: &[AudioRecord], threshold: u32) -> Vec<Vec<usize>> {
    let n = records.len();
    if n == 0 {
        return Vec::new();
    }

    let shards = rayon::current_num_threads().clamp(1, n);
    let set = Mutex::new(DisjointSet::new(n));

    (0..shards).into_par_iter().for_each(|shard| {
        for i in (shard..n).step_by(shards) {
            let fp = records[i].fingerprint;
            for (j, other) in records.iter().enumerate().skip(i + 1) {
                if distance(fp, other.fingerprint) <= threshold {
                    set.lock().union(i, j);
                }
            }
        }
    });

    let groups = set.into_inner().groups();
    log::debug!(
        "Clustered {} records into {} group(s) at threshold {}",
        n,
        groups.len(),
        threshold
    );
    groups
}
