//! # Cluster Module
//!
//! Merges pairwise duplicate edges into transitive groups.
//!
//! If A matches B and B matches C, then {A, B, C} forms a single group
//! even if A doesn't directly match C. Merging never re-checks distances.
//!
//! One [`UnionFind`] is built per bucket; edges never cross buckets, so
//! buckets can be clustered independently without sharing state.

use crate::core::comparator::DuplicateEdge;
use crate::core::metadata::ImageRecord;
use std::collections::BTreeMap;

/// Disjoint sets with union by rank and path compression
#[derive(Debug, Clone)]
pub struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    /// `n` singleton sets, `0..n`
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Representative of the set containing `x`
    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }

        // Point every node on the way straight at the root
        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }

        root
    }

    /// Merge the sets containing `a` and `b`; false if already merged
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
                self.rank[root_a] += 1;
            }
        }
        true
    }

    /// Sets of two or more members, each sorted ascending, ordered by smallest member
    pub fn sets(&mut self) -> Vec<Vec<usize>> {
        let mut by_root: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for x in 0..self.len() {
            let root = self.find(x);
            by_root.entry(root).or_default().push(x);
        }

        let mut sets: Vec<Vec<usize>> = by_root
            .into_values()
            .filter(|members| members.len() >= 2)
            .collect();
        sets.sort_by_key(|members| members[0]);
        sets
    }
}

/// A transitive cluster before quality scoring
#[derive(Debug, Clone)]
pub struct Cluster<'a> {
    /// Members sorted by path
    pub members: Vec<&'a ImageRecord>,
    /// Edges inside the cluster
    pub edge_count: usize,
    /// Mean fingerprint distance over those edges
    pub average_distance: f64,
}

/// Builds clusters for one bucket from its confirmed edges
pub struct ClusterBuilder;

impl ClusterBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Group bucket members connected by `edges`; singletons are dropped
    pub fn build<'a>(&self, members: &[&'a ImageRecord], edges: &[DuplicateEdge]) -> Vec<Cluster<'a>> {
        if edges.is_empty() {
            return Vec::new();
        }

        let mut sets = UnionFind::new(members.len());
        for edge in edges {
            sets.union(edge.a, edge.b);
        }

        // Per-root distance totals
        let mut distances: BTreeMap<usize, (usize, u64)> = BTreeMap::new();
        for edge in edges {
            let root = sets.find(edge.a);
            let entry = distances.entry(root).or_insert((0, 0));
            entry.0 += 1;
            entry.1 += edge.distance as u64;
        }

        sets.sets()
            .into_iter()
            .map(|indices| {
                let root = sets.find(indices[0]);
                let (edge_count, total_distance) = distances.get(&root).copied().unwrap_or((0, 0));

                let mut cluster_members: Vec<&'a ImageRecord> =
                    indices.into_iter().map(|i| members[i]).collect();
                cluster_members.sort_by(|a, b| a.path.cmp(&b.path));

                Cluster {
                    members: cluster_members,
                    edge_count,
                    average_distance: if edge_count > 0 {
                        total_distance as f64 / edge_count as f64
                    } else {
                        0.0
                    },
                }
            })
            .collect()
    }
}

impl Default for ClusterBuilder {
    fn default() -> Self {
        Self::new()
    }
}
