//! # MST Engine
//!
//! Minimum-spanning-tree construction over a [`Graph`] snapshot, polymorphic
//! over the two classic strategies:
//!
//! - [`Prim`]: priority-queue relaxation starting at vertex 0,
//!   O((V+E) log V). On a disconnected graph it returns only vertex 0's
//!   component's spanning subtree (fewer than V-1 edges); the metrics engine
//!   tolerates that.
//! - [`Kruskal`]: stable sort of every half-edge ascending by weight, then
//!   union-find with path compression, stopping at V-1 accepted edges. The
//!   duplicate half of each undirected edge is harmless: the union rejects
//!   the second occurrence as a cycle.
//!
//! Both require at least 2 vertices. Tie-break order is unspecified when
//! multiple minimal trees exist, but total weight is always equal.

use crate::error::MstError;
use crate::graph::{Edge, Graph};

use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// A spanning-tree construction strategy.
pub trait MstAlgorithm: Send + Sync + std::fmt::Debug {
    /// Human-readable algorithm name, as accepted by [`create`].
    fn name(&self) -> &'static str;

    /// Compute an ordered edge sequence forming one spanning tree of `graph`.
    fn find_mst(&self, graph: &Graph) -> Result<Vec<Edge>, MstError>;
}

/// Select an algorithm by case-insensitive name (`"prim"` or `"kruskal"`).
pub fn create(name: &str) -> Result<Box<dyn MstAlgorithm>, MstError> {
    match name.to_ascii_lowercase().as_str() {
        "prim" => Ok(Box::new(Prim)),
        "kruskal" => Ok(Box::new(Kruskal)),
        other => Err(MstError::UnknownAlgorithm(other.to_string())),
    }
}

#[derive(Debug)]
pub struct Prim;

impl MstAlgorithm for Prim {
    fn name(&self) -> &'static str {
        "prim"
    }

    fn find_mst(&self, graph: &Graph) -> Result<Vec<Edge>, MstError> {
        let n = graph.vertex_count();
        if n < 2 {
            return Err(MstError::TooFewVertices);
        }

        let mut mst = Vec::with_capacity(n - 1);
        let mut visited = vec![false; n];
        let mut key = vec![i64::MAX; n];
        let mut parent = vec![usize::MAX; n];
        let mut heap = BinaryHeap::new();

        key[0] = 0;
        heap.push(Reverse((0i64, 0usize)));

        while let Some(Reverse((_, u))) = heap.pop() {
            if visited[u] {
                continue;
            }
            visited[u] = true;

            if parent[u] != usize::MAX {
                mst.push(Edge::new(parent[u], u, key[u]));
            }

            for edge in graph.adjacent_edges(u) {
                let v = edge.destination;
                if !visited[v] && edge.weight < key[v] {
                    parent[v] = u;
                    key[v] = edge.weight;
                    heap.push(Reverse((edge.weight, v)));
                }
            }
        }

        Ok(mst)
    }
}

#[derive(Debug)]
pub struct Kruskal;

impl MstAlgorithm for Kruskal {
    fn name(&self) -> &'static str {
        "kruskal"
    }

    fn find_mst(&self, graph: &Graph) -> Result<Vec<Edge>, MstError> {
        let n = graph.vertex_count();
        if n < 2 {
            return Err(MstError::TooFewVertices);
        }

        let mut edges: Vec<Edge> = (0..n)
            .flat_map(|v| graph.adjacent_edges(v).iter().copied())
            .collect();
        // Stable sort keeps insertion order among equal weights.
        edges.sort_by_key(|e| e.weight);

        let mut dsu = DisjointSet::new(n);
        let mut mst = Vec::with_capacity(n - 1);

        for edge in edges {
            if dsu.union(edge.source, edge.destination) {
                mst.push(edge);
                if mst.len() == n - 1 {
                    break;
                }
            }
        }

        Ok(mst)
    }
}

/// Union-find with path compression and union by rank.
struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            let root = self.find(self.parent[x]);
            self.parent[x] = root;
        }
        self.parent[x]
    }

    /// Merge the sets of `x` and `y`; `false` when already joined (a cycle).
    fn union(&mut self, x: usize, y: usize) -> bool {
        let rx = self.find(x);
        let ry = self.find(y);
        if rx == ry {
            return false;
        }
        match self.rank[rx].cmp(&self.rank[ry]) {
            std::cmp::Ordering::Less => self.parent[rx] = ry,
            std::cmp::Ordering::Greater => self.parent[ry] = rx,
            std::cmp::Ordering::Equal => {
                self.parent[ry] = rx;
                self.rank[rx] += 1;
            }
        }
        true
    }
}
