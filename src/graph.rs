//! # Graph Store
//!
//! In-memory undirected weighted graph shared by all client connections.
//!
//! Vertex ids are always the contiguous range `0..vertex_count()`; removing a
//! vertex renumbers every higher id down by one. Each undirected edge is
//! stored as two symmetric half-edges, one in each endpoint's adjacency list,
//! and both halves always carry the same weight.
//!
//! Bounds-checking of vertex ids for the mutating operations is the caller's
//! responsibility (the connection handler validates every client-supplied
//! index before touching the store).

/// One half of an undirected edge, stored in `source`'s adjacency list.
/// The mirror half lives in `destination`'s list with the same weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub source: usize,
    pub destination: usize,
    pub weight: i64,
}

impl Edge {
    pub fn new(source: usize, destination: usize, weight: i64) -> Self {
        Self {
            source,
            destination,
            weight,
        }
    }
}

/// Undirected weighted graph with contiguous vertex ids.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    /// Adjacency lists indexed by vertex id; edges kept in insertion order.
    adjacency: Vec<Vec<Edge>>,
}

impl Graph {
    /// Create a graph with `vertices` isolated vertices (ids `0..vertices`).
    pub fn new(vertices: usize) -> Self {
        Self {
            adjacency: vec![Vec::new(); vertices],
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Number of undirected edges (half-edge total divided by two).
    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum::<usize>() / 2
    }

    /// Append a new vertex and return its id.
    pub fn add_vertex(&mut self) -> usize {
        self.adjacency.push(Vec::new());
        self.adjacency.len() - 1
    }

    /// Add an undirected edge as two symmetric half-edges. No deduplication:
    /// parallel edges between the same endpoints are allowed.
    pub fn add_edge(&mut self, source: usize, destination: usize, weight: i64) {
        self.adjacency[source].push(Edge::new(source, destination, weight));
        self.adjacency[destination].push(Edge::new(destination, source, weight));
    }

    /// Remove every half-edge between `source` and `destination`, in both
    /// directions. Returns whether anything was removed.
    pub fn remove_edge(&mut self, source: usize, destination: usize) -> bool {
        let before = self.adjacency[source].len() + self.adjacency[destination].len();
        self.adjacency[source].retain(|e| e.destination != destination);
        self.adjacency[destination].retain(|e| e.destination != source);
        let after = self.adjacency[source].len() + self.adjacency[destination].len();
        before != after
    }

    /// Remove vertex `vertex` together with all edges touching it, then
    /// compact ids: every id greater than `vertex` decrements by one, in both
    /// list positions and half-edge destinations. O(V+E). Returns `false`
    /// (without mutating) when the id does not exist.
    ///
    /// Any externally cached vertex ids are invalidated by a successful call.
    pub fn remove_vertex(&mut self, vertex: usize) -> bool {
        if vertex >= self.adjacency.len() {
            return false;
        }

        self.adjacency.remove(vertex);
        for (id, edges) in self.adjacency.iter_mut().enumerate() {
            edges.retain(|e| e.destination != vertex);
            for edge in edges.iter_mut() {
                edge.source = id;
                if edge.destination > vertex {
                    edge.destination -= 1;
                }
            }
        }
        true
    }

    /// Set the weight of the edge between `source` and `destination` in both
    /// directions. Returns `false` when the edge is missing in either list.
    /// With parallel edges present, only the first matching pair is updated.
    pub fn change_weight(&mut self, source: usize, destination: usize, weight: i64) -> bool {
        let forward = self.adjacency[source]
            .iter()
            .position(|e| e.destination == destination);
        let backward = self.adjacency[destination]
            .iter()
            .position(|e| e.destination == source);

        match (forward, backward) {
            (Some(f), Some(b)) => {
                self.adjacency[source][f].weight = weight;
                self.adjacency[destination][b].weight = weight;
                true
            }
            _ => false,
        }
    }

    /// Half-edges leaving `vertex`, in insertion order.
    pub fn adjacent_edges(&self, vertex: usize) -> &[Edge] {
        &self.adjacency[vertex]
    }

    /// Deterministic textual dump: vertices in ascending id order, edges in
    /// insertion order.
    pub fn to_display_string(&self) -> String {
        use std::fmt::Write;

        let mut out = String::new();
        let _ = writeln!(
            out,
            "Graph with {} vertices and {} edges.",
            self.vertex_count(),
            self.edge_count()
        );
        for (id, edges) in self.adjacency.iter().enumerate() {
            let _ = writeln!(out, "Vertex {id}:");
            if edges.is_empty() {
                out.push_str("  (no edges)\n");
            } else {
                for edge in edges {
                    let _ = writeln!(out, "  -> {} (weight: {})", edge.destination, edge.weight);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path_graph() -> Graph {
        let mut g = Graph::new(3);
        g.add_edge(0, 1, 2);
        g.add_edge(1, 2, 3);
        g
    }

    #[test]
    fn init_replaces_rather_than_merges() {
        let mut g = path_graph();
        g = Graph::new(2);
        assert_eq!(g.vertex_count(), 2);
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn add_vertex_appends_contiguous_ids() {
        let mut g = Graph::new(0);
        assert_eq!(g.add_vertex(), 0);
        assert_eq!(g.add_vertex(), 1);
        assert_eq!(g.add_vertex(), 2);
        assert_eq!(g.vertex_count(), 3);
    }

    #[test]
    fn edges_are_symmetric_half_edges() {
        let g = path_graph();
        assert_eq!(g.edge_count(), 2);
        assert_eq!(g.adjacent_edges(0), &[Edge::new(0, 1, 2)]);
        assert_eq!(
            g.adjacent_edges(1),
            &[Edge::new(1, 0, 2), Edge::new(1, 2, 3)]
        );
    }

    #[test]
    fn parallel_edges_are_kept() {
        let mut g = Graph::new(2);
        g.add_edge(0, 1, 1);
        g.add_edge(0, 1, 9);
        assert_eq!(g.edge_count(), 2);
    }

    #[test]
    fn remove_edge_strips_both_directions() {
        let mut g = path_graph();
        assert!(g.remove_edge(1, 0));
        assert_eq!(g.edge_count(), 1);
        assert!(g.adjacent_edges(0).is_empty());
        assert!(!g.remove_edge(1, 0));
    }

    #[test]
    fn remove_vertex_renumbers_higher_ids() {
        let mut g = Graph::new(4);
        g.add_edge(0, 1, 1);
        g.add_edge(1, 2, 2);
        g.add_edge(2, 3, 3);

        assert!(g.remove_vertex(1));
        assert_eq!(g.vertex_count(), 3);
        // Former vertices 2 and 3 are now 1 and 2; only their edge survives.
        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.adjacent_edges(1), &[Edge::new(1, 2, 3)]);
        assert_eq!(g.adjacent_edges(2), &[Edge::new(2, 1, 3)]);
        assert!(g.adjacent_edges(0).is_empty());
    }

    #[test]
    fn remove_missing_vertex_mutates_nothing() {
        let mut g = path_graph();
        assert!(!g.remove_vertex(7));
        assert_eq!(g.vertex_count(), 3);
        assert_eq!(g.edge_count(), 2);
    }

    #[test]
    fn vertex_ids_stay_contiguous_under_churn() {
        let mut g = Graph::new(5);
        g.remove_vertex(2);
        g.add_vertex();
        g.remove_vertex(0);
        assert_eq!(g.vertex_count(), 4);
        for v in 0..g.vertex_count() {
            // Indexing by every id below the count must be valid.
            assert!(g.adjacent_edges(v).is_empty());
        }
    }

    #[test]
    fn change_weight_updates_both_halves() {
        let mut g = path_graph();
        assert!(g.change_weight(0, 1, 42));
        assert_eq!(g.adjacent_edges(0)[0].weight, 42);
        assert_eq!(g.adjacent_edges(1)[0].weight, 42);
    }

    #[test]
    fn change_weight_on_missing_edge_fails() {
        let mut g = path_graph();
        assert!(!g.change_weight(0, 2, 42));
        assert_eq!(g.adjacent_edges(0)[0].weight, 2);
    }

    #[test]
    fn display_is_deterministic() {
        let g = path_graph();
        let dump = g.to_display_string();
        assert_eq!(dump, g.to_display_string());
        assert!(dump.starts_with("Graph with 3 vertices and 2 edges."));
        assert!(dump.contains("Vertex 0:\n  -> 1 (weight: 2)"));
        assert!(dump.contains("Vertex 2:\n  -> 1 (weight: 3)"));
    }
}
