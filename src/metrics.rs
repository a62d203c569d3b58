//! # MST Metrics
//!
//! Path statistics over the most recently computed MST. These are pure
//! functions of the MST edge list, not of the raw graph: a tree has exactly
//! one path between any two vertices, so "distance" here means path length
//! along the tree, not single-edge weight.
//!
//! The distance metrics build a VxV matrix seeded from the direct MST edges
//! and run Floyd–Warshall all-pairs shortest path (O(V^3), unreachable pairs
//! stay `None`), then reduce the upper triangle over finite pairs only. A
//! partial MST from a disconnected graph simply leaves more pairs infinite.

use crate::graph::Edge;

/// Sum of the MST edge weights.
pub fn total_weight(mst: &[Edge]) -> i64 {
    mst.iter().map(|e| e.weight).sum()
}

/// Longest tree-path distance between any vertex pair, 0 if no finite pair.
pub fn longest_distance(vertex_count: usize, mst: &[Edge]) -> i64 {
    reduce_finite_pairs(vertex_count, mst, 0, i64::max)
}

/// Shortest tree-path distance between any vertex pair, 0 if no finite pair.
pub fn shortest_distance(vertex_count: usize, mst: &[Edge]) -> i64 {
    let shortest = reduce_finite_pairs(vertex_count, mst, i64::MAX, i64::min);
    if shortest == i64::MAX {
        0
    } else {
        shortest
    }
}

/// Mean tree-path distance over all finite vertex pairs, 0.0 if none.
pub fn average_distance(vertex_count: usize, mst: &[Edge]) -> f64 {
    let dist = floyd_warshall(vertex_count, mst);
    let mut sum = 0.0;
    let mut pairs = 0u64;
    for i in 0..dist.len() {
        for j in (i + 1)..dist.len() {
            if let Some(d) = dist[i][j] {
                sum += d as f64;
                pairs += 1;
            }
        }
    }
    if pairs == 0 {
        0.0
    } else {
        sum / pairs as f64
    }
}

fn reduce_finite_pairs(
    vertex_count: usize,
    mst: &[Edge],
    init: i64,
    combine: fn(i64, i64) -> i64,
) -> i64 {
    let dist = floyd_warshall(vertex_count, mst);
    let mut acc = init;
    for i in 0..dist.len() {
        for j in (i + 1)..dist.len() {
            if let Some(d) = dist[i][j] {
                acc = combine(acc, d);
            }
        }
    }
    acc
}

/// All-pairs shortest paths over the tree edges; `None` means unreachable.
///
/// The matrix is sized to cover every vertex id appearing in the MST even if
/// the graph shrank after the MST was computed (a stale MST stays usable for
/// metrics until the next `mst` run).
fn floyd_warshall(vertex_count: usize, mst: &[Edge]) -> Vec<Vec<Option<i64>>> {
    let dim = mst
        .iter()
        .map(|e| e.source.max(e.destination) + 1)
        .max()
        .unwrap_or(0)
        .max(vertex_count);

    let mut dist = vec![vec![None; dim]; dim];
    for (v, row) in dist.iter_mut().enumerate() {
        row[v] = Some(0);
    }
    for edge in mst {
        dist[edge.source][edge.destination] = Some(edge.weight);
        dist[edge.destination][edge.source] = Some(edge.weight);
    }

    for k in 0..dim {
        for i in 0..dim {
            let Some(ik) = dist[i][k] else { continue };
            for j in 0..dim {
                if let Some(kj) = dist[k][j] {
                    let through = ik + kj;
                    if dist[i][j].map_or(true, |d| through < d) {
                        dist[i][j] = Some(through);
                    }
                }
            }
        }
    }
    dist
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path_mst() -> Vec<Edge> {
        // 0 -2- 1 -3- 2
        vec![Edge::new(0, 1, 2), Edge::new(1, 2, 3)]
    }

    #[test]
    fn total_weight_sums_edges() {
        assert_eq!(total_weight(&path_mst()), 5);
        assert_eq!(total_weight(&[]), 0);
    }

    #[test]
    fn three_vertex_path_statistics() {
        let mst = path_mst();
        assert_eq!(shortest_distance(3, &mst), 2);
        assert_eq!(longest_distance(3, &mst), 5);
        let avg = average_distance(3, &mst);
        // Pairs: (0,1)=2, (1,2)=3, (0,2)=5 -> mean 10/3.
        assert!((avg - 10.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn empty_mst_reports_zeroes() {
        assert_eq!(longest_distance(4, &[]), 0);
        assert_eq!(shortest_distance(4, &[]), 0);
        assert_eq!(average_distance(4, &[]), 0.0);
    }

    #[test]
    fn unreachable_pairs_are_ignored() {
        // Spanning forest of two components: 0-1 and 2-3.
        let forest = vec![Edge::new(0, 1, 4), Edge::new(2, 3, 6)];
        assert_eq!(shortest_distance(4, &forest), 4);
        assert_eq!(longest_distance(4, &forest), 6);
        assert!((average_distance(4, &forest) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn stale_mst_survives_graph_shrink() {
        // MST mentions vertex 2 but the graph now has 2 vertices only.
        let mst = path_mst();
        assert_eq!(longest_distance(2, &mst), 5);
        assert_eq!(total_weight(&mst), 5);
    }
}
