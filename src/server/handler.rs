//! # Connection Handler — Protocol State Machine
//!
//! One worker owns a connection for its full lifetime; there is no
//! mid-connection handoff. On connect the menu is sent, then the loop reads
//! one newline-terminated command at a time. The only steady state is
//! awaiting-command: multi-step commands (`init` with its edge lines,
//! `add_vtx` prompts, `mst`'s algorithm choice) perform additional blocking
//! reads on the same socket inside the same handler call, so each multi-step
//! command is atomic from the protocol's perspective and holds the graph
//! lock for its entire duration.
//!
//! A slow client mid multi-step command therefore starves everyone else from
//! the graph. That is an accepted limitation of the coarse-lock design, not
//! something this module works around.

use std::collections::{BTreeMap, HashSet};
use std::fmt::Write as _;
use std::str::{FromStr, SplitWhitespace};
use std::sync::Arc;

use log::debug;
use tokio::sync::watch;

use crate::error::CommandError;
use crate::graph::{Edge, Graph};
use crate::server::connection::Connection;
use crate::server::session::SharedSession;
use crate::{metrics, mst};

const MENU: &str = "\n=== MST Server Menu ===\n\
Available commands:\n\
  init <n>                    - Replace the shared graph with n vertices;\n\
                                for n > 1, follow with 'edges <m>' and m lines of '<src> <dst> <weight>'\n\
  add_vtx                     - Add a vertex (you will be prompted for a connecting edge)\n\
  add_edge <s> <d> <w>        - Add an undirected edge\n\
  remove_edge <s> <d>         - Remove the edge between s and d\n\
  remove_vtx <v>              - Remove vertex v (higher ids shift down by one)\n\
  change_weight <s> <d> <w>   - Update the weight of an existing edge\n\
  mst                         - Compute the MST (you will be prompted for prim/kruskal)\n\
  metric <type>               - Inspect the last computed MST\n\
                                types: total_weight, longest_path, average_path, shortest_path\n\
  print_graph                 - Show the current shared graph\n\
  menu                        - Show this menu again\n\
  exit                        - Close the connection\n\
\nEnter your command: ";

/// Drive one client connection until it disconnects, sends `exit`, or the
/// server shuts down. Per-command errors are reported inline; only transport
/// errors propagate and tear the connection down.
pub async fn run(
    mut conn: Connection,
    session: Arc<SharedSession>,
    mut stop: watch::Receiver<bool>,
) -> Result<(), CommandError> {
    conn.send(MENU).await?;

    loop {
        let line = tokio::select! {
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
                continue;
            }
            line = conn.read_line() => line?,
        };
        let Some(line) = line else {
            break; // client disconnected
        };
        if line.is_empty() {
            continue;
        }

        debug!("{} -> {line}", conn.peer());
        let mut parts = line.split_whitespace();
        let verb = parts.next().unwrap_or_default();

        let result = match verb {
            "init" => handle_init(&mut conn, &session, &mut parts).await,
            "add_vtx" => handle_add_vertex(&mut conn, &session).await,
            "add_edge" => handle_add_edge(&mut conn, &session, &mut parts).await,
            "remove_edge" => handle_remove_edge(&mut conn, &session, &mut parts).await,
            "remove_vtx" => handle_remove_vertex(&mut conn, &session, &mut parts).await,
            "change_weight" => handle_change_weight(&mut conn, &session, &mut parts).await,
            "mst" => handle_mst(&mut conn, &session).await,
            "metric" => handle_metric(&mut conn, &session, &mut parts).await,
            "print_graph" => handle_print_graph(&mut conn, &session).await,
            "menu" => conn.send(MENU).await.map_err(CommandError::from),
            "exit" => {
                conn.send("Closing connection. Goodbye!\n").await?;
                break;
            }
            other => {
                conn.send(&format!("Unknown command: {other}\n")).await?;
                conn.send(MENU).await.map_err(CommandError::from)
            }
        };

        match result {
            Ok(()) => {}
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => conn.send(&format!("Error: {err}\n")).await?,
        }
    }

    Ok(())
}

/// Parse the next whitespace-separated argument, with a protocol error
/// naming the missing or malformed field.
fn parse_arg<T: FromStr>(args: &mut SplitWhitespace<'_>, what: &str) -> Result<T, CommandError> {
    let raw = args
        .next()
        .ok_or_else(|| CommandError::Protocol(format!("missing {what}")))?;
    raw.parse()
        .map_err(|_| CommandError::Protocol(format!("invalid {what}: {raw}")))
}

/// Out-of-range vertex ids are rejected here, before any mutation; the graph
/// store itself does not bounds-check.
fn check_vertex(graph: &Graph, id: usize, what: &str) -> Result<(), CommandError> {
    if id >= graph.vertex_count() {
        return Err(CommandError::Protocol(format!(
            "{what} {id} is out of range (graph has {} vertices)",
            graph.vertex_count()
        )));
    }
    Ok(())
}

async fn handle_init(
    conn: &mut Connection,
    session: &SharedSession,
    args: &mut SplitWhitespace<'_>,
) -> Result<(), CommandError> {
    let n: usize = parse_arg(args, "number of vertices")?;
    let mut state = session.try_lock()?;

    state.graph = Graph::new(n);
    debug!("initialized shared graph with {n} vertices");

    if n <= 1 {
        conn.send("No need to add edges.\n").await?;
        return Ok(());
    }

    conn.send(&format!(
        "Shared graph initialized with {n} vertices. You can now add edges.\n"
    ))
    .await?;

    // The lock stays held across these nested reads: graph construction is
    // one atomic protocol step.
    let Some(line) = conn.read_line().await? else {
        return Ok(());
    };
    let mut parts = line.split_whitespace();
    let edge_count: usize = match parts.next() {
        Some("edges") => parse_arg(&mut parts, "number of edges")?,
        _ => {
            return Err(CommandError::Protocol(
                "invalid edge command format, expected: edges <num_edges>".into(),
            ))
        }
    };

    conn.send(&format!("Ready to receive {edge_count} edges\n"))
        .await?;

    for _ in 0..edge_count {
        let Some(line) = conn.read_line().await? else {
            break;
        };
        let mut fields = line.split_whitespace();
        let parsed = (
            fields.next().and_then(|s| s.parse::<usize>().ok()),
            fields.next().and_then(|s| s.parse::<usize>().ok()),
            fields.next().and_then(|s| s.parse::<i64>().ok()),
        );
        match parsed {
            (Some(source), Some(destination), Some(weight))
                if source < n && destination < n =>
            {
                state.graph.add_edge(source, destination, weight);
                conn.send(&format!("Edge added: {source} - {destination} : {weight}\n"))
                    .await?;
            }
            (Some(_), Some(_), Some(_)) => {
                conn.send("Invalid vertex numbers. Skipping.\n").await?;
            }
            _ => {
                conn.send("Invalid edge format. Skipping.\n").await?;
            }
        }
    }

    conn.send("Graph construction complete.\n").await?;
    conn.send(&format!(
        "Current graph:\n{}",
        state.graph.to_display_string()
    ))
    .await?;
    Ok(())
}

async fn handle_add_vertex(
    conn: &mut Connection,
    session: &SharedSession,
) -> Result<(), CommandError> {
    let mut state = session.try_lock()?;

    let new_id = state.graph.add_vertex();
    conn.send(&format!("New vertex added with index {new_id}\n"))
        .await?;

    if new_id == 0 {
        // Nothing to connect the first vertex to.
        conn.send(&format!(
            "Updated graph:\n{}",
            state.graph.to_display_string()
        ))
        .await?;
        return Ok(());
    }

    conn.send(&format!(
        "Enter the index of an existing vertex to connect to (0 to {}): ",
        new_id - 1
    ))
    .await?;

    let Some(line) = conn.read_line().await? else {
        return Ok(());
    };
    match line.trim().parse::<usize>() {
        Ok(existing) if existing < new_id => {
            conn.send("Enter the weight for the edge: ").await?;
            let Some(line) = conn.read_line().await? else {
                return Ok(());
            };
            match line.trim().parse::<i64>() {
                Ok(weight) => {
                    state.graph.add_edge(new_id, existing, weight);
                    conn.send(&format!("Edge added: {new_id} - {existing} : {weight}\n"))
                        .await?;
                }
                Err(_) => {
                    conn.send("Invalid weight. No edge added.\n").await?;
                }
            }
        }
        Ok(_) => {
            conn.send("Invalid vertex index. No edge added.\n").await?;
        }
        Err(_) => {
            conn.send("Invalid input. No edge added.\n").await?;
        }
    }

    conn.send(&format!(
        "Updated graph:\n{}",
        state.graph.to_display_string()
    ))
    .await?;
    Ok(())
}

async fn handle_add_edge(
    conn: &mut Connection,
    session: &SharedSession,
    args: &mut SplitWhitespace<'_>,
) -> Result<(), CommandError> {
    let source: usize = parse_arg(args, "source vertex")?;
    let destination: usize = parse_arg(args, "destination vertex")?;
    let weight: i64 = parse_arg(args, "edge weight")?;

    let mut state = session.try_lock()?;
    check_vertex(&state.graph, source, "source vertex")?;
    check_vertex(&state.graph, destination, "destination vertex")?;

    state.graph.add_edge(source, destination, weight);
    conn.send(&format!("Edge added: {source} - {destination} : {weight}\n"))
        .await?;
    conn.send(&format!(
        "Updated graph:\n{}",
        state.graph.to_display_string()
    ))
    .await?;
    Ok(())
}

async fn handle_remove_edge(
    conn: &mut Connection,
    session: &SharedSession,
    args: &mut SplitWhitespace<'_>,
) -> Result<(), CommandError> {
    let source: usize = parse_arg(args, "source vertex")?;
    let destination: usize = parse_arg(args, "destination vertex")?;

    let mut state = session.try_lock()?;
    check_vertex(&state.graph, source, "source vertex")?;
    check_vertex(&state.graph, destination, "destination vertex")?;

    if !state.graph.remove_edge(source, destination) {
        return Err(CommandError::InvalidGraph(format!(
            "edge {source} - {destination} does not exist"
        )));
    }

    conn.send(&format!("Edge removed: {source} - {destination}\n"))
        .await?;
    conn.send(&format!(
        "Updated graph:\n{}",
        state.graph.to_display_string()
    ))
    .await?;
    Ok(())
}

async fn handle_remove_vertex(
    conn: &mut Connection,
    session: &SharedSession,
    args: &mut SplitWhitespace<'_>,
) -> Result<(), CommandError> {
    let vertex: usize = parse_arg(args, "vertex index")?;

    let mut state = session.try_lock()?;
    check_vertex(&state.graph, vertex, "vertex index")?;

    state.graph.remove_vertex(vertex);
    conn.send(&format!(
        "Vertex {vertex} and all its adjacent edges have been removed.\n"
    ))
    .await?;
    conn.send(&format!(
        "Updated graph:\n{}",
        state.graph.to_display_string()
    ))
    .await?;
    Ok(())
}

async fn handle_change_weight(
    conn: &mut Connection,
    session: &SharedSession,
    args: &mut SplitWhitespace<'_>,
) -> Result<(), CommandError> {
    let source: usize = parse_arg(args, "source vertex")?;
    let destination: usize = parse_arg(args, "destination vertex")?;
    let weight: i64 = parse_arg(args, "edge weight")?;

    let mut state = session.try_lock()?;
    check_vertex(&state.graph, source, "source vertex")?;
    check_vertex(&state.graph, destination, "destination vertex")?;

    if !state.graph.change_weight(source, destination, weight) {
        return Err(CommandError::InvalidGraph(format!(
            "edge {source} - {destination} not found"
        )));
    }

    conn.send(&format!(
        "Edge weight changed: {source} - {destination} : {weight}\n"
    ))
    .await?;
    Ok(())
}

async fn handle_mst(conn: &mut Connection, session: &SharedSession) -> Result<(), CommandError> {
    let mut state = session.try_lock()?;

    if state.graph.vertex_count() == 0 || state.graph.edge_count() == 0 {
        return Err(CommandError::InvalidGraph(
            "shared graph is empty or has no edges".into(),
        ));
    }

    conn.send("Do you want to use Prim's or Kruskal's algorithm? (prim/kruskal)\n")
        .await?;
    let Some(choice) = conn.read_line().await? else {
        return Ok(());
    };

    let algorithm = mst::create(choice.trim())?;
    let tree = algorithm.find_mst(&state.graph)?;
    state.last_mst = tree.clone();
    debug!(
        "computed MST with {} edges using {}",
        tree.len(),
        algorithm.name()
    );

    let pretty_name = match algorithm.name() {
        "prim" => "Prim's",
        _ => "Kruskal's",
    };
    let mut response = format!("MST created using {pretty_name} algorithm.\n");
    response.push_str(&render_mst_tree(&tree));
    conn.send(&response).await?;
    Ok(())
}

async fn handle_metric(
    conn: &mut Connection,
    session: &SharedSession,
    args: &mut SplitWhitespace<'_>,
) -> Result<(), CommandError> {
    let metric: String = parse_arg(args, "metric type")?;

    let state = session.try_lock()?;
    if state.last_mst.is_empty() {
        return Err(CommandError::InvalidGraph(
            "no MST calculated yet, use the 'mst' command first".into(),
        ));
    }

    let vertices = state.graph.vertex_count();
    let response = match metric.as_str() {
        "total_weight" => format!(
            "Total weight of MST: {}\n",
            metrics::total_weight(&state.last_mst)
        ),
        "longest_path" => format!(
            "Longest path in MST: {}\n",
            metrics::longest_distance(vertices, &state.last_mst)
        ),
        "average_path" => format!(
            "Average path length in MST: {:.2}\n",
            metrics::average_distance(vertices, &state.last_mst)
        ),
        "shortest_path" => format!(
            "Shortest path in MST: {}\n",
            metrics::shortest_distance(vertices, &state.last_mst)
        ),
        other => {
            return Err(CommandError::Protocol(format!(
                "unknown metric type: {other}"
            )))
        }
    };

    conn.send(&response).await?;
    Ok(())
}

async fn handle_print_graph(
    conn: &mut Connection,
    session: &SharedSession,
) -> Result<(), CommandError> {
    let state = session.try_lock()?;
    conn.send(&format!(
        "Current graph:\n{}",
        state.graph.to_display_string()
    ))
    .await?;
    Ok(())
}

/// Render the MST as an indented tree rooted at the first edge's source.
///
/// Iterative depth-first walk with an explicit stack and visited set, so
/// even a malformed edge list containing a cycle cannot recurse forever.
fn render_mst_tree(tree_edges: &[Edge]) -> String {
    let Some(first) = tree_edges.first() else {
        return String::new();
    };

    let mut children: BTreeMap<usize, Vec<(usize, i64)>> = BTreeMap::new();
    for edge in tree_edges {
        children
            .entry(edge.source)
            .or_default()
            .push((edge.destination, edge.weight));
        children
            .entry(edge.destination)
            .or_default()
            .push((edge.source, edge.weight));
    }

    let mut out = String::new();
    let mut visited: HashSet<usize> = HashSet::new();
    // (node, weight of the edge from its parent, line prefix, last sibling?)
    let mut stack: Vec<(usize, Option<i64>, String, bool)> =
        vec![(first.source, None, String::new(), true)];

    while let Some((node, via, prefix, is_last)) = stack.pop() {
        if !visited.insert(node) {
            continue;
        }

        let _ = write!(out, "{prefix}{} Node {node}", if is_last { "└─" } else { "├─" });
        if let Some(weight) = via {
            let _ = write!(out, " [weight: {weight}]");
        }
        out.push('\n');

        let child_prefix = format!("{prefix}{}", if is_last { "   " } else { "│  " });
        let next: Vec<(usize, i64)> = children
            .get(&node)
            .map(|adj| {
                adj.iter()
                    .filter(|(child, _)| !visited.contains(child))
                    .copied()
                    .collect()
            })
            .unwrap_or_default();
        // Reverse push order so the first child is visited first.
        for (index, (child, weight)) in next.iter().enumerate().rev() {
            stack.push((
                *child,
                Some(*weight),
                child_prefix.clone(),
                index == next.len() - 1,
            ));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_path_tree() {
        let tree = vec![Edge::new(0, 1, 2), Edge::new(1, 2, 3)];
        let rendered = render_mst_tree(&tree);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "└─ Node 0");
        assert_eq!(lines[1], "   └─ Node 1 [weight: 2]");
        assert_eq!(lines[2], "      └─ Node 2 [weight: 3]");
    }

    #[test]
    fn render_branching_tree_marks_last_sibling() {
        let tree = vec![Edge::new(0, 1, 1), Edge::new(0, 2, 2)];
        let rendered = render_mst_tree(&tree);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "└─ Node 0");
        assert_eq!(lines[1], "   ├─ Node 1 [weight: 1]");
        assert_eq!(lines[2], "   └─ Node 2 [weight: 2]");
    }

    #[test]
    fn render_tolerates_cycles_in_malformed_input() {
        // Not a tree; the visited set must still terminate the walk.
        let edges = vec![
            Edge::new(0, 1, 1),
            Edge::new(1, 2, 1),
            Edge::new(2, 0, 1),
        ];
        let rendered = render_mst_tree(&edges);
        assert_eq!(rendered.lines().count(), 3);
    }

    #[test]
    fn render_empty_mst_is_empty() {
        assert_eq!(render_mst_tree(&[]), "");
    }

    #[test]
    fn parse_arg_reports_missing_and_malformed() {
        let line = "add_edge 1 x";
        let mut parts = line.split_whitespace();
        parts.next();
        assert_eq!(parse_arg::<usize>(&mut parts, "source vertex").unwrap(), 1);
        assert!(matches!(
            parse_arg::<usize>(&mut parts, "destination vertex"),
            Err(CommandError::Protocol(_))
        ));
        assert!(matches!(
            parse_arg::<i64>(&mut parts, "edge weight"),
            Err(CommandError::Protocol(_))
        ));
    }

    #[test]
    fn check_vertex_rejects_out_of_range() {
        let graph = Graph::new(2);
        assert!(check_vertex(&graph, 1, "vertex").is_ok());
        assert!(check_vertex(&graph, 2, "vertex").is_err());
    }
}
