use std::collections::{HashSet, VecDeque};

use petgraph::Direction;
use petgraph::stable_graph::NodeIndex;

use crate::config::LimitsConfig;
use crate::graph::GraphStore;
use crate::graph::edge::EdgeKind;
use crate::rank::RankedNode;

/// The induced neighborhood of an entry set.
#[derive(Debug)]
pub struct SubgraphResult {
    /// Qualified names, sorted.
    pub nodes: Vec<String>,
    /// Induced edges between the returned nodes, deterministically ordered.
    pub edges: Vec<(String, String, EdgeKind)>,
    /// The depth actually used (may be lower than requested after
    /// degradation).
    pub depth_used: usize,
    /// Entry names that do not exist in the graph.
    pub missing_entries: Vec<String>,
}

/// Outcome of a focus query: either a bounded subgraph or a structured
/// too-large condition (never a crash).
#[derive(Debug)]
pub enum FocusOutcome {
    Subgraph(SubgraphResult),
    /// Even depth 0 (the entry set itself) exceeds the ceiling.
    TooLarge { node_count: usize, ceiling: usize },
}

/// Automatic fallback proposal when the whole graph is too large to render
/// usefully: focus on the engine's own top-ranked entry point.
#[derive(Debug, serde::Serialize)]
pub struct DegradationPlan {
    pub entry: String,
    pub depth: usize,
    pub graph_nodes: usize,
    pub ceiling: usize,
}

/// Bounded-depth bidirectional neighborhood of the given entry nodes.
///
/// Traverses outgoing and incoming edges up to `depth` hops and returns the
/// induced subgraph. When the result exceeds `max_nodes` the depth is
/// decremented and the traversal retried; at depth 0 the too-large condition
/// is reported instead of an oversized result.
pub fn focus(
    graph: &GraphStore,
    entries: &[String],
    depth: usize,
    max_nodes: usize,
) -> FocusOutcome {
    let mut entry_indices: Vec<NodeIndex> = Vec::new();
    let mut missing_entries: Vec<String> = Vec::new();
    for entry in entries {
        match graph.index_of(entry) {
            Some(idx) => entry_indices.push(idx),
            None => missing_entries.push(entry.clone()),
        }
    }

    let mut attempt = depth;
    loop {
        let visited = bidirectional_bfs(graph, &entry_indices, attempt);
        if visited.len() <= max_nodes {
            if attempt < depth {
                tracing::warn!(
                    "focus degraded from depth {depth} to {attempt} to satisfy the {max_nodes}-node ceiling"
                );
            }
            return FocusOutcome::Subgraph(induced(graph, &visited, attempt, missing_entries));
        }
        if attempt == 0 {
            return FocusOutcome::TooLarge {
                node_count: visited.len(),
                ceiling: max_nodes,
            };
        }
        attempt -= 1;
    }
}

/// Smart degradation: when the full graph exceeds the render ceiling,
/// propose focus mode seeded with the top-ranked entry point.
pub fn degradation_plan(
    graph: &GraphStore,
    ranking: &[RankedNode],
    limits: &LimitsConfig,
) -> Option<DegradationPlan> {
    if graph.node_count() <= limits.max_render_nodes {
        return None;
    }
    let top = ranking.first()?;
    Some(DegradationPlan {
        entry: top.qualified_name.clone(),
        depth: limits.focus_depth,
        graph_nodes: graph.node_count(),
        ceiling: limits.max_render_nodes,
    })
}

/// Breadth-first traversal following edges in both directions up to `depth`.
fn bidirectional_bfs(graph: &GraphStore, entries: &[NodeIndex], depth: usize) -> HashSet<NodeIndex> {
    let mut visited: HashSet<NodeIndex> = entries.iter().copied().collect();
    let mut queue: VecDeque<(NodeIndex, usize)> = entries.iter().map(|&idx| (idx, 0)).collect();

    while let Some((current, dist)) = queue.pop_front() {
        if dist == depth {
            continue;
        }
        for direction in [Direction::Outgoing, Direction::Incoming] {
            for neighbor in graph.graph.neighbors_directed(current, direction) {
                if visited.insert(neighbor) {
                    queue.push_back((neighbor, dist + 1));
                }
            }
        }
    }

    visited
}

/// The subgraph induced by a visited set: its nodes plus every edge whose
/// endpoints are both inside it.
fn induced(
    graph: &GraphStore,
    visited: &HashSet<NodeIndex>,
    depth_used: usize,
    missing_entries: Vec<String>,
) -> SubgraphResult {
    let mut nodes: Vec<String> = visited
        .iter()
        .map(|&idx| graph.node(idx).qualified_name.clone())
        .collect();
    nodes.sort();

    let keep: HashSet<&str> = nodes.iter().map(String::as_str).collect();
    let edges = graph
        .sorted_edges()
        .into_iter()
        .filter(|(s, t, _)| keep.contains(s.as_str()) && keep.contains(t.as_str()))
        .collect();

    SubgraphResult {
        nodes,
        edges,
        depth_used,
        missing_entries,
    }
}
