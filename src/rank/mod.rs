pub mod subgraph;

use std::collections::HashMap;

use petgraph::Direction;
use petgraph::stable_graph::NodeIndex;
use petgraph::visit::EdgeRef;
use regex::Regex;

use crate::config::RankingConfig;
use crate::graph::GraphStore;

/// A recommendation candidate: centrality score plus raw out-degree.
/// Derived from one graph snapshot, never persisted independently of it.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RankedNode {
    pub qualified_name: String,
    pub score: f64,
    pub out_degree: usize,
}

/// Compute "best entry point" recommendations.
///
/// PageRank-style centrality (damping, epsilon, and iteration cap from the
/// configuration) combined with raw out-degree as a tiebreaker; remaining
/// ties break by qualified-name lexical order for full determinism.
///
/// Nodes flagged external, private-by-convention, or matching a configured
/// test-path pattern are excluded from candidacy but remain in the graph.
pub fn recommend(graph: &GraphStore, config: &RankingConfig) -> Vec<RankedNode> {
    let scores = pagerank(graph, config);

    let test_filters: Vec<Regex> = config
        .test_patterns
        .iter()
        .filter_map(|p| match Regex::new(p) {
            Ok(re) => Some(re),
            Err(err) => {
                tracing::warn!("invalid test pattern `{p}`: {err}");
                None
            }
        })
        .collect();

    let mut ranked: Vec<RankedNode> = graph
        .sorted_nodes()
        .into_iter()
        .filter(|&idx| {
            let node = graph.node(idx);
            if node.is_external {
                return false;
            }
            if config.exclude_private && !node.is_public {
                return false;
            }
            !test_filters.iter().any(|re| re.is_match(&node.qualified_name))
        })
        .map(|idx| RankedNode {
            qualified_name: graph.node(idx).qualified_name.clone(),
            score: scores.get(&idx).copied().unwrap_or(0.0),
            out_degree: graph
                .graph
                .edges_directed(idx, Direction::Outgoing)
                .count(),
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| b.out_degree.cmp(&a.out_degree))
            .then_with(|| a.qualified_name.cmp(&b.qualified_name))
    });
    ranked
}

/// Iterative PageRank over the whole graph (every node, external included —
/// filtering happens at candidacy, not in the random walk).
///
/// Converges when the maximum per-node delta falls below `epsilon`, capped at
/// `max_iterations` to guarantee termination on any graph shape. Dangling
/// mass is redistributed uniformly.
pub fn pagerank(graph: &GraphStore, config: &RankingConfig) -> HashMap<NodeIndex, f64> {
    let nodes = graph.sorted_nodes();
    let n = nodes.len();
    if n == 0 {
        return HashMap::new();
    }

    let position: HashMap<NodeIndex, usize> =
        nodes.iter().enumerate().map(|(i, &idx)| (idx, i)).collect();

    let out_degree: Vec<usize> = nodes
        .iter()
        .map(|&idx| graph.graph.edges_directed(idx, Direction::Outgoing).count())
        .collect();

    let d = config.damping;
    let uniform = 1.0 / n as f64;
    let mut score = vec![uniform; n];

    for iteration in 0..config.max_iterations {
        let dangling: f64 = nodes
            .iter()
            .enumerate()
            .filter(|(i, _)| out_degree[*i] == 0)
            .map(|(i, _)| score[i])
            .sum();

        let mut next = vec![(1.0 - d) * uniform + d * dangling * uniform; n];
        for (i, &idx) in nodes.iter().enumerate() {
            for edge in graph.graph.edges_directed(idx, Direction::Incoming) {
                let src = position[&edge.source()];
                if out_degree[src] > 0 {
                    next[i] += d * score[src] / out_degree[src] as f64;
                }
            }
        }

        let max_delta = score
            .iter()
            .zip(&next)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0_f64, f64::max);
        score = next;

        if max_delta < config.epsilon {
            tracing::debug!("pagerank converged after {} iterations", iteration + 1);
            break;
        }
    }

    nodes.into_iter().zip(score).collect()
}
