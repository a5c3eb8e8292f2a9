pub mod edge;
pub mod node;

use std::collections::{HashMap, HashSet};

use petgraph::Directed;
use petgraph::stable_graph::{NodeIndex, StableGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};

use edge::EdgeKind;
use node::{ArchNode, NodeKind};

/// The unified architecture graph: a directed petgraph StableGraph with an
/// O(1) qualified-name index and idempotent typed-edge insertion.
///
/// Single source of truth for all downstream consumers. Only the resolver
/// creates nodes; the semantic link engine adds edges between existing nodes.
#[derive(Debug)]
pub struct GraphStore {
    /// The underlying directed graph, parameterised over node and edge kinds.
    pub graph: StableGraph<ArchNode, EdgeKind, Directed>,
    /// Maps qualified names to node indices.
    name_index: HashMap<String, NodeIndex>,
    /// Existing (source, target, kind) triples, for idempotent edge merging.
    edge_keys: HashSet<(NodeIndex, NodeIndex, EdgeKind)>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self {
            graph: StableGraph::new(),
            name_index: HashMap::new(),
            edge_keys: HashSet::new(),
        }
    }

    /// Add a node. If a node with the same qualified name already exists, the
    /// existing index is returned and the new data is ignored: nodes are
    /// immutable after creation within one run.
    pub fn add_node(&mut self, node: ArchNode) -> NodeIndex {
        if let Some(&existing) = self.name_index.get(&node.qualified_name) {
            return existing;
        }
        let name = node.qualified_name.clone();
        let idx = self.graph.add_node(node);
        self.name_index.insert(name, idx);
        idx
    }

    /// Look up a node index by qualified name.
    pub fn index_of(&self, qualified_name: &str) -> Option<NodeIndex> {
        self.name_index.get(qualified_name).copied()
    }

    /// Whether a node with this qualified name exists.
    pub fn contains(&self, qualified_name: &str) -> bool {
        self.name_index.contains_key(qualified_name)
    }

    pub fn node(&self, idx: NodeIndex) -> &ArchNode {
        &self.graph[idx]
    }

    /// Add a typed edge. Returns `false` when an identical
    /// (source, target, kind) triple is already present.
    pub fn add_edge(&mut self, source: NodeIndex, target: NodeIndex, kind: EdgeKind) -> bool {
        let key = (source, target, kind.clone());
        if self.edge_keys.contains(&key) {
            return false;
        }
        self.graph.add_edge(source, target, kind.clone());
        self.edge_keys.insert(key);
        true
    }

    /// Add an edge between two qualified names. Returns `false` when either
    /// endpoint is missing or the edge already exists.
    pub fn add_edge_by_name(&mut self, source: &str, target: &str, kind: EdgeKind) -> bool {
        match (self.index_of(source), self.index_of(target)) {
            (Some(s), Some(t)) => self.add_edge(s, t, kind),
            _ => false,
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Number of nodes of the given kind.
    pub fn count_kind(&self, kind: NodeKind) -> usize {
        self.graph
            .node_indices()
            .filter(|&i| self.graph[i].kind == kind)
            .count()
    }

    /// All node indices ordered by qualified name. The canonical iteration
    /// order for every consumer that needs deterministic output.
    pub fn sorted_nodes(&self) -> Vec<NodeIndex> {
        let mut indices: Vec<NodeIndex> = self.graph.node_indices().collect();
        indices.sort_by(|&a, &b| self.graph[a].qualified_name.cmp(&self.graph[b].qualified_name));
        indices
    }

    /// All edges as (source name, target name, kind), ordered by
    /// (source, target, kind name, label) for deterministic output.
    pub fn sorted_edges(&self) -> Vec<(String, String, EdgeKind)> {
        let mut edges: Vec<(String, String, EdgeKind)> = self
            .graph
            .edge_references()
            .map(|e| {
                (
                    self.graph[e.source()].qualified_name.clone(),
                    self.graph[e.target()].qualified_name.clone(),
                    e.weight().clone(),
                )
            })
            .collect();
        edges.sort_by(|a, b| {
            a.0.cmp(&b.0)
                .then_with(|| a.1.cmp(&b.1))
                .then_with(|| a.2.name().cmp(b.2.name()))
                .then_with(|| a.2.label().cmp(&b.2.label()))
        });
        edges
    }

    /// Count of edges broken down by kind name.
    pub fn edges_by_kind(&self) -> HashMap<&'static str, usize> {
        let mut map: HashMap<&'static str, usize> = HashMap::new();
        for e in self.graph.edge_references() {
            *map.entry(e.weight().name()).or_insert(0) += 1;
        }
        map
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}
