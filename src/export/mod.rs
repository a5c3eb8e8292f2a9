pub mod dot;

use std::collections::HashSet;

use crate::graph::GraphStore;

/// Flat, deterministic projection of the graph for programmatic consumers.
#[derive(Debug, serde::Serialize)]
pub struct GraphDump {
    pub nodes: Vec<NodeDump>,
    pub edges: Vec<EdgeDump>,
}

#[derive(Debug, serde::Serialize)]
pub struct NodeDump {
    pub name: String,
    pub kind: String,
    pub module: String,
    pub public: bool,
    pub external: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer: Option<String>,
}

#[derive(Debug, serde::Serialize)]
pub struct EdgeDump {
    pub source: String,
    pub target: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Build the JSON projection, optionally restricted to a node subset
/// (focus-mode output). Ordering follows the graph store's canonical sort.
pub fn build_dump(graph: &GraphStore, subset: Option<&HashSet<String>>) -> GraphDump {
    let keep = |name: &str| subset.is_none_or(|s| s.contains(name));

    let nodes = graph
        .sorted_nodes()
        .into_iter()
        .map(|idx| graph.node(idx))
        .filter(|n| keep(&n.qualified_name))
        .map(|n| NodeDump {
            name: n.qualified_name.clone(),
            kind: n.kind.name().to_string(),
            module: n.module.clone(),
            public: n.is_public,
            external: n.is_external,
            summary: n.summary.clone(),
            layer: n.layer.clone(),
        })
        .collect();

    let edges = graph
        .sorted_edges()
        .into_iter()
        .filter(|(s, t, _)| keep(s) && keep(t))
        .map(|(source, target, kind)| EdgeDump {
            label: kind.label().map(str::to_string),
            kind: kind.name().to_string(),
            source,
            target,
        })
        .collect();

    GraphDump { nodes, edges }
}
