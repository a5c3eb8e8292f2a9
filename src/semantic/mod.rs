pub mod concept_flow;
pub mod dynamic;
pub mod rules;

use crate::config::AnalysisConfig;
use crate::graph::GraphStore;
use crate::parser::FileRecord;
use crate::resolver::SymbolTable;

/// Edge counts produced by the semantic link engine.
#[derive(Debug, Default)]
pub struct SemanticStats {
    pub ioc_edges: usize,
    pub flow_edges: usize,
    pub dynamic_edges: usize,
}

/// Run the full semantic link engine over the resolved graph:
/// the ordered IoC rule list, then concept-flow propagation, then the
/// dynamic-behavior correlation pass.
///
/// Only edges are created here — every endpoint already exists as a node
/// (the resolver materialized external references up front).
pub fn apply(
    graph: &mut GraphStore,
    table: &SymbolTable,
    records: &[FileRecord],
    config: &AnalysisConfig,
    warnings: &mut Vec<String>,
) -> SemanticStats {
    let ioc_edges = rules::apply_ioc_rules(graph, table, records, &config.rules.ioc, warnings);
    let flow_edges = concept_flow::propagate(graph, table, records, &config.concept_flow, warnings);
    let dynamic_edges = dynamic::correlate(graph, table, records, &config.rules.dynamic, warnings);

    tracing::info!(
        "semantic links: {ioc_edges} rule edges, {flow_edges} concept-flow edges, {dynamic_edges} dynamic-behavior edges"
    );

    SemanticStats {
        ioc_edges,
        flow_edges,
        dynamic_edges,
    }
}
