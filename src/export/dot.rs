use std::collections::HashSet;
use std::fmt::Write;

use crate::graph::GraphStore;
use crate::graph::edge::EdgeKind;
use crate::graph::node::NodeKind;

/// Sanitize a string for use as a DOT node ID.
///
/// Replaces non-alphanumeric characters with `_`. Prepends `n` if the result
/// starts with a digit (DOT IDs must not start with a digit).
pub fn sanitize_dot_id(s: &str) -> String {
    let mut result: String = s
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if result.starts_with(|c: char| c.is_ascii_digit()) {
        result.insert(0, 'n');
    }
    if result.is_empty() {
        result = "node".to_string();
    }
    result
}

/// DOT fillcolor per node kind.
fn node_fillcolor(kind: &NodeKind) -> &'static str {
    match kind {
        NodeKind::Module => "#AED6F1",
        NodeKind::Class => "#A9DFBF",
        NodeKind::Function => "#F9E79F",
        NodeKind::Binding => "#FAD7A0",
        NodeKind::ExternalSymbol => "#EAECEE",
    }
}

/// Short display label per node kind.
fn kind_label(kind: &NodeKind) -> &'static str {
    match kind {
        NodeKind::Module => "module",
        NodeKind::Class => "class",
        NodeKind::Function => "fn",
        NodeKind::Binding => "binding",
        NodeKind::ExternalSymbol => "external",
    }
}

/// DOT edge style attributes per edge kind.
fn edge_style(kind: &EdgeKind) -> &'static str {
    match kind {
        EdgeKind::Imports => "style=solid color=\"#555555\"",
        EdgeKind::Inherits => "style=dotted color=\"#32CD32\"",
        EdgeKind::Decorates => "style=dashed color=\"#FF8C00\"",
        EdgeKind::Proxies => "style=dashed color=\"#9932CC\" arrowhead=tee",
        EdgeKind::Registers => "style=dashed color=\"#1E90FF\"",
        EdgeKind::Injects => "style=dashed color=\"#DAA520\"",
        EdgeKind::Uses { label: Some(_) } => "style=bold color=\"#FF69B4\"",
        EdgeKind::Uses { label: None } => "style=solid color=\"#888888\"",
        EdgeKind::ConceptFlow => "style=solid color=\"#2E86C1\"",
        EdgeKind::DynamicBehavior { .. } => "style=dashed color=\"#C0392B\"",
    }
}

/// Render the graph (optionally restricted to a node subset) as DOT text.
///
/// Output is deterministic: nodes and edges follow the graph store's
/// canonical sort, so identical graphs produce byte-identical DOT.
pub fn render_dot(graph: &GraphStore, subset: Option<&HashSet<String>>, title: &str) -> String {
    let keep = |name: &str| subset.is_none_or(|s| s.contains(name));

    let mut out = String::new();
    writeln!(out, "digraph {} {{", sanitize_dot_id(title)).unwrap();
    writeln!(out, "    rankdir=TB;").unwrap();
    writeln!(out, "    node [style=filled fontname=monospace shape=box];").unwrap();

    for idx in graph.sorted_nodes() {
        let node = graph.node(idx);
        if !keep(&node.qualified_name) {
            continue;
        }
        let mut label = format!("{} ({})", node.qualified_name, kind_label(&node.kind));
        if let Some(ref summary) = node.summary {
            write!(label, "\\n{}", escape(summary)).unwrap();
        }
        writeln!(
            out,
            "    {} [label=\"{}\" fillcolor=\"{}\"];",
            sanitize_dot_id(&node.qualified_name),
            label,
            node_fillcolor(&node.kind)
        )
        .unwrap();
    }

    for (source, target, kind) in graph.sorted_edges() {
        if source == target || !keep(&source) || !keep(&target) {
            continue;
        }
        let style = edge_style(&kind);
        match kind.label() {
            Some(label) => writeln!(
                out,
                "    {} -> {} [{} label=\"{}\"];",
                sanitize_dot_id(&source),
                sanitize_dot_id(&target),
                style,
                escape(label)
            )
            .unwrap(),
            None => writeln!(
                out,
                "    {} -> {} [{} label=\"{}\"];",
                sanitize_dot_id(&source),
                sanitize_dot_id(&target),
                style,
                kind.name()
            )
            .unwrap(),
        }
    }

    writeln!(out, "}}").unwrap();
    out
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
