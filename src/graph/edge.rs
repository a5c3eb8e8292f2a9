/// The kind of directed edge between two nodes in the architecture graph.
///
/// Duplicate edges with an identical (source, target, kind, label) triple are
/// merged idempotently by [`crate::graph::GraphStore::add_edge`]; distinct
/// kinds between the same pair coexist.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Module -> module (or external): the source imports the target.
    Imports,
    /// Class -> base class.
    Inherits,
    /// Decorator's owning component -> decorated definition.
    Decorates,
    /// Proxy binding -> the object it delegates to.
    Proxies,
    /// Registrar class -> registered component (class-body collection).
    Registers,
    /// Calling component -> component passed through an injection point.
    Injects,
    /// Directly observed use (call site); `label` distinguishes refined
    /// variants such as `strategy` dispatch.
    Uses { label: Option<String> },
    /// Tracked-instance identity propagated through an assignment or a
    /// parameter-passing site.
    ConceptFlow,
    /// String-key correlated producer -> consumer; `label` is the key.
    DynamicBehavior { label: String },
}

impl EdgeKind {
    /// Short lowercase name used in exports and reports.
    pub fn name(&self) -> &'static str {
        match self {
            EdgeKind::Imports => "imports",
            EdgeKind::Inherits => "inherits",
            EdgeKind::Decorates => "decorates",
            EdgeKind::Proxies => "proxies",
            EdgeKind::Registers => "registers",
            EdgeKind::Injects => "injects",
            EdgeKind::Uses { .. } => "uses",
            EdgeKind::ConceptFlow => "concept-flow",
            EdgeKind::DynamicBehavior { .. } => "dynamic-behavior",
        }
    }

    /// The optional display label carried by this edge.
    pub fn label(&self) -> Option<&str> {
        match self {
            EdgeKind::Uses { label } => label.as_deref(),
            EdgeKind::DynamicBehavior { label } => Some(label),
            _ => None,
        }
    }
}
