/// The kind of node in the architecture graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// A Python module (one source file or a package `__init__`).
    Module,
    /// A class definition.
    Class,
    /// A function or method definition.
    Function,
    /// A module-top-level name bound to a value (instantiation or alias);
    /// the anchor nodes of the concept-flow pass.
    Binding,
    /// A symbol defined outside the analyzed project. Terminal in the graph:
    /// internals of third-party dependencies are not analyzed.
    ExternalSymbol,
}

impl NodeKind {
    /// Short lowercase name used in exports and reports.
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Module => "module",
            NodeKind::Class => "class",
            NodeKind::Function => "function",
            NodeKind::Binding => "binding",
            NodeKind::ExternalSymbol => "external-symbol",
        }
    }
}

/// A node in the architecture graph. Created exactly once per distinct
/// qualified name by the resolver; immutable for the rest of the run.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ArchNode {
    /// Globally unique dotted name (e.g. `myapp.core.Service`).
    pub qualified_name: String,
    pub kind: NodeKind,
    /// Dotted path of the owning module (equal to `qualified_name` for
    /// module nodes, empty for external symbols).
    pub module: String,
    /// Private-by-convention check: no segment starts with an underscore.
    pub is_public: bool,
    /// Defined outside the analyzed project.
    pub is_external: bool,
    /// First line of the docstring, when present.
    pub summary: Option<String>,
    /// Architectural layer tag: the first sub-package segment under the root
    /// package (e.g. `core` for `myapp.core.cache.Store`).
    pub layer: Option<String>,
}

impl ArchNode {
    /// An external-flagged node for a qualified name defined outside the
    /// project. Lazily materialized by the resolver on first reference.
    pub fn external(qualified_name: impl Into<String>) -> Self {
        let qualified_name = qualified_name.into();
        let is_public = is_public_name(&qualified_name);
        Self {
            qualified_name,
            kind: NodeKind::ExternalSymbol,
            module: String::new(),
            is_public,
            is_external: true,
            summary: None,
            layer: None,
        }
    }
}

/// Private-by-convention: any dotted segment starting with `_` (dunders
/// included) makes the whole name private.
pub fn is_public_name(qualified_name: &str) -> bool {
    !qualified_name.split('.').any(|seg| seg.starts_with('_'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_public_name() {
        assert!(is_public_name("myapp.core.Service"));
        assert!(!is_public_name("myapp.core._internal"));
        assert!(!is_public_name("myapp._private.Service"));
        assert!(!is_public_name("myapp.core.__init__"));
    }

    #[test]
    fn test_external_node_flags() {
        let node = ArchNode::external("flask.Flask");
        assert!(node.is_external);
        assert_eq!(node.kind, NodeKind::ExternalSymbol);
        assert!(node.module.is_empty());
    }
}
