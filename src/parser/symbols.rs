use tree_sitter::{Node, Tree};

use super::{docstring_of_block, dotted_expr, node_text};

/// The kind of local definition extracted from a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DefKind {
    Class,
    Function,
}

/// A class or function definition, qualified relative to its module.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DefFact {
    /// Dotted path within the module, e.g. `Service` or `Service.start`.
    pub local_path: String,
    pub kind: DefKind,
    /// 1-based line of the definition.
    pub line: usize,
    /// No segment of the local path starts with an underscore.
    pub is_public: bool,
    /// First line of the docstring, when present.
    pub summary: Option<String>,
    /// Raw dotted base-class expressions (classes only).
    pub bases: Vec<String>,
    /// Raw dotted decorator callee expressions, outermost first.
    pub decorators: Vec<String>,
}

/// Extract all class and function definitions, nested included, with their
/// docstrings, base classes, and decorators.
pub fn extract_defs(tree: &Tree, source: &[u8]) -> Vec<DefFact> {
    let mut defs = Vec::new();
    let mut scope: Vec<String> = Vec::new();
    walk(tree.root_node(), source, &mut scope, &[], &mut defs);
    defs
}

fn walk(
    node: Node,
    source: &[u8],
    scope: &mut Vec<String>,
    pending_decorators: &[String],
    out: &mut Vec<DefFact>,
) {
    match node.kind() {
        "decorated_definition" => {
            // Collect decorator callee texts, then descend into the wrapped
            // definition with them attached.
            let mut decorators = Vec::new();
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                if child.kind() == "decorator"
                    && let Some(expr) = child.named_child(0)
                    && let Some(dotted) = dotted_expr(expr, source)
                {
                    decorators.push(dotted);
                }
            }
            if let Some(definition) = node.child_by_field_name("definition") {
                walk(definition, source, scope, &decorators, out);
            }
        }
        "class_definition" | "function_definition" => {
            let Some(name_node) = node.child_by_field_name("name") else {
                return;
            };
            let name = node_text(name_node, source).to_string();
            scope.push(name);
            let local_path = scope.join(".");

            let kind = if node.kind() == "class_definition" {
                DefKind::Class
            } else {
                DefKind::Function
            };

            let bases = if kind == DefKind::Class {
                extract_bases(node, source)
            } else {
                Vec::new()
            };

            let summary = node
                .child_by_field_name("body")
                .and_then(|body| docstring_of_block(body, source));

            out.push(DefFact {
                is_public: !local_path.split('.').any(|seg| seg.starts_with('_')),
                local_path,
                kind,
                line: node.start_position().row + 1,
                summary,
                bases,
                decorators: pending_decorators.to_vec(),
            });

            if let Some(body) = node.child_by_field_name("body") {
                let mut cursor = body.walk();
                for child in body.named_children(&mut cursor) {
                    walk(child, source, scope, &[], out);
                }
            }
            scope.pop();
        }
        _ => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                walk(child, source, scope, &[], out);
            }
        }
    }
}

/// Base-class expressions from a class's superclass argument list.
/// Keyword arguments (`metaclass=...`) are not bases and are skipped.
fn extract_bases(class_node: Node, source: &[u8]) -> Vec<String> {
    let Some(superclasses) = class_node.child_by_field_name("superclasses") else {
        return Vec::new();
    };
    let mut bases = Vec::new();
    let mut cursor = superclasses.walk();
    for arg in superclasses.named_children(&mut cursor) {
        if arg.kind() == "keyword_argument" {
            continue;
        }
        if let Some(dotted) = dotted_expr(arg, source) {
            bases.push(dotted);
        }
    }
    bases
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_tree;

    fn defs(source: &str) -> Vec<DefFact> {
        let tree = parse_tree(source.as_bytes()).expect("fixture parses");
        extract_defs(&tree, source.as_bytes())
    }

    #[test]
    fn test_class_with_method_and_docstrings() {
        let source = r#"
class Service:
    """Coordinates the worker pool.

    Longer description.
    """

    def start(self):
        """Boot the service."""
        return True
"#;
        let facts = defs(source);
        assert_eq!(facts.len(), 2);
        assert_eq!(facts[0].local_path, "Service");
        assert_eq!(facts[0].kind, DefKind::Class);
        assert_eq!(
            facts[0].summary.as_deref(),
            Some("Coordinates the worker pool."),
            "summary is the first docstring line only"
        );
        assert_eq!(facts[1].local_path, "Service.start");
        assert_eq!(facts[1].kind, DefKind::Function);
        assert_eq!(facts[1].summary.as_deref(), Some("Boot the service."));
    }

    #[test]
    fn test_bases_are_extracted() {
        let facts = defs("class Sub(base.Parent, Mixin, metaclass=Meta):\n    pass\n");
        assert_eq!(facts[0].bases, vec!["base.Parent".to_string(), "Mixin".to_string()]);
    }

    #[test]
    fn test_decorators_attach_to_definition() {
        let source = "@app.route('/health')\n@cached\ndef health():\n    pass\n";
        let facts = defs(source);
        assert_eq!(facts[0].local_path, "health");
        assert_eq!(
            facts[0].decorators,
            vec!["app.route".to_string(), "cached".to_string()]
        );
    }

    #[test]
    fn test_private_names_are_flagged() {
        let facts = defs("def _helper():\n    pass\n\nclass Public:\n    def _hidden(self):\n        pass\n");
        let helper = facts.iter().find(|d| d.local_path == "_helper").unwrap();
        assert!(!helper.is_public);
        let hidden = facts.iter().find(|d| d.local_path == "Public._hidden").unwrap();
        assert!(!hidden.is_public);
        let public = facts.iter().find(|d| d.local_path == "Public").unwrap();
        assert!(public.is_public);
    }

    #[test]
    fn test_nested_function_scope() {
        let facts = defs("def outer():\n    def inner():\n        pass\n");
        assert!(facts.iter().any(|d| d.local_path == "outer.inner"));
    }
}
