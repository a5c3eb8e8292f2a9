use tree_sitter::{Node, Tree};

use super::node_text;

/// One name brought in by a `from` import: `from p import name as alias`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ImportedName {
    pub name: String,
    pub alias: Option<String>,
}

/// A normalized import statement.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum ImportFact {
    /// `import x.y` / `import x.y as z`.
    Module {
        module: String,
        alias: Option<String>,
        line: usize,
    },
    /// `from x.y import a, b as c` / `from ..pkg import d` / `from x import *`.
    ///
    /// `level` counts the leading dots (0 for absolute imports); `module` is
    /// the dotted path after the dots and may be empty (`from . import m`).
    From {
        module: String,
        level: usize,
        names: Vec<ImportedName>,
        wildcard: bool,
        line: usize,
    },
}

/// Extract all import statements from the syntax tree, including imports
/// nested inside functions (late imports are still architecture edges).
pub fn extract_imports(tree: &Tree, source: &[u8]) -> Vec<ImportFact> {
    let mut facts = Vec::new();
    walk(tree.root_node(), source, &mut facts);
    facts
}

fn walk(node: Node, source: &[u8], out: &mut Vec<ImportFact>) {
    match node.kind() {
        "import_statement" => extract_plain_import(node, source, out),
        "import_from_statement" => extract_from_import(node, source, out),
        _ => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                walk(child, source, out);
            }
        }
    }
}

/// `import a.b` / `import a.b as c` — one fact per comma-separated clause.
fn extract_plain_import(node: Node, source: &[u8], out: &mut Vec<ImportFact>) {
    let line = node.start_position().row + 1;
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "dotted_name" => out.push(ImportFact::Module {
                module: node_text(child, source).to_string(),
                alias: None,
                line,
            }),
            "aliased_import" => {
                let module = child
                    .child_by_field_name("name")
                    .map(|n| node_text(n, source).to_string())
                    .unwrap_or_default();
                let alias = child
                    .child_by_field_name("alias")
                    .map(|n| node_text(n, source).to_string());
                if !module.is_empty() {
                    out.push(ImportFact::Module {
                        module,
                        alias,
                        line,
                    });
                }
            }
            _ => {}
        }
    }
}

/// `from <module> import <names>` with relative-level and wildcard handling.
fn extract_from_import(node: Node, source: &[u8], out: &mut Vec<ImportFact>) {
    let line = node.start_position().row + 1;

    let (module, level) = match node.child_by_field_name("module_name") {
        Some(m) if m.kind() == "relative_import" => relative_parts(m, source),
        Some(m) => (node_text(m, source).to_string(), 0),
        None => return,
    };

    // `from __future__ import ...` carries no architectural information.
    if module == "__future__" {
        return;
    }

    let mut wildcard = false;
    let mut names = Vec::new();

    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        match child.kind() {
            "wildcard_import" => wildcard = true,
            "dotted_name" if Some(child) != node.child_by_field_name("module_name") => {
                names.push(ImportedName {
                    name: node_text(child, source).to_string(),
                    alias: None,
                });
            }
            "aliased_import" => {
                let name = child
                    .child_by_field_name("name")
                    .map(|n| node_text(n, source).to_string())
                    .unwrap_or_default();
                let alias = child
                    .child_by_field_name("alias")
                    .map(|n| node_text(n, source).to_string());
                if !name.is_empty() {
                    names.push(ImportedName { name, alias });
                }
            }
            _ => {}
        }
    }

    out.push(ImportFact::From {
        module,
        level,
        names,
        wildcard,
        line,
    });
}

/// Split a `relative_import` node into (dotted module, dot count).
fn relative_parts(node: Node, source: &[u8]) -> (String, usize) {
    let mut level = 0;
    let mut module = String::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "import_prefix" => level = node_text(child, source).chars().filter(|&c| c == '.').count(),
            "dotted_name" => module = node_text(child, source).to_string(),
            _ => {}
        }
    }
    (module, level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_tree;

    fn imports(source: &str) -> Vec<ImportFact> {
        let tree = parse_tree(source.as_bytes()).expect("fixture parses");
        extract_imports(&tree, source.as_bytes())
    }

    #[test]
    fn test_plain_and_aliased_import() {
        let facts = imports("import os.path\nimport numpy as np\n");
        assert_eq!(facts.len(), 2);
        assert!(matches!(
            &facts[0],
            ImportFact::Module { module, alias: None, .. } if module == "os.path"
        ));
        assert!(matches!(
            &facts[1],
            ImportFact::Module { module, alias: Some(a), .. }
                if module == "numpy" && a == "np"
        ));
    }

    #[test]
    fn test_from_import_with_alias() {
        let facts = imports("from app.core import Service as Svc, helper\n");
        let ImportFact::From {
            module,
            level,
            names,
            wildcard,
            ..
        } = &facts[0]
        else {
            panic!("expected From fact");
        };
        assert_eq!(module, "app.core");
        assert_eq!(*level, 0);
        assert!(!wildcard);
        assert_eq!(names.len(), 2);
        assert_eq!(names[0].name, "Service");
        assert_eq!(names[0].alias.as_deref(), Some("Svc"));
        assert_eq!(names[1].name, "helper");
        assert!(names[1].alias.is_none());
    }

    #[test]
    fn test_relative_imports() {
        let facts = imports("from . import sibling\nfrom ..pkg import thing\n");
        assert!(matches!(
            &facts[0],
            ImportFact::From { module, level: 1, .. } if module.is_empty()
        ));
        assert!(matches!(
            &facts[1],
            ImportFact::From { module, level: 2, .. } if module == "pkg"
        ));
    }

    #[test]
    fn test_wildcard_import() {
        let facts = imports("from app.models import *\n");
        assert!(matches!(
            &facts[0],
            ImportFact::From { wildcard: true, names, .. } if names.is_empty()
        ));
    }

    #[test]
    fn test_future_import_is_skipped() {
        let facts = imports("from __future__ import annotations\nimport os\n");
        assert_eq!(facts.len(), 1);
    }

    #[test]
    fn test_nested_import_is_found() {
        let facts = imports("def late():\n    import json\n    return json\n");
        assert!(matches!(
            &facts[0],
            ImportFact::Module { module, .. } if module == "json"
        ));
    }
}
