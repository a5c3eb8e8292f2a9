pub mod facts;
pub mod imports;
pub mod symbols;

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tree_sitter::{Node, Parser, Tree};

use crate::error::ParseFailure;
use crate::layout::ResolutionContext;

use facts::{AssignFact, CallFact, CollectionFact, extract_facts};
use imports::{ImportFact, extract_imports};
use symbols::{DefFact, extract_defs};

// Thread-local Parser instances — one per rayon worker thread, zero lock
// contention. Initialised once per thread with the Python grammar.
thread_local! {
    static PARSER_PY: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        p.set_language(&tree_sitter_python::LANGUAGE.into()).unwrap();
        p
    });
}

/// Everything the worker parser extracts from one source file.
///
/// Produced by a stateless worker, consumed exactly once by the resolver.
/// Serializable so the cache layer can store it verbatim; the syntax tree is
/// NOT retained — facts are extracted and the tree is dropped.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FileRecord {
    /// Absolute path to the source file.
    pub path: PathBuf,
    /// Dotted module path derived from the resolution context.
    pub module: String,
    /// Whether this file is a package `__init__.py`.
    pub is_package_init: bool,
    /// Hex SHA-256 of the file contents at parse time.
    pub content_hash: String,
    /// First line of the module docstring, when present.
    pub summary: Option<String>,
    pub defs: Vec<DefFact>,
    pub imports: Vec<ImportFact>,
    pub assigns: Vec<AssignFact>,
    pub collections: Vec<CollectionFact>,
    pub calls: Vec<CallFact>,
}

/// Hex SHA-256 content hash — one half of the content-addressed cache key.
pub fn content_hash(source: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source);
    hex::encode(hasher.finalize())
}

/// Parse Python source into a syntax tree, rejecting files with syntax
/// errors. `None` means tree-sitter could not produce a tree at all.
pub fn parse_tree(source: &[u8]) -> Option<Tree> {
    let tree = PARSER_PY.with(|p| p.borrow_mut().parse(source, None))?;
    if tree.root_node().has_error() {
        return None;
    }
    Some(tree)
}

/// Parse one source file into a [`FileRecord`].
///
/// Allocates a fresh `Parser` on every call — suitable for one-off parses.
/// For bulk parsing under rayon use [`parse_file_parallel`] instead.
///
/// # Errors
/// Returns a [`ParseFailure`] (fatal to this file only) when the source has
/// syntax errors or the file lies outside the resolution context.
pub fn parse_file(path: &Path, source: &[u8], ctx: &ResolutionContext) -> Result<FileRecord, ParseFailure> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| ParseFailure::new(path, format!("failed to set python grammar: {e}")))?;
    let tree = parser
        .parse(source, None)
        .filter(|t| !t.root_node().has_error())
        .ok_or_else(|| ParseFailure::new(path, "syntax error"))?;
    build_record(path, source, &tree, ctx)
}

/// Parse one source file using the thread-local Parser (for rayon workers).
///
/// Same contract as [`parse_file`]; the `thread_local!` pattern gives each
/// worker thread its own Parser, initialised lazily on first use.
pub fn parse_file_parallel(
    path: &Path,
    source: &[u8],
    ctx: &ResolutionContext,
) -> Result<FileRecord, ParseFailure> {
    let tree = parse_tree(source).ok_or_else(|| ParseFailure::new(path, "syntax error"))?;
    build_record(path, source, &tree, ctx)
}

fn build_record(
    path: &Path,
    source: &[u8],
    tree: &Tree,
    ctx: &ResolutionContext,
) -> Result<FileRecord, ParseFailure> {
    let module = ctx
        .module_path_for(path)
        .ok_or_else(|| ParseFailure::new(path, "file is outside the detected root packages"))?;

    let defs = extract_defs(tree, source);
    let import_facts = extract_imports(tree, source);
    let (assigns, collections, calls) = extract_facts(tree, source);

    Ok(FileRecord {
        path: path.to_path_buf(),
        module,
        is_package_init: ResolutionContext::is_package_init(path),
        content_hash: content_hash(source),
        summary: docstring_of_block(tree.root_node(), source),
        defs,
        imports: import_facts,
        assigns,
        collections,
        calls,
    })
}

// ---------------------------------------------------------------------------
// Shared tree helpers
// ---------------------------------------------------------------------------

/// Extract the UTF-8 text of a node from the original source bytes.
pub(crate) fn node_text<'a>(node: Node<'a>, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

/// Render an expression as a dotted name: identifiers and attribute chains
/// directly, calls through their callee. `None` for anything else
/// (subscripts, literals, comprehensions).
pub(crate) fn dotted_expr(node: Node, source: &[u8]) -> Option<String> {
    match node.kind() {
        "identifier" => Some(node_text(node, source).to_string()),
        "attribute" => {
            let object = node.child_by_field_name("object")?;
            let attr = node.child_by_field_name("attribute")?;
            Some(format!(
                "{}.{}",
                dotted_expr(object, source)?,
                node_text(attr, source)
            ))
        }
        "call" => dotted_expr(node.child_by_field_name("function")?, source),
        _ => None,
    }
}

/// First line of the docstring of a block (or of the module node itself).
pub(crate) fn docstring_of_block(block: Node, source: &[u8]) -> Option<String> {
    let first = block.named_child(0)?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let string_node = first.named_child(0)?;
    if string_node.kind() != "string" {
        return None;
    }
    let mut content = String::new();
    let mut cursor = string_node.walk();
    for child in string_node.children(&mut cursor) {
        if child.kind() == "string_content" {
            content.push_str(node_text(child, source));
        }
    }
    let first_line = content.lines().map(str::trim).find(|l| !l.is_empty())?;
    Some(first_line.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::LayoutKind;

    fn ctx() -> ResolutionContext {
        ResolutionContext {
            project_root: PathBuf::from("/proj"),
            source_root: PathBuf::from("/proj"),
            layout: LayoutKind::Flat,
            root_packages: vec!["app".to_string()],
        }
    }

    #[test]
    fn test_parse_file_builds_full_record() {
        let source = br#""""Order handling."""
from app.core import Service


class OrderService(Service):
    """Processes orders."""

    def submit(self, order):
        self.queue.send_task("orders.process", order)
"#;
        let record = parse_file(Path::new("/proj/app/orders.py"), source, &ctx()).unwrap();
        assert_eq!(record.module, "app.orders");
        assert!(!record.is_package_init);
        assert_eq!(record.summary.as_deref(), Some("Order handling."));
        assert_eq!(record.defs.len(), 2);
        assert_eq!(record.imports.len(), 1);
        assert_eq!(record.calls.len(), 1);
        assert_eq!(record.content_hash, content_hash(source));
    }

    #[test]
    fn test_parse_file_rejects_syntax_errors() {
        let err = parse_file(Path::new("/proj/app/bad.py"), b"def broken(:\n", &ctx()).unwrap_err();
        assert!(err.message.contains("syntax error"));
        assert!(err.path.ends_with("bad.py"));
    }

    #[test]
    fn test_parallel_and_sequential_agree() {
        let source = b"class A:\n    pass\n";
        let path = Path::new("/proj/app/a.py");
        let a = parse_file(path, source, &ctx()).unwrap();
        let b = parse_file_parallel(path, source, &ctx()).unwrap();
        assert_eq!(a.defs.len(), b.defs.len());
        assert_eq!(a.content_hash, b.content_hash);
    }

    #[test]
    fn test_package_init_module_path() {
        let record = parse_file(Path::new("/proj/app/__init__.py"), b"", &ctx()).unwrap();
        assert_eq!(record.module, "app");
        assert!(record.is_package_init);
    }

    #[test]
    fn test_content_hash_is_stable() {
        assert_eq!(content_hash(b"x = 1\n"), content_hash(b"x = 1\n"));
        assert_ne!(content_hash(b"x = 1\n"), content_hash(b"x = 2\n"));
    }
}
