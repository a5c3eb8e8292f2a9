use tree_sitter::{Node, Tree};

use super::{dotted_expr, node_text};

/// The right-hand side of a recorded assignment.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum AssignValue {
    /// `x = callee(...)` — instantiation or factory call.
    /// `args` holds the dotted name arguments (lambdas unwrapped one level).
    Call { callee: String, args: Vec<String> },
    /// `x = other` / `x = other.attr` — a plain reference.
    Name(String),
}

/// An assignment site relevant to concept-flow seeding and propagation.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AssignFact {
    /// Dotted path of the enclosing definition; empty at module top level.
    pub scope: String,
    /// Raw dotted target (`svc`, `self.engine`).
    pub target: String,
    pub value: AssignValue,
    pub line: usize,
}

impl AssignFact {
    /// A module-top-level binding — the candidates for concept-flow seeds.
    pub fn is_top_level(&self) -> bool {
        self.scope.is_empty()
    }
}

/// A class-body list/tuple assignment — the collection-registration shape
/// (`handlers = [HandlerA, HandlerB]` inside a class).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CollectionFact {
    /// Local path of the enclosing class.
    pub class_path: String,
    pub target: String,
    /// Raw dotted names of the collection elements.
    pub elements: Vec<String>,
    pub line: usize,
}

/// A call site with the literal arguments the rule engine matches on.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CallFact {
    /// Dotted path of the enclosing definition; empty at module top level.
    pub scope: String,
    /// Raw dotted callee (`Service`, `queue.send_task`).
    pub callee: String,
    /// Dotted name arguments (positional, lambdas unwrapped one level).
    pub name_args: Vec<String>,
    /// Literal string arguments as (positional index, value).
    pub str_args: Vec<(usize, String)>,
    /// Literal string keyword arguments as (keyword, value).
    pub kw_str_args: Vec<(String, String)>,
    pub line: usize,
}

/// Extract assignment, collection, and call facts in one tree walk.
pub fn extract_facts(
    tree: &Tree,
    source: &[u8],
) -> (Vec<AssignFact>, Vec<CollectionFact>, Vec<CallFact>) {
    let mut facts = Facts::default();
    let mut scope: Vec<String> = Vec::new();
    walk(tree.root_node(), source, &mut scope, None, &mut facts);
    (facts.assigns, facts.collections, facts.calls)
}

#[derive(Default)]
struct Facts {
    assigns: Vec<AssignFact>,
    collections: Vec<CollectionFact>,
    calls: Vec<CallFact>,
}

fn walk(
    node: Node,
    source: &[u8],
    scope: &mut Vec<String>,
    class_body: Option<&str>,
    facts: &mut Facts,
) {
    match node.kind() {
        "class_definition" | "function_definition" => {
            let Some(name_node) = node.child_by_field_name("name") else {
                return;
            };
            scope.push(node_text(name_node, source).to_string());
            let class_path = scope.join(".");
            if let Some(body) = node.child_by_field_name("body") {
                let inner_class = (node.kind() == "class_definition").then_some(class_path.as_str());
                let mut cursor = body.walk();
                for child in body.named_children(&mut cursor) {
                    walk(child, source, scope, inner_class, facts);
                }
            }
            scope.pop();
        }
        "assignment" => {
            extract_assignment(node, source, scope, class_body, facts);
            // Still descend: the right-hand side may contain call sites.
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                walk(child, source, scope, None, facts);
            }
        }
        "call" => {
            extract_call(node, source, scope, facts);
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                walk(child, source, scope, None, facts);
            }
        }
        _ => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                walk(child, source, scope, class_body, facts);
            }
        }
    }
}

fn extract_assignment(
    node: Node,
    source: &[u8],
    scope: &[String],
    class_body: Option<&str>,
    facts: &mut Facts,
) {
    let Some(left) = node.child_by_field_name("left") else {
        return;
    };
    let Some(right) = node.child_by_field_name("right") else {
        return; // bare annotation `x: T` has no value
    };
    let Some(target) = dotted_expr(left, source) else {
        return; // tuple unpacking and subscripts are not tracked
    };
    let line = node.start_position().row + 1;

    match right.kind() {
        "call" => {
            if let Some(callee) = right.child_by_field_name("function").and_then(|f| dotted_expr(f, source)) {
                facts.assigns.push(AssignFact {
                    scope: scope.join("."),
                    target,
                    value: AssignValue::Call {
                        callee,
                        args: positional_name_args(right, source),
                    },
                    line,
                });
            }
        }
        "identifier" | "attribute" => {
            if let Some(name) = dotted_expr(right, source) {
                facts.assigns.push(AssignFact {
                    scope: scope.join("."),
                    target,
                    value: AssignValue::Name(name),
                    line,
                });
            }
        }
        "list" | "tuple" => {
            // Collections are only a registration signal inside a class body.
            let Some(class_path) = class_body else {
                return;
            };
            let mut elements = Vec::new();
            let mut cursor = right.walk();
            for element in right.named_children(&mut cursor) {
                if let Some(dotted) = dotted_expr(element, source) {
                    elements.push(dotted);
                }
            }
            if !elements.is_empty() {
                facts.collections.push(CollectionFact {
                    class_path: class_path.to_string(),
                    target,
                    elements,
                    line,
                });
            }
        }
        _ => {}
    }
}

fn extract_call(node: Node, source: &[u8], scope: &[String], facts: &mut Facts) {
    let Some(callee) = node.child_by_field_name("function").and_then(|f| dotted_expr(f, source))
    else {
        return;
    };

    let mut name_args = Vec::new();
    let mut str_args = Vec::new();
    let mut kw_str_args = Vec::new();

    if let Some(arguments) = node.child_by_field_name("arguments") {
        let mut positional = 0usize;
        let mut cursor = arguments.walk();
        for arg in arguments.named_children(&mut cursor) {
            match arg.kind() {
                "keyword_argument" => {
                    if let (Some(name), Some(value)) = (
                        arg.child_by_field_name("name"),
                        arg.child_by_field_name("value"),
                    ) && let Some(text) = string_literal(value, source)
                    {
                        kw_str_args.push((node_text(name, source).to_string(), text));
                    }
                }
                "comment" => {}
                _ => {
                    if let Some(text) = string_literal(arg, source) {
                        str_args.push((positional, text));
                    } else if let Some(dotted) = name_arg(arg, source) {
                        name_args.push(dotted);
                    }
                    positional += 1;
                }
            }
        }
    }

    facts.calls.push(CallFact {
        scope: scope.join("."),
        callee,
        name_args,
        str_args,
        kw_str_args,
        line: node.start_position().row + 1,
    });
}

/// Positional dotted name arguments of a call (lambdas unwrapped one level).
fn positional_name_args(call: Node, source: &[u8]) -> Vec<String> {
    let Some(arguments) = call.child_by_field_name("arguments") else {
        return Vec::new();
    };
    let mut args = Vec::new();
    let mut cursor = arguments.walk();
    for arg in arguments.named_children(&mut cursor) {
        if arg.kind() == "keyword_argument" {
            continue;
        }
        if let Some(dotted) = name_arg(arg, source) {
            args.push(dotted);
        }
    }
    args
}

/// A dotted name for an argument expression: plain names and attributes
/// directly, `lambda: target` via its body.
fn name_arg(arg: Node, source: &[u8]) -> Option<String> {
    match arg.kind() {
        "identifier" | "attribute" => dotted_expr(arg, source),
        "lambda" => arg.child_by_field_name("body").and_then(|b| dotted_expr(b, source)),
        _ => None,
    }
}

/// The literal content of a plain string node; `None` for f-strings with
/// interpolation and non-string expressions.
fn string_literal(node: Node, source: &[u8]) -> Option<String> {
    if node.kind() != "string" {
        return None;
    }
    let mut content = String::new();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "string_content" => content.push_str(node_text(child, source)),
            "interpolation" => return None,
            _ => {}
        }
    }
    if content.is_empty() {
        None
    } else {
        Some(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_tree;

    fn facts(source: &str) -> (Vec<AssignFact>, Vec<CollectionFact>, Vec<CallFact>) {
        let tree = parse_tree(source.as_bytes()).expect("fixture parses");
        extract_facts(&tree, source.as_bytes())
    }

    #[test]
    fn test_top_level_instantiation_assign() {
        let (assigns, _, calls) = facts("svc = Service(config)\n");
        assert_eq!(assigns.len(), 1);
        assert!(assigns[0].is_top_level());
        assert_eq!(assigns[0].target, "svc");
        assert!(matches!(
            &assigns[0].value,
            AssignValue::Call { callee, args }
                if callee == "Service" && args == &vec!["config".to_string()]
        ));
        // The instantiation is also a call fact.
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].callee, "Service");
    }

    #[test]
    fn test_method_scope_and_name_assign() {
        let (assigns, _, _) = facts("class App:\n    def wire(self):\n        self.engine = engine\n");
        assert_eq!(assigns[0].scope, "App.wire");
        assert_eq!(assigns[0].target, "self.engine");
        assert!(matches!(&assigns[0].value, AssignValue::Name(n) if n == "engine"));
    }

    #[test]
    fn test_class_body_collection() {
        let (_, collections, _) =
            facts("class Registry:\n    handlers = [HandlerA, plugins.HandlerB]\n");
        assert_eq!(collections.len(), 1);
        assert_eq!(collections[0].class_path, "Registry");
        assert_eq!(collections[0].target, "handlers");
        assert_eq!(
            collections[0].elements,
            vec!["HandlerA".to_string(), "plugins.HandlerB".to_string()]
        );
    }

    #[test]
    fn test_module_level_list_is_not_a_collection_fact() {
        let (_, collections, _) = facts("handlers = [HandlerA]\n");
        assert!(collections.is_empty(), "registration needs a class body");
    }

    #[test]
    fn test_call_string_args() {
        let (_, _, calls) = facts("queue.send_task('orders.process', payload, retry=True)\n");
        let call = &calls[0];
        assert_eq!(call.callee, "queue.send_task");
        assert_eq!(call.str_args, vec![(0, "orders.process".to_string())]);
        assert_eq!(call.name_args, vec!["payload".to_string()]);
    }

    #[test]
    fn test_call_keyword_string_arg() {
        let (_, _, calls) = facts("broker.subscribe(handler, topic='orders.process')\n");
        let call = &calls[0];
        assert_eq!(
            call.kw_str_args,
            vec![("topic".to_string(), "orders.process".to_string())]
        );
    }

    #[test]
    fn test_lambda_proxy_arg_is_unwrapped() {
        let (assigns, _, _) = facts("request = LocalProxy(lambda: _request_ctx.request)\n");
        assert!(matches!(
            &assigns[0].value,
            AssignValue::Call { callee, args }
                if callee == "LocalProxy" && args == &vec!["_request_ctx.request".to_string()]
        ));
    }

    #[test]
    fn test_fstring_key_is_ignored() {
        let (_, _, calls) = facts("queue.send_task(f'orders.{kind}')\n");
        assert!(calls[0].str_args.is_empty(), "interpolated keys are not literal");
    }
}
