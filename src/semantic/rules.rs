use glob::Pattern;

use crate::config::IocRule;
use crate::graph::GraphStore;
use crate::graph::edge::EdgeKind;
use crate::parser::FileRecord;
use crate::parser::facts::AssignValue;
use crate::parser::symbols::DefKind;
use crate::resolver::SymbolTable;

/// Decorator names whose edge should be attributed to the receiver object:
/// `@app.route(...)` registers the handler on `app`, not on `route`.
const RECEIVER_DECORATORS: &[&str] = &["route", "command", "errorhandler", "before_request"];

/// Apply the configured IoC rules over the resolved facts, emitting typed
/// edges between existing nodes. Returns the number of edges added.
///
/// Every rule kind here contributes to an order-independent edge set —
/// duplicates merge idempotently, so rule order only matters for the dynamic
/// pass (see [`crate::semantic::dynamic`]).
pub fn apply_ioc_rules(
    graph: &mut GraphStore,
    table: &SymbolTable,
    records: &[FileRecord],
    rules: &[IocRule],
    warnings: &mut Vec<String>,
) -> usize {
    let mut added = 0;

    for rule in rules {
        added += match rule {
            IocRule::Inherit { base_pattern } => {
                apply_inherit(graph, table, records, base_pattern.as_deref(), warnings)
            }
            IocRule::Decorate { callee_pattern } => {
                apply_decorate(graph, table, records, callee_pattern, warnings)
            }
            IocRule::Proxy { factory_pattern } => {
                apply_proxy(graph, table, records, factory_pattern, warnings)
            }
            IocRule::Register => apply_register(graph, table, records),
            IocRule::Inject { callee_pattern } => {
                apply_inject(graph, table, records, callee_pattern, warnings)
            }
            IocRule::Strategy { callee_pattern } => {
                apply_strategy(graph, table, records, callee_pattern, warnings)
            }
        };
    }

    added
}

/// Compile a glob pattern, downgrading a malformed one to match-nothing with
/// a warning rather than failing the run.
fn compile(pattern: &str, warnings: &mut Vec<String>) -> Option<Pattern> {
    match Pattern::new(pattern) {
        Ok(p) => Some(p),
        Err(err) => {
            warnings.push(format!("invalid rule pattern `{pattern}`: {err}"));
            None
        }
    }
}

/// `class Child(Base)` — child inherits from each matching base. Bases that
/// resolve outside the project link to the external node the resolver
/// materialized for them.
fn apply_inherit(
    graph: &mut GraphStore,
    table: &SymbolTable,
    records: &[FileRecord],
    base_pattern: Option<&str>,
    warnings: &mut Vec<String>,
) -> usize {
    let pattern = match base_pattern {
        Some(p) => match compile(p, warnings) {
            Some(p) => Some(p),
            None => return 0,
        },
        None => None,
    };

    let mut added = 0;
    for record in records {
        for def in record.defs.iter().filter(|d| d.kind == DefKind::Class) {
            let child = format!("{}.{}", record.module, def.local_path);
            for base in &def.bases {
                let resolved = table.resolve(&record.module, base);
                if let Some(ref p) = pattern
                    && !p.matches(&resolved)
                {
                    continue;
                }
                let target = table
                    .resolve_component(&record.module, base)
                    .unwrap_or(resolved);
                if target == child {
                    continue;
                }
                if graph.add_edge_by_name(&child, &target, EdgeKind::Inherits) {
                    added += 1;
                }
            }
        }
    }
    added
}

/// `@decorator` — the decorator's owning component decorates the definition.
fn apply_decorate(
    graph: &mut GraphStore,
    table: &SymbolTable,
    records: &[FileRecord],
    callee_pattern: &str,
    warnings: &mut Vec<String>,
) -> usize {
    let Some(pattern) = compile(callee_pattern, warnings) else {
        return 0;
    };

    let mut added = 0;
    for record in records {
        for def in &record.defs {
            let decorated = format!("{}.{}", record.module, def.local_path);
            for decorator in &def.decorators {
                let resolved = table.resolve(&record.module, decorator);
                if !pattern.matches(&resolved) {
                    continue;
                }

                // `@app.route(...)` and friends register on the receiver.
                let owner_fqn = match resolved.rsplit_once('.') {
                    Some((receiver, last)) if RECEIVER_DECORATORS.contains(&last) => {
                        receiver.to_string()
                    }
                    _ => resolved,
                };

                let Some(owner) = table.component_of_fqn(&owner_fqn) else {
                    continue;
                };
                if owner == decorated {
                    continue;
                }
                if graph.add_edge_by_name(&owner, &decorated, EdgeKind::Decorates) {
                    added += 1;
                }
            }
        }
    }
    added
}

/// `x = Factory(target)` — the binding proxies the target it wraps.
fn apply_proxy(
    graph: &mut GraphStore,
    table: &SymbolTable,
    records: &[FileRecord],
    factory_pattern: &str,
    warnings: &mut Vec<String>,
) -> usize {
    let Some(pattern) = compile(factory_pattern, warnings) else {
        return 0;
    };

    let mut added = 0;
    for record in records {
        for assign in &record.assigns {
            let AssignValue::Call { callee, args } = &assign.value else {
                continue;
            };
            if !pattern.matches(&table.resolve(&record.module, callee)) {
                continue;
            }
            let Some(proxy) = binding_or_scope(table, record, assign) else {
                continue;
            };
            let Some(first_arg) = args.first() else {
                continue;
            };
            let Some(target) = table.resolve_component(&record.module, first_arg) else {
                continue;
            };
            if proxy == target {
                continue;
            }
            if graph.add_edge_by_name(&proxy, &target, EdgeKind::Proxies) {
                added += 1;
            }
        }
    }
    added
}

/// Class-body collections of known components register their elements.
fn apply_register(graph: &mut GraphStore, table: &SymbolTable, records: &[FileRecord]) -> usize {
    let mut added = 0;
    for record in records {
        for collection in &record.collections {
            let registrar = format!("{}.{}", record.module, collection.class_path);
            if !table.is_definition(&registrar) {
                continue;
            }
            for element in &collection.elements {
                let Some(target) = table.resolve_component(&record.module, element) else {
                    continue;
                };
                if target == registrar {
                    continue;
                }
                if graph.add_edge_by_name(&registrar, &target, EdgeKind::Registers) {
                    added += 1;
                }
            }
        }
    }
    added
}

/// Calls matching the injection pattern bind their component arguments into
/// the calling component.
fn apply_inject(
    graph: &mut GraphStore,
    table: &SymbolTable,
    records: &[FileRecord],
    callee_pattern: &str,
    warnings: &mut Vec<String>,
) -> usize {
    let Some(pattern) = compile(callee_pattern, warnings) else {
        return 0;
    };

    let mut added = 0;
    for record in records {
        for call in &record.calls {
            if !pattern.matches(&table.resolve(&record.module, &call.callee)) {
                continue;
            }
            let Some(source) = table.component_of_scope(&record.module, &call.scope) else {
                continue;
            };
            for arg in &call.name_args {
                let Some(target) = table.resolve_component(&record.module, arg) else {
                    continue;
                };
                if target == source {
                    continue;
                }
                if graph.add_edge_by_name(&source, &target, EdgeKind::Injects) {
                    added += 1;
                }
            }
        }
    }
    added
}

/// Factory-style calls dispatching on a known class emit a labeled `Uses`
/// edge — the strategy is selected, not constructed inline.
fn apply_strategy(
    graph: &mut GraphStore,
    table: &SymbolTable,
    records: &[FileRecord],
    callee_pattern: &str,
    warnings: &mut Vec<String>,
) -> usize {
    let Some(pattern) = compile(callee_pattern, warnings) else {
        return 0;
    };

    let mut added = 0;
    for record in records {
        for call in &record.calls {
            if !pattern.matches(&table.resolve(&record.module, &call.callee)) {
                continue;
            }
            let Some(source) = table.component_of_scope(&record.module, &call.scope) else {
                continue;
            };
            for arg in &call.name_args {
                let Some(target) = table.resolve_component(&record.module, arg) else {
                    continue;
                };
                if !table.is_class(&target) || target == source {
                    continue;
                }
                let edge = EdgeKind::Uses {
                    label: Some("strategy".to_string()),
                };
                if graph.add_edge_by_name(&source, &target, edge) {
                    added += 1;
                }
            }
        }
    }
    added
}

/// The node an assignment belongs to: the module-level binding it creates,
/// or the enclosing component for nested assignments.
fn binding_or_scope(
    table: &SymbolTable,
    record: &FileRecord,
    assign: &crate::parser::facts::AssignFact,
) -> Option<String> {
    if assign.is_top_level() && !assign.target.contains('.') {
        let fqn = format!("{}.{}", record.module, assign.target);
        if table.is_definition(&fqn) {
            return Some(fqn);
        }
    }
    table.component_of_scope(&record.module, &assign.scope)
}
