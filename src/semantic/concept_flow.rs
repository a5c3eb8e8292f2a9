use std::collections::{BTreeMap, BTreeSet};

use glob::Pattern;

use crate::config::FlowConfig;
use crate::graph::GraphStore;
use crate::graph::edge::EdgeKind;
use crate::parser::FileRecord;
use crate::parser::facts::AssignValue;
use crate::resolver::SymbolTable;

/// Concept-flow pass: track flagged object instances through assignments and
/// parameter passing, emitting `ConceptFlow` edges from each holder to the
/// tracked value it receives (`c.svc --flow--> b.SubService`).
///
/// Seeds come from the configuration plus auto-discovery (a module-top-level
/// name bound to a direct instantiation of a project class). Propagation is
/// an explicit worklist fixed-point bounded by `max_depth` rounds, so cyclic
/// reference structures always terminate.
pub fn propagate(
    graph: &mut GraphStore,
    table: &SymbolTable,
    records: &[FileRecord],
    config: &FlowConfig,
    warnings: &mut Vec<String>,
) -> usize {
    let seeds = discover_seeds(table, records, config, warnings);
    if seeds.is_empty() {
        tracing::debug!("concept-flow: no seeds to track");
        return 0;
    }
    tracing::debug!("concept-flow: tracking {} seeds", seeds.len());

    let mut edges_added = 0;

    // Seed bindings point at the class they instantiate, and that class is
    // tracked too: every holder of a SubService instance ultimately chains
    // back to SubService itself.
    let mut tracked: BTreeSet<String> = BTreeSet::new();
    for (seed, origin) in &seeds {
        tracked.insert(seed.clone());
        if let Some(class) = origin {
            tracked.insert(class.clone());
            if graph.add_edge_by_name(seed, class, EdgeKind::ConceptFlow) {
                edges_added += 1;
            }
        }
    }

    for round in 1..=config.max_depth {
        // BTreeSet keeps discovery order deterministic across runs.
        let mut discovered: BTreeSet<String> = BTreeSet::new();

        for record in records {
            let module = &record.module;

            for assign in &record.assigns {
                let sources: Vec<&String> = match &assign.value {
                    AssignValue::Name(name) => vec![name],
                    AssignValue::Call { callee, args } => {
                        let mut v = vec![callee];
                        v.extend(args.iter());
                        v
                    }
                };

                let Some(concept) = sources
                    .iter()
                    .find_map(|raw| tracked_source(table, module, raw, &tracked))
                else {
                    continue;
                };

                let Some(holder) = assign_target(table, record, assign) else {
                    continue;
                };
                if holder == concept {
                    continue;
                }
                if graph.add_edge_by_name(&holder, &concept, EdgeKind::ConceptFlow) {
                    edges_added += 1;
                }
                if !tracked.contains(&holder) {
                    discovered.insert(holder);
                }
            }

            // Parameter passing: the callee receiving a tracked instance
            // becomes a holder of it.
            for call in &record.calls {
                let Some(concept) = call
                    .name_args
                    .iter()
                    .find_map(|raw| tracked_source(table, module, raw, &tracked))
                else {
                    continue;
                };
                let Some(holder) = table.resolve_component(module, &call.callee) else {
                    continue;
                };
                if holder == concept {
                    continue;
                }
                if graph.add_edge_by_name(&holder, &concept, EdgeKind::ConceptFlow) {
                    edges_added += 1;
                }
                if !tracked.contains(&holder) {
                    discovered.insert(holder);
                }
            }
        }

        if discovered.is_empty() {
            tracing::debug!("concept-flow: stable after {round} round(s)");
            break;
        }
        if round == config.max_depth {
            warnings.push(format!(
                "concept-flow propagation hit the depth bound ({}); results may be incomplete",
                config.max_depth
            ));
            break;
        }
        tracked.extend(discovered);
    }

    edges_added
}

/// Seed set: explicit names plus auto-discovered top-level instantiations of
/// project classes, minus the exclude patterns. The value is the instantiated
/// class for auto-discovered seeds (their flow origin), `None` for explicit
/// seeds.
fn discover_seeds(
    table: &SymbolTable,
    records: &[FileRecord],
    config: &FlowConfig,
    warnings: &mut Vec<String>,
) -> BTreeMap<String, Option<String>> {
    let mut seeds: BTreeMap<String, Option<String>> = BTreeMap::new();

    for seed in &config.seeds {
        if table.is_definition(seed) {
            seeds.insert(seed.clone(), None);
        } else {
            warnings.push(format!("configured concept-flow seed `{seed}` does not exist"));
        }
    }

    if config.auto_discover {
        for record in records {
            for assign in record.assigns.iter().filter(|a| a.is_top_level()) {
                if assign.target.contains('.') {
                    continue;
                }
                let AssignValue::Call { callee, .. } = &assign.value else {
                    continue;
                };
                // A direct instantiation of a known project class marks the
                // binding as a concept instance.
                let Some(class) = table.resolve_component(&record.module, callee) else {
                    continue;
                };
                if !table.is_class(&class) {
                    continue;
                }
                let fqn = format!("{}.{}", record.module, assign.target);
                if table.is_definition(&fqn) {
                    seeds.entry(fqn).or_insert(Some(class));
                }
            }
        }
    }

    let excludes: Vec<Pattern> = config
        .exclude_patterns
        .iter()
        .filter_map(|p| Pattern::new(p).ok())
        .collect();
    seeds.retain(|seed, _| !excludes.iter().any(|p| p.matches(seed)));

    seeds
}

/// Find the tracked instance referenced by a raw dotted name: the resolved
/// name itself or any dotted prefix of it (`svc.engine.run` flows from a
/// tracked `svc`).
fn tracked_source(
    table: &SymbolTable,
    module: &str,
    raw: &str,
    tracked: &BTreeSet<String>,
) -> Option<String> {
    let fqn = table.resolve(module, raw);
    let parts: Vec<&str> = fqn.split('.').collect();
    for end in (1..=parts.len()).rev() {
        let prefix = parts[..end].join(".");
        if tracked.contains(&prefix) {
            return Some(prefix);
        }
    }
    None
}

/// The node a flow lands on: the module-level binding the assignment
/// creates, or the enclosing component for nested assignments.
fn assign_target(
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{LayoutKind, ResolutionContext};
    use crate::parser::parse_file;
    use crate::resolver::{Resolution, resolve};
    use std::path::{Path, PathBuf};

    fn ctx() -> ResolutionContext {
        ResolutionContext {
            project_root: PathBuf::from("/proj"),
            source_root: PathBuf::from("/proj"),
            layout: LayoutKind::Flat,
            root_packages: vec!["app".to_string()],
        }
    }

    fn build(sources: &[(&str, &str)]) -> (Resolution, Vec<FileRecord>) {
        let mut records: Vec<FileRecord> = sources
            .iter()
            .map(|(rel, src)| {
                parse_file(Path::new(&format!("/proj/{rel}")), src.as_bytes(), &ctx()).unwrap()
            })
            .collect();
        records.sort_by(|a, b| a.path.cmp(&b.path));
        let mut warnings = Vec::new();
        let resolution = resolve(&records, &ctx(), &mut warnings);
        (resolution, records)
    }

    fn flow_edges(graph: &GraphStore) -> Vec<(String, String)> {
        graph
            .sorted_edges()
            .into_iter()
            .filter(|(_, _, k)| matches!(k, EdgeKind::ConceptFlow))
            .map(|(s, t, _)| (s, t))
            .collect()
    }

    #[test]
    fn test_auto_discovered_seed_flows_through_assignment() {
        let (mut res, records) = build(&[
            ("app/__init__.py", ""),
            ("app/b.py", "class SubService:\n    pass\n"),
            (
                "app/c.py",
                "from app.b import SubService\n\nsvc = SubService()\nhandle = svc\n",
            ),
        ]);
        let config = FlowConfig::default();
        let mut warnings = Vec::new();
        let added = propagate(&mut res.graph, &res.table, &records, &config, &mut warnings);
        assert!(added >= 1);
        let edges = flow_edges(&res.graph);
        assert!(
            edges.contains(&("app.c.handle".to_string(), "app.c.svc".to_string())),
            "the aliasing binding must point at the tracked instance, got {edges:?}"
        );
    }

    #[test]
    fn test_tracked_class_seed_links_instantiating_binding() {
        let (mut res, records) = build(&[
            ("app/__init__.py", ""),
            ("app/a.py", "class Service:\n    pass\n"),
            (
                "app/b.py",
                "from app.a import Service\n\nclass SubService(Service):\n    pass\n",
            ),
            (
                "app/c.py",
                "from app.b import SubService\n\nsvc = SubService()\n",
            ),
        ]);
        let config = FlowConfig {
            seeds: vec!["app.b.SubService".to_string()],
            auto_discover: false,
            ..Default::default()
        };
        let mut warnings = Vec::new();
        propagate(&mut res.graph, &res.table, &records, &config, &mut warnings);
        let edges = flow_edges(&res.graph);
        assert!(
            edges.contains(&("app.c.svc".to_string(), "app.b.SubService".to_string())),
            "expected c.svc --flow--> b.SubService, got {edges:?}"
        );
    }

    #[test]
    fn test_parameter_passing_flows_into_callee() {
        let (mut res, records) = build(&[
            ("app/__init__.py", ""),
            ("app/b.py", "class SubService:\n    pass\n"),
            ("app/runner.py", "def run(svc):\n    pass\n"),
            (
                "app/c.py",
                "from app.b import SubService\nfrom app.runner import run\n\nsvc = SubService()\nrun(svc)\n",
            ),
        ]);
        let config = FlowConfig::default();
        let mut warnings = Vec::new();
        propagate(&mut res.graph, &res.table, &records, &config, &mut warnings);
        let edges = flow_edges(&res.graph);
        assert!(
            edges.contains(&("app.runner.run".to_string(), "app.c.svc".to_string())),
            "parameter passing must add a flow edge to the callee, got {edges:?}"
        );
    }

    #[test]
    fn test_explicit_seed_and_exclude_patterns() {
        let (mut res, records) = build(&[
            ("app/__init__.py", ""),
            ("app/b.py", "class SubService:\n    pass\n"),
            (
                "app/c.py",
                "from app.b import SubService\n\n_private = SubService()\nalias = _private\n",
            ),
        ]);
        // The default `*._*` exclude drops the private auto-seed.
        let config = FlowConfig::default();
        let mut warnings = Vec::new();
        let added = propagate(&mut res.graph, &res.table, &records, &config, &mut warnings);
        assert_eq!(added, 0, "excluded seeds must not propagate");

        // An explicit seed overrides nothing — it is just another seed.
        let config = FlowConfig {
            seeds: vec!["app.c._private".to_string()],
            exclude_patterns: Vec::new(),
            ..Default::default()
        };
        let added = propagate(&mut res.graph, &res.table, &records, &config, &mut warnings);
        assert!(added >= 1);
    }

    #[test]
    fn test_missing_explicit_seed_warns() {
        let (mut res, records) = build(&[("app/__init__.py", ""), ("app/a.py", "x = 1\n")]);
        let config = FlowConfig {
            seeds: vec!["app.nowhere.thing".to_string()],
            auto_discover: false,
            ..Default::default()
        };
        let mut warnings = Vec::new();
        propagate(&mut res.graph, &res.table, &records, &config, &mut warnings);
        assert!(warnings.iter().any(|w| w.contains("app.nowhere.thing")));
    }

    #[test]
    fn test_cyclic_aliases_terminate() {
        let (mut res, records) = build(&[
            ("app/__init__.py", ""),
            ("app/b.py", "class SubService:\n    pass\n"),
            (
                "app/c.py",
                "from app.b import SubService\n\nsvc = SubService()\na = svc\nb = a\na = b\n",
            ),
        ]);
        let config = FlowConfig {
            max_depth: 3,
            ..Default::default()
        };
        let mut warnings = Vec::new();
        // Must return despite the a <-> b alias cycle.
        propagate(&mut res.graph, &res.table, &records, &config, &mut warnings);
    }
}
