use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;

use crate::graph::GraphStore;
use crate::graph::edge::EdgeKind;
use crate::graph::node::{ArchNode, NodeKind, is_public_name};
use crate::layout::ResolutionContext;
use crate::parser::FileRecord;
use crate::parser::imports::ImportFact;
use crate::parser::symbols::DefKind;

/// Cross-file qualified-name lookup built by the resolver and consumed by the
/// semantic link engine.
#[derive(Debug, Default)]
pub struct SymbolTable {
    /// module -> local binding name -> fully qualified target.
    aliases: HashMap<String, HashMap<String, String>>,
    /// All internal module paths.
    modules: BTreeSet<String>,
    /// All internal component names: classes, functions, and bindings.
    definitions: BTreeSet<String>,
    /// The subset of definitions that are classes.
    classes: BTreeSet<String>,
}

impl SymbolTable {
    pub fn is_class(&self, qualified_name: &str) -> bool {
        self.classes.contains(qualified_name)
    }

    pub fn is_definition(&self, qualified_name: &str) -> bool {
        self.definitions.contains(qualified_name)
    }

    /// Resolve a raw dotted name as written in `module` to a fully qualified
    /// name, applying the module's import aliases and local definitions.
    /// Names that resolve nowhere come back unchanged (external references
    /// keep their written path).
    pub fn resolve(&self, module: &str, raw: &str) -> String {
        let (first, rest) = match raw.split_once('.') {
            Some((f, r)) => (f, Some(r)),
            None => (raw, None),
        };

        if let Some(target) = self.aliases.get(module).and_then(|m| m.get(first)) {
            return match rest {
                Some(rest) => format!("{target}.{rest}"),
                None => target.clone(),
            };
        }

        let local = format!("{module}.{first}");
        if self.definitions.contains(&local) || self.modules.contains(&local) {
            return format!("{module}.{raw}");
        }

        raw.to_string()
    }

    /// Resolve a raw name to the internal component that owns it: the longest
    /// known prefix of the resolved name (a class absorbs its methods and
    /// attributes, a module absorbs loose names). `None` for external names.
    pub fn resolve_component(&self, module: &str, raw: &str) -> Option<String> {
        self.component_of_fqn(&self.resolve(module, raw))
    }

    /// The owning component of an already fully qualified name.
    pub fn component_of_fqn(&self, fqn: &str) -> Option<String> {
        let parts: Vec<&str> = fqn.split('.').collect();
        for end in (1..=parts.len()).rev() {
            let prefix = parts[..end].join(".");
            if self.definitions.contains(&prefix) {
                return Some(prefix);
            }
        }
        for end in (1..=parts.len()).rev() {
            let prefix = parts[..end].join(".");
            if self.modules.contains(&prefix) {
                return Some(prefix);
            }
        }
        None
    }

    /// The component owning a definition scope inside `module`
    /// (`""` resolves to the module itself).
    pub fn component_of_scope(&self, module: &str, scope: &str) -> Option<String> {
        if scope.is_empty() {
            return self.modules.contains(module).then(|| module.to_string());
        }
        self.resolve_component(module, scope)
    }
}

/// Statistics collected during the resolution pipeline.
#[derive(Debug, Default)]
pub struct ResolveStats {
    pub modules: usize,
    pub definitions: usize,
    pub bindings: usize,
    pub external_nodes: usize,
    pub import_edges: usize,
    pub uses_edges: usize,
    pub conflicts: usize,
}

/// The resolver's output: the initial graph (all nodes, plus `Imports` and
/// `Uses` edges where directly observable) and the qualified-name table.
pub struct Resolution {
    pub graph: GraphStore,
    pub table: SymbolTable,
    pub stats: ResolveStats,
}

/// Merge path-sorted file records into one cross-file symbol table and the
/// initial graph.
///
/// This is the single place nodes are created. Deterministic: identical
/// records produce an identical node and edge set; when two files claim the
/// same qualified name, the first in sorted-path order wins and a
/// `ResolutionConflict` warning is recorded.
pub fn resolve(
    records: &[FileRecord],
    ctx: &ResolutionContext,
    warnings: &mut Vec<String>,
) -> Resolution {
    let mut graph = GraphStore::new();
    let mut table = SymbolTable::default();
    let mut stats = ResolveStats::default();

    // Public top-level names per module, for wildcard expansion.
    let mut public_names: BTreeMap<String, Vec<String>> = BTreeMap::new();
    // First definition site per qualified name, for conflict reporting.
    let mut def_sources: HashMap<String, PathBuf> = HashMap::new();
    // Which file owns each module path; later claimants are skipped entirely.
    let mut module_owner: HashMap<String, PathBuf> = HashMap::new();

    // -----------------------------------------------------------------------
    // Step 1: register every module, definition, and top-level binding.
    // -----------------------------------------------------------------------
    for record in records {
        let module = &record.module;

        if table.modules.contains(module) {
            stats.conflicts += 1;
            warnings.push(format!(
                "resolution conflict: module `{module}` also claimed by {}; keeping first",
                record.path.display()
            ));
            continue;
        }
        table.modules.insert(module.clone());
        module_owner.insert(module.clone(), record.path.clone());
        graph.add_node(ArchNode {
            qualified_name: module.clone(),
            kind: NodeKind::Module,
            module: module.clone(),
            is_public: is_public_name(module),
            is_external: false,
            summary: record.summary.clone(),
            layer: layer_of(module, ctx),
        });
        stats.modules += 1;

        let exported = public_names.entry(module.clone()).or_default();

        for def in &record.defs {
            let fqn = format!("{module}.{}", def.local_path);
            if let Some(first) = def_sources.get(&fqn) {
                stats.conflicts += 1;
                warnings.push(format!(
                    "resolution conflict: `{fqn}` defined in both {} and {}; keeping first",
                    first.display(),
                    record.path.display()
                ));
                continue;
            }
            def_sources.insert(fqn.clone(), record.path.clone());
            table.definitions.insert(fqn.clone());
            if def.kind == DefKind::Class {
                table.classes.insert(fqn.clone());
            }
            if def.is_public && !def.local_path.contains('.') {
                exported.push(def.local_path.clone());
            }
            graph.add_node(ArchNode {
                qualified_name: fqn.clone(),
                kind: match def.kind {
                    DefKind::Class => NodeKind::Class,
                    DefKind::Function => NodeKind::Function,
                },
                module: module.clone(),
                is_public: is_public_name(&fqn),
                is_external: false,
                summary: def.summary.clone(),
                layer: layer_of(module, ctx),
            });
            stats.definitions += 1;
        }

        for assign in record.assigns.iter().filter(|a| a.is_top_level()) {
            if assign.target.contains('.') {
                continue; // attribute targets belong to their object
            }
            let fqn = format!("{module}.{}", assign.target);
            if table.definitions.contains(&fqn) {
                continue; // a def with this name wins over a binding
            }
            table.definitions.insert(fqn.clone());
            if !assign.target.starts_with('_') {
                exported.push(assign.target.clone());
            }
            graph.add_node(ArchNode {
                qualified_name: fqn,
                kind: NodeKind::Binding,
                module: module.clone(),
                is_public: !assign.target.starts_with('_') && is_public_name(module),
                is_external: false,
                summary: None,
                layer: layer_of(module, ctx),
            });
            stats.bindings += 1;
        }
    }

    // -----------------------------------------------------------------------
    // Step 2: build per-module alias tables (relative, aliased, wildcard).
    // -----------------------------------------------------------------------
    for record in records {
        let module = &record.module;
        if module_owner.get(module) != Some(&record.path) {
            continue; // lost the module-path conflict in step 1
        }
        let mut aliases: HashMap<String, String> = HashMap::new();

        for import in &record.imports {
            match import {
                ImportFact::Module { module: target, alias, .. } => {
                    match alias {
                        Some(alias) => {
                            aliases.insert(alias.clone(), target.clone());
                        }
                        None => {
                            // `import x.y` binds the top-level name `x`.
                            let first = target.split('.').next().unwrap_or(target);
                            aliases.insert(first.to_string(), first.to_string());
                        }
                    }
                }
                ImportFact::From { module: target, level, names, wildcard, .. } => {
                    let Some(base) = resolve_import_base(record, target, *level) else {
                        continue;
                    };
                    if *wildcard {
                        if let Some(exported) = public_names.get(&base) {
                            for name in exported {
                                aliases.insert(name.clone(), format!("{base}.{name}"));
                            }
                        }
                        continue;
                    }
                    for imported in names {
                        let local = imported.alias.as_ref().unwrap_or(&imported.name);
                        aliases.insert(local.clone(), format!("{base}.{}", imported.name));
                    }
                }
            }
        }

        table.aliases.insert(module.clone(), aliases);
    }

    // -----------------------------------------------------------------------
    // Step 3: import edges, external materialization, and uses edges.
    // -----------------------------------------------------------------------
    for record in records {
        let module = &record.module;
        if module_owner.get(module) != Some(&record.path) {
            continue;
        }
        let Some(module_idx) = graph.index_of(module) else {
            continue;
        };

        for import in &record.imports {
            let target_module = match import {
                ImportFact::Module { module: target, .. } => Some(target.clone()),
                ImportFact::From { module: target, level, .. } => {
                    resolve_import_base(record, target, *level)
                }
            };
            let Some(target_module) = target_module else {
                continue;
            };
            if target_module == *module {
                continue;
            }

            if table.modules.contains(&target_module) {
                let target_idx = graph.index_of(&target_module).expect("internal module node");
                if graph.add_edge(module_idx, target_idx, EdgeKind::Imports) {
                    stats.import_edges += 1;
                }
            } else if !is_internal_prefix(&target_module, ctx) {
                // Unresolvable imports become external nodes rather than
                // being dropped — third-party connectivity is preserved.
                let target_idx = ensure_external(&mut graph, &target_module, &mut stats);
                if graph.add_edge(module_idx, target_idx, EdgeKind::Imports) {
                    stats.import_edges += 1;
                }
            }
            // Internal-looking modules with no record (namespace gaps) get no
            // fabricated node and no edge.
        }

        // Materialize external base classes so the semantic engine can link
        // inheritance to third-party dependencies without creating nodes.
        for def in record.defs.iter().filter(|d| d.kind == DefKind::Class) {
            for base in &def.bases {
                let fqn = table.resolve(module, base);
                if table.resolve_component(module, base).is_none() && !is_internal_prefix(&fqn, ctx)
                {
                    ensure_external(&mut graph, &fqn, &mut stats);
                }
            }
        }

        // Directly observable uses: call sites whose callee resolves to an
        // internal component.
        for call in &record.calls {
            let Some(source) = table.component_of_scope(module, &call.scope) else {
                continue;
            };
            let Some(target) = table.resolve_component(module, &call.callee) else {
                continue;
            };
            if source == target {
                continue;
            }
            if graph.add_edge_by_name(&source, &target, EdgeKind::Uses { label: None }) {
                stats.uses_edges += 1;
            }
        }
    }

    tracing::info!(
        "resolved {} modules, {} definitions, {} bindings ({} import edges, {} uses edges, {} external nodes)",
        stats.modules,
        stats.definitions,
        stats.bindings,
        stats.import_edges,
        stats.uses_edges,
        stats.external_nodes
    );

    Resolution { graph, table, stats }
}

/// Resolve a `from` import's base module against the owning module's path.
/// `None` when the relative level climbs past the package root.
fn resolve_import_base(record: &FileRecord, target: &str, level: usize) -> Option<String> {
    if level == 0 {
        return Some(target.to_string());
    }
    let mut package: Vec<&str> = record.module.split('.').collect();
    if !record.is_package_init {
        package.pop();
    }
    for _ in 1..level {
        package.pop()?;
        if package.is_empty() {
            return None;
        }
    }
    if target.is_empty() {
        return Some(package.join("."));
    }
    if package.is_empty() {
        return Some(target.to_string());
    }
    Some(format!("{}.{target}", package.join(".")))
}

/// Whether a dotted name lives under one of the project's root packages
/// (and therefore must never be materialized as an external node).
fn is_internal_prefix(name: &str, ctx: &ResolutionContext) -> bool {
    let first = name.split('.').next().unwrap_or(name);
    ctx.root_packages.iter().any(|p| p == first)
}

fn ensure_external(graph: &mut GraphStore, name: &str, stats: &mut ResolveStats) -> petgraph::stable_graph::NodeIndex {
    if let Some(idx) = graph.index_of(name) {
        return idx;
    }
    stats.external_nodes += 1;
    graph.add_node(ArchNode::external(name))
}

/// Architectural layer tag: the first sub-package segment under the root
/// package (`myapp.core.cache` -> `core`).
fn layer_of(module: &str, ctx: &ResolutionContext) -> Option<String> {
    let mut parts = module.split('.');
    let first = parts.next()?;
    if !ctx.root_packages.iter().any(|p| p == first) {
        return None;
    }
    parts.next().map(str::to_string)
}
