use std::path::Path;

use crate::cache::CacheStore;
use crate::config::AnalysisConfig;
use crate::dispatch;
use crate::error::{AnalysisError, ParseFailure};
use crate::graph::GraphStore;
use crate::layout::{self, ResolutionContext};
use crate::rank::{self, RankedNode};
use crate::resolver::{self, SymbolTable};
use crate::semantic;
use crate::walker;

/// Aggregated outcome of one analysis run: counts plus the non-fatal
/// warnings collected at every component boundary. A run always completes
/// with best-effort results and this report, unless a project-level
/// precondition was violated.
#[derive(Debug, Default)]
pub struct RunReport {
    pub files_total: usize,
    pub cache_hits: usize,
    pub parse_failures: Vec<ParseFailure>,
    pub warnings: Vec<String>,
}

/// One analysis run's state: the graph, the symbol table, the resolution
/// context, and the run report — passed explicitly through the pipeline
/// instead of living in ambient globals.
#[derive(Debug)]
pub struct AnalysisSession {
    pub config: AnalysisConfig,
    pub context: ResolutionContext,
    pub graph: GraphStore,
    pub table: SymbolTable,
    pub report: RunReport,
}

impl AnalysisSession {
    /// Ranked entry-point recommendations for this session's graph.
    pub fn recommend(&self) -> Vec<RankedNode> {
        rank::recommend(&self.graph, &self.config.ranking)
    }
}

/// Run the full analysis pipeline against a project root.
///
/// Phases, in order: layout detection, file discovery, cache-assisted
/// parallel parsing (map), symbol/alias resolution (reduce), semantic link
/// extraction. The map phase runs on the rayon pool with stateless workers;
/// everything after the merge is single-threaded against one graph.
pub fn analyze(project_root: &Path, config: AnalysisConfig) -> Result<AnalysisSession, AnalysisError> {
    let context = layout::detect(project_root, config.root_package.as_deref())?;

    let files = walker::collect_source_files(&context, &config);
    if files.is_empty() {
        return Err(AnalysisError::NoFilesFound {
            root: project_root.to_path_buf(),
        });
    }
    tracing::info!("discovered {} Python files under {}", files.len(), context.source_root.display());

    let mut cache = CacheStore::open(project_root, &config.fingerprint());
    let outcome = dispatch::parse_all(
        &files,
        &context,
        &mut cache,
        config.limits.max_parse_failure_ratio,
    )?;
    cache.prune(&files);
    if let Err(err) = cache.save() {
        tracing::warn!("failed to persist cache: {err}");
    }

    let mut warnings: Vec<String> = outcome
        .failures
        .iter()
        .map(|f| f.to_string())
        .collect();

    let resolution = resolver::resolve(&outcome.records, &context, &mut warnings);
    let mut graph = resolution.graph;
    let semantic_stats =
        semantic::apply(&mut graph, &resolution.table, &outcome.records, &config, &mut warnings);
    tracing::debug!(
        "semantic pass: ioc={} flow={} dynamic={}",
        semantic_stats.ioc_edges,
        semantic_stats.flow_edges,
        semantic_stats.dynamic_edges
    );

    Ok(AnalysisSession {
        context,
        graph,
        table: resolution.table,
        report: RunReport {
            files_total: files.len(),
            cache_hits: outcome.cache_hits,
            parse_failures: outcome.failures,
            warnings,
        },
        config,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::edge::EdgeKind;
    use std::fs;
    use std::path::PathBuf;

    fn write(path: &PathBuf, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    /// The three-module scenario: a defines Service, b subclasses it,
    /// c instantiates the subclass at top level.
    fn scenario_project(root: &Path) {
        write(&root.join("app/__init__.py"), "");
        write(&root.join("app/a.py"), "class Service:\n    pass\n");
        write(
            &root.join("app/b.py"),
            "from app.a import Service\n\n\nclass SubService(Service):\n    pass\n",
        );
        write(
            &root.join("app/c.py"),
            "from app.b import SubService\n\nsvc = SubService()\n",
        );
    }

    #[test]
    fn test_full_pipeline_scenario_edges() {
        let dir = tempfile::tempdir().unwrap();
        scenario_project(dir.path());

        let session = analyze(dir.path(), AnalysisConfig::default()).unwrap();
        let edges = session.graph.sorted_edges();

        assert!(
            edges.iter().any(|(s, t, k)| {
                s == "app.b.SubService" && t == "app.a.Service" && *k == EdgeKind::Inherits
            }),
            "expected app.b.SubService --inherits--> app.a.Service, got {edges:?}"
        );
        assert!(
            edges.iter().any(|(s, t, k)| {
                s == "app.c.svc" && t == "app.b.SubService" && *k == EdgeKind::ConceptFlow
            }),
            "expected app.c.svc --concept-flow--> app.b.SubService, got {edges:?}"
        );
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        scenario_project(dir.path());

        let first = analyze(dir.path(), AnalysisConfig::default()).unwrap();
        let second = analyze(dir.path(), AnalysisConfig::default()).unwrap();

        assert_eq!(first.graph.sorted_edges(), second.graph.sorted_edges());
        let names = |s: &AnalysisSession| -> Vec<String> {
            s.graph
                .sorted_nodes()
                .into_iter()
                .map(|i| s.graph.node(i).qualified_name.clone())
                .collect()
        };
        assert_eq!(names(&first), names(&second));
        let ranks = |s: &AnalysisSession| -> Vec<String> {
            s.recommend().into_iter().map(|r| r.qualified_name).collect()
        };
        assert_eq!(ranks(&first), ranks(&second));
        assert_eq!(
            second.report.cache_hits, second.report.files_total,
            "an unchanged rerun is served entirely from cache"
        );
    }

    #[test]
    fn test_invalid_file_among_valid_ones() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("app/__init__.py"), "");
        for i in 0..9 {
            write(
                &dir.path().join(format!("app/m{i}.py")),
                &format!("def f{i}():\n    pass\n"),
            );
        }
        write(&dir.path().join("app/broken.py"), "def broken(:\n");

        let session = analyze(dir.path(), AnalysisConfig::default()).unwrap();
        assert_eq!(session.report.parse_failures.len(), 1);
        assert!(session.report.parse_failures[0].path.ends_with("broken.py"));
        assert!(
            session.report.warnings.iter().any(|w| w.contains("broken.py")),
            "the warning list names the bad file"
        );
        // Nine valid modules plus the package init resolved into the graph.
        assert!(session.graph.contains("app.m0"));
        assert!(session.graph.contains("app.m8"));
        assert!(!session.graph.contains("app.broken"));
    }

    #[test]
    fn test_config_change_invalidates_cache() {
        let dir = tempfile::tempdir().unwrap();
        scenario_project(dir.path());

        let first = analyze(dir.path(), AnalysisConfig::default()).unwrap();
        assert_eq!(first.report.cache_hits, 0);

        let mut changed = AnalysisConfig::default();
        changed.concept_flow.max_depth = 5;
        let second = analyze(dir.path(), changed).unwrap();
        assert_eq!(
            second.report.cache_hits, 0,
            "a fingerprint change must reparse every file"
        );
    }

    #[test]
    fn test_empty_project_fails() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("app")).unwrap();
        std::fs::write(dir.path().join("app/__init__.py"), "").unwrap();
        std::fs::remove_file(dir.path().join("app/__init__.py")).unwrap();
        let err = analyze(dir.path(), AnalysisConfig::default()).unwrap_err();
        assert!(matches!(err, AnalysisError::LayoutAmbiguous { .. }));
    }
}
