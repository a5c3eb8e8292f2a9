mod cache;
mod cli;
mod config;
mod dispatch;
mod error;
mod export;
mod graph;
mod layout;
mod parser;
mod rank;
mod resolver;
mod semantic;
mod session;
mod walker;

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Result, bail};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, ExportFormat};
use config::AnalysisConfig;
use graph::node::NodeKind;
use rank::subgraph::{self, FocusOutcome};
use session::AnalysisSession;

fn main() -> Result<()> {
    // Logs go to stderr so stdout stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze { path, json } => {
            let session = run_analysis(&path)?;
            print_summary(&session, json);
        }

        Commands::Rank { path, top, json } => {
            let session = run_analysis(&path)?;
            let ranked = session.recommend();
            let shown = &ranked[..ranked.len().min(top)];
            if json {
                println!("{}", serde_json::to_string_pretty(shown)?);
            } else {
                for (position, entry) in shown.iter().enumerate() {
                    println!(
                        "{:>3}. {}  score={:.5} out={}",
                        position + 1,
                        entry.qualified_name,
                        entry.score,
                        entry.out_degree
                    );
                }
            }
        }

        Commands::Focus {
            path,
            entries,
            depth,
            format,
        } => {
            let session = run_analysis(&path)?;
            let depth = depth.unwrap_or(session.config.limits.focus_depth);
            let outcome = subgraph::focus(
                &session.graph,
                &entries,
                depth,
                session.config.limits.max_focus_nodes,
            );
            let result = match outcome {
                FocusOutcome::Subgraph(result) => result,
                FocusOutcome::TooLarge { node_count, ceiling } => {
                    bail!(
                        "focus subgraph too large: {node_count} nodes exceed the {ceiling}-node \
                         ceiling even at depth 0; narrow the entry set"
                    );
                }
            };
            for missing in &result.missing_entries {
                tracing::warn!("entry `{missing}` does not exist in the graph");
            }
            let subset: HashSet<String> = result.nodes.iter().cloned().collect();
            match format {
                ExportFormat::Dot => {
                    print!("{}", export::dot::render_dot(&session.graph, Some(&subset), "archgraph_focus"));
                }
                ExportFormat::Json => {
                    let dump = export::build_dump(&session.graph, Some(&subset));
                    let payload = serde_json::json!({
                        "depth_used": result.depth_used,
                        "missing_entries": result.missing_entries,
                        "graph": dump,
                    });
                    println!("{}", serde_json::to_string_pretty(&payload)?);
                }
            }
        }

        Commands::Export {
            path,
            format,
            output,
            full,
        } => {
            let session = run_analysis(&path)?;

            // Smart degradation: an oversized whole-graph export falls back
            // to a focus subgraph around the top-ranked entry point.
            let mut subset: Option<HashSet<String>> = None;
            if !full
                && let Some(plan) =
                    subgraph::degradation_plan(&session.graph, &session.recommend(), &session.config.limits)
            {
                tracing::warn!(
                    "graph has {} nodes (ceiling {}); degrading to focus on `{}` at depth {} — pass --full to override",
                    plan.graph_nodes,
                    plan.ceiling,
                    plan.entry,
                    plan.depth
                );
                match subgraph::focus(
                    &session.graph,
                    std::slice::from_ref(&plan.entry),
                    plan.depth,
                    session.config.limits.max_render_nodes,
                ) {
                    FocusOutcome::Subgraph(result) => {
                        subset = Some(result.nodes.into_iter().collect());
                    }
                    FocusOutcome::TooLarge { .. } => {
                        bail!("graph too dense to degrade automatically; use `focus` with explicit entries");
                    }
                }
            }

            let rendered = match format {
                ExportFormat::Dot => {
                    export::dot::render_dot(&session.graph, subset.as_ref(), "archgraph")
                }
                ExportFormat::Json => {
                    let dump = export::build_dump(&session.graph, subset.as_ref());
                    serde_json::to_string_pretty(&dump)?
                }
            };

            match output {
                Some(file) => {
                    std::fs::write(&file, rendered)?;
                    eprintln!("wrote {}", file.display());
                }
                None => print!("{rendered}"),
            }
        }
    }

    Ok(())
}

fn run_analysis(path: &Path) -> Result<AnalysisSession> {
    let config = AnalysisConfig::load(path);
    Ok(session::analyze(path, config)?)
}

fn print_summary(session: &AnalysisSession, json: bool) {
    let graph = &session.graph;
    let report = &session.report;

    if json {
        let mut edges_by_kind: Vec<(&str, usize)> = graph.edges_by_kind().into_iter().collect();
        edges_by_kind.sort();
        let payload = serde_json::json!({
            "file_count": report.files_total,
            "cache_hits": report.cache_hits,
            "node_count": graph.node_count(),
            "edge_count": graph.edge_count(),
            "edges_by_kind": edges_by_kind.into_iter().collect::<std::collections::BTreeMap<_, _>>(),
            "parse_failures": report.parse_failures.iter().map(|f| f.path.display().to_string()).collect::<Vec<_>>(),
            "warnings": report.warnings,
        });
        println!("{}", serde_json::to_string_pretty(&payload).expect("summary serializes"));
        return;
    }

    println!(
        "Analyzed {} file(s) ({} from cache, {} failed).",
        report.files_total,
        report.cache_hits,
        report.parse_failures.len()
    );
    println!(
        "Graph: {} nodes ({} modules, {} classes, {} functions, {} bindings, {} external), {} edges.",
        graph.node_count(),
        graph.count_kind(NodeKind::Module),
        graph.count_kind(NodeKind::Class),
        graph.count_kind(NodeKind::Function),
        graph.count_kind(NodeKind::Binding),
        graph.count_kind(NodeKind::ExternalSymbol),
        graph.edge_count()
    );
    let mut by_kind: Vec<(&str, usize)> = graph.edges_by_kind().into_iter().collect();
    by_kind.sort();
    for (kind, count) in by_kind {
        println!("  {kind}: {count}");
    }
    if !report.warnings.is_empty() {
        eprintln!("{} warning(s):", report.warnings.len());
        for warning in &report.warnings {
            eprintln!("  {warning}");
        }
    }
}
