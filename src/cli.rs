use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Architecture graph analyzer for Python codebases.
///
/// archgraph parses a project into a typed semantic graph — imports,
/// inheritance, decoration, proxying, registration, injection, concept flow —
/// and answers "where should I start reading" with centrality-ranked entry
/// points and bounded focus subgraphs.
#[derive(Parser, Debug)]
#[command(
    name = "archgraph",
    version,
    about,
    long_about = None,
    propagate_version = true,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for graph exports.
#[derive(Clone, Debug, ValueEnum, Default)]
pub enum ExportFormat {
    /// Graphviz DOT text, ready for an external layout engine.
    #[default]
    Dot,
    /// Structured JSON node/edge dump for programmatic consumption.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze a project: parse, resolve, extract semantic links, and print
    /// a run summary. Results are cached under `<root>/.archgraph/`.
    Analyze {
        /// Path to the project root to analyze.
        path: PathBuf,

        /// Output the summary as JSON instead of human-readable text.
        #[arg(long)]
        json: bool,
    },

    /// Recommend entry points: centrality-ranked components to read first.
    ///
    /// External, private, and test-path nodes are excluded from candidacy.
    Rank {
        /// Path to the project root to analyze and rank.
        path: PathBuf,

        /// Number of recommendations to print.
        #[arg(long, default_value_t = 10)]
        top: usize,

        /// Output results as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Extract the bounded-depth neighborhood of one or more entry nodes.
    ///
    /// Depth degrades automatically when the result would exceed the
    /// configured node ceiling; an unsatisfiable query reports a structured
    /// too-large condition instead of an oversized graph.
    Focus {
        /// Path to the project root to analyze.
        path: PathBuf,

        /// Entry node qualified name (repeatable).
        #[arg(long = "entry", required = true)]
        entries: Vec<String>,

        /// Traversal depth (defaults to the configured focus depth).
        #[arg(long)]
        depth: Option<usize>,

        /// Output format.
        #[arg(long, value_enum, default_value_t = ExportFormat::Dot)]
        format: ExportFormat,
    },

    /// Export the whole graph, degrading to a focus subgraph around the
    /// top-ranked entry point when the graph exceeds the render ceiling.
    Export {
        /// Path to the project root to analyze.
        path: PathBuf,

        /// Output format.
        #[arg(long, value_enum, default_value_t = ExportFormat::Dot)]
        format: ExportFormat,

        /// Write to a file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Export the full graph even when it exceeds the render ceiling.
        #[arg(long)]
        full: bool,
    },
}
