use std::path::PathBuf;

use thiserror::Error;

/// Project-level failures that abort an analysis run.
///
/// Everything else (single-file parse errors, resolution conflicts, cache
/// corruption) is contained at its component boundary and surfaced as a
/// warning on the [`crate::session::RunReport`] instead.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// No Python source files were discovered under the project root.
    #[error("no Python files found under {}", root.display())]
    NoFilesFound { root: PathBuf },

    /// Neither layout interpretation produced a viable resolution context.
    /// Setting `root_package` in archgraph.toml overrides detection entirely.
    #[error(
        "project layout is ambiguous (candidate roots: {candidates:?}); \
         set `root_package` in archgraph.toml to override"
    )]
    LayoutAmbiguous { candidates: Vec<String> },

    /// Too many files failed to parse — the graph would not be trustworthy.
    #[error("parse failures exceeded budget: {failed} of {total} files (max ratio {max_ratio})")]
    ParseBudgetExceeded {
        failed: usize,
        total: usize,
        max_ratio: f64,
    },
}

/// A single file that could not be parsed. Non-fatal: the file is excluded
/// from the record set and the failure is counted against the parse budget.
#[derive(Debug, Clone, Error)]
#[error("failed to parse {}: {message}", path.display())]
pub struct ParseFailure {
    pub path: PathBuf,
    pub message: String,
}

impl ParseFailure {
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}
