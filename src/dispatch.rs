use std::path::PathBuf;

use rayon::prelude::*;

use crate::cache::CacheStore;
use crate::error::{AnalysisError, ParseFailure};
use crate::layout::ResolutionContext;
use crate::parser::{self, FileRecord};

/// The merged result of the map phase.
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    /// Records sorted by path — the canonical order handed to the resolver.
    pub records: Vec<FileRecord>,
    /// Per-file failures, isolated and counted against the parse budget.
    pub failures: Vec<ParseFailure>,
    /// Files served from the cache without re-parsing.
    pub cache_hits: usize,
}

enum PerFile {
    Hit(FileRecord),
    Parsed(FileRecord),
    Failed(ParseFailure),
}

/// Partition the file set across the rayon pool and parse every file,
/// short-circuiting through the cache for unchanged content.
///
/// Workers share no mutable state: each one reads its file, hashes it, and
/// either reuses the cached record or parses fresh, communicating only by
/// return value. The merge order is canonicalized by sorting records by path,
/// so wall-clock scheduling never affects the output.
///
/// A single file's failure is isolated and logged; the run fails only when
/// the failure ratio exceeds `max_failure_ratio`.
pub fn parse_all(
    files: &[PathBuf],
    ctx: &ResolutionContext,
    cache: &mut CacheStore,
    max_failure_ratio: f64,
) -> Result<DispatchOutcome, AnalysisError> {
    // Deterministic dispatch order regardless of what the caller hands us.
    let mut sorted_files = files.to_vec();
    sorted_files.sort();

    // Workers read the cache concurrently; writes happen after the join.
    let shared_cache: &CacheStore = cache;
    let per_file: Vec<PerFile> = sorted_files
        .par_iter()
        .map(|path| {
            let source = match std::fs::read(path) {
                Ok(bytes) => bytes,
                Err(err) => {
                    return PerFile::Failed(ParseFailure::new(path, format!("read error: {err}")));
                }
            };
            let hash = parser::content_hash(&source);
            if let Some(record) = shared_cache.get(path, &hash) {
                return PerFile::Hit(record.clone());
            }
            match parser::parse_file_parallel(path, &source, ctx) {
                Ok(record) => PerFile::Parsed(record),
                Err(failure) => PerFile::Failed(failure),
            }
        })
        .collect();

    let mut outcome = DispatchOutcome::default();
    for item in per_file {
        match item {
            PerFile::Hit(record) => {
                outcome.cache_hits += 1;
                outcome.records.push(record);
            }
            PerFile::Parsed(record) => {
                cache.put(&record.path, record.clone());
                outcome.records.push(record);
            }
            PerFile::Failed(failure) => {
                tracing::warn!("{failure}");
                outcome.failures.push(failure);
            }
        }
    }

    // Canonical merge order for the reduce phase.
    outcome.records.sort_by(|a, b| a.path.cmp(&b.path));

    let total = sorted_files.len();
    if total > 0 {
        let ratio = outcome.failures.len() as f64 / total as f64;
        if ratio > max_failure_ratio {
            return Err(AnalysisError::ParseBudgetExceeded {
                failed: outcome.failures.len(),
                total,
                max_ratio: max_failure_ratio,
            });
        }
    }

    tracing::info!(
        "parsed {} files ({} from cache, {} failed)",
        outcome.records.len(),
        outcome.cache_hits,
        outcome.failures.len()
    );

    Ok(outcome)
}
