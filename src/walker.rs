use std::path::{Path, PathBuf};

use crate::config::AnalysisConfig;
use crate::layout::ResolutionContext;

/// Walk the detected source root and collect Python source files.
///
/// Respects `.gitignore` rules, always excludes virtualenv and cache
/// directories, applies any additional exclusions from `config.exclude`, and
/// keeps only files that map into the resolution context's root packages.
///
/// The returned list is sorted by path — the canonical dispatch order that
/// makes the merge phase independent of worker scheduling.
pub fn collect_source_files(
    ctx: &ResolutionContext,
    config: &AnalysisConfig,
) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let walker = ignore::WalkBuilder::new(&ctx.source_root)
        .standard_filters(true)
        // Read .gitignore files even when the directory is not inside a git
        // repository, so exclusions work for standalone directories.
        .require_git(false)
        .build();

    for result in walker {
        let entry = match result {
            Ok(e) => e,
            Err(err) => {
                tracing::warn!("walk error: {err}");
                continue;
            }
        };

        let path = entry.path();

        if entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false) {
            continue;
        }

        if path.extension().and_then(|e| e.to_str()) != Some("py") {
            continue;
        }

        // Hard exclusions: virtualenvs and bytecode caches.
        if path_contains_dir(path, &["__pycache__", ".venv", "venv", "site-packages"]) {
            continue;
        }

        if is_excluded_by_config(path, config) {
            continue;
        }

        // Only files inside the resolution context's namespace take part.
        if ctx.module_path_for(path).is_none() {
            continue;
        }

        files.push(path.to_path_buf());
    }

    files.sort();
    files
}

/// Returns true if any component of `path` matches one of `names`.
fn path_contains_dir(path: &Path, names: &[&str]) -> bool {
    path.components().any(|c| {
        c.as_os_str()
            .to_str()
            .map(|s| names.contains(&s))
            .unwrap_or(false)
    })
}

/// Returns true if `path` matches any exclusion pattern from config.
fn is_excluded_by_config(path: &Path, config: &AnalysisConfig) -> bool {
    if config.exclude.is_empty() {
        return false;
    }

    let path_str = path.to_string_lossy();

    for pattern in &config.exclude {
        if let Ok(matched) = glob::Pattern::new(pattern)
            && matched.matches(&path_str)
        {
            return true;
        }
        // Also check if any single component matches the pattern directly.
        for component in path.components() {
            if let Some(s) = component.as_os_str().to_str()
                && let Ok(matched) = glob::Pattern::new(pattern)
                && matched.matches(s)
            {
                return true;
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::LayoutKind;
    use std::fs;

    fn fixture(root: &Path) -> ResolutionContext {
        ResolutionContext {
            project_root: root.to_path_buf(),
            source_root: root.to_path_buf(),
            layout: LayoutKind::Flat,
            root_packages: vec!["app".to_string()],
        }
    }

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_collects_only_namespace_python_files() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("app/__init__.py"), "");
        write(&dir.path().join("app/core.py"), "x = 1\n");
        write(&dir.path().join("app/README.md"), "# doc");
        write(&dir.path().join("stray.py"), "y = 2\n");

        let files = collect_source_files(&fixture(dir.path()), &AnalysisConfig::default());
        let names: Vec<String> = files
            .iter()
            .map(|f| f.strip_prefix(dir.path()).unwrap().display().to_string())
            .collect();

        assert!(names.contains(&"app/__init__.py".to_string()));
        assert!(names.contains(&"app/core.py".to_string()));
        assert!(!names.iter().any(|n| n.ends_with("README.md")));
        assert!(
            !names.contains(&"stray.py".to_string()),
            "files outside root packages are skipped"
        );
    }

    #[test]
    fn test_output_is_sorted() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("app/__init__.py"), "");
        write(&dir.path().join("app/zeta.py"), "");
        write(&dir.path().join("app/alpha.py"), "");

        let files = collect_source_files(&fixture(dir.path()), &AnalysisConfig::default());
        let mut sorted = files.clone();
        sorted.sort();
        assert_eq!(files, sorted, "walker output must be path-sorted");
    }

    #[test]
    fn test_respects_exclude_patterns() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("app/__init__.py"), "");
        write(&dir.path().join("app/core.py"), "");
        write(&dir.path().join("app/migrations/0001.py"), "");

        let config = AnalysisConfig {
            exclude: vec!["migrations".to_string()],
            ..Default::default()
        };
        let files = collect_source_files(&fixture(dir.path()), &config);
        assert!(
            !files.iter().any(|f| f.to_string_lossy().contains("migrations")),
            "excluded directory must be skipped"
        );
    }

    #[test]
    fn test_excludes_pycache() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("app/__init__.py"), "");
        write(&dir.path().join("app/__pycache__/core.py"), "");

        let files = collect_source_files(&fixture(dir.path()), &AnalysisConfig::default());
        assert!(!files.iter().any(|f| f.to_string_lossy().contains("__pycache__")));
    }
}
