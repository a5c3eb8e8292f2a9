use std::path::{Path, PathBuf};

use regex::Regex;

use crate::error::AnalysisError;

/// Source layout convention detected for the project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutKind {
    /// Packages live under a nested `src/` directory.
    SrcNested,
    /// Packages live directly at the project root.
    Flat,
}

/// Resolution context produced by layout detection and consumed by everything
/// downstream. Read-only after creation.
#[derive(Debug, Clone)]
pub struct ResolutionContext {
    pub project_root: PathBuf,
    pub source_root: PathBuf,
    pub layout: LayoutKind,
    /// Top-level package (or single-file module) names that define the
    /// project's import namespace.
    pub root_packages: Vec<String>,
}

impl ResolutionContext {
    /// Derive the dotted module path for a source file, or `None` when the
    /// file lies outside the detected root packages.
    ///
    /// `pkg/sub/mod.py` -> `pkg.sub.mod`; `pkg/sub/__init__.py` -> `pkg.sub`.
    pub fn module_path_for(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.source_root).ok()?;
        let mut parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        let last = parts.pop()?;
        if last == "__init__.py" {
            // Package __init__ maps to the package path itself.
        } else {
            parts.push(last.strip_suffix(".py")?.to_string());
        }
        if parts.is_empty() {
            return None;
        }
        if !self.root_packages.is_empty() && !self.root_packages.contains(&parts[0]) {
            return None;
        }
        Some(parts.join("."))
    }

    /// Whether this file is a package `__init__.py` (its module path is the
    /// package itself, which changes relative-import resolution).
    pub fn is_package_init(path: &Path) -> bool {
        path.file_name().is_some_and(|n| n == "__init__.py")
    }
}

/// Determine the project's source layout and root packages.
///
/// Probes for the conventional markers (a nested `src/` directory with
/// packages vs. packages at the root). When both interpretations are
/// plausible, a lightweight import pre-scan picks the one resolving the
/// larger fraction of first-segment imports. Fails with
/// [`AnalysisError::LayoutAmbiguous`] only when no interpretation reaches the
/// minimum viable fraction; an explicit `root_package` override bypasses
/// detection entirely.
pub fn detect(project_root: &Path, root_package: Option<&str>) -> Result<ResolutionContext, AnalysisError> {
    if let Some(pkg) = root_package {
        let src_dir = project_root.join("src");
        let (source_root, layout) = if src_dir.join(pkg).is_dir() || src_dir.join(format!("{pkg}.py")).is_file() {
            (src_dir, LayoutKind::SrcNested)
        } else {
            (project_root.to_path_buf(), LayoutKind::Flat)
        };
        tracing::info!("using configured root package override: {pkg}");
        return Ok(ResolutionContext {
            project_root: project_root.to_path_buf(),
            source_root,
            layout,
            root_packages: vec![pkg.to_string()],
        });
    }

    let src_dir = project_root.join("src");
    let src_candidates = if src_dir.is_dir() {
        top_level_packages(&src_dir)
    } else {
        Vec::new()
    };
    let flat_candidates = top_level_packages(project_root);

    let context = |source_root: PathBuf, layout, root_packages| ResolutionContext {
        project_root: project_root.to_path_buf(),
        source_root,
        layout,
        root_packages,
    };

    match (src_candidates.is_empty(), flat_candidates.is_empty()) {
        (false, true) => {
            tracing::info!("detected src/ layout (packages: {:?})", src_candidates);
            Ok(context(src_dir, LayoutKind::SrcNested, src_candidates))
        }
        (true, false) => {
            tracing::info!("detected flat layout (packages: {:?})", flat_candidates);
            Ok(context(project_root.to_path_buf(), LayoutKind::Flat, flat_candidates))
        }
        (false, false) => {
            // Both interpretations carry packages. Prefer the one whose
            // pre-scan resolves more first-segment imports.
            let src_fraction = prescan_resolved_fraction(&src_dir, &src_candidates);
            let flat_fraction = prescan_resolved_fraction(project_root, &flat_candidates);
            const MIN_VIABLE: f64 = 0.5;
            tracing::debug!(
                "layout pre-scan: src/ resolves {src_fraction:.2}, flat resolves {flat_fraction:.2}"
            );
            if src_fraction < MIN_VIABLE && flat_fraction < MIN_VIABLE {
                let mut candidates = src_candidates;
                candidates.extend(flat_candidates);
                return Err(AnalysisError::LayoutAmbiguous { candidates });
            }
            if src_fraction >= flat_fraction {
                Ok(context(src_dir, LayoutKind::SrcNested, src_candidates))
            } else {
                Ok(context(project_root.to_path_buf(), LayoutKind::Flat, flat_candidates))
            }
        }
        (true, true) => Err(AnalysisError::LayoutAmbiguous {
            candidates: Vec::new(),
        }),
    }
}

/// Collect top-level package names (directories with `__init__.py`) under
/// `dir`; falls back to standalone `.py` module stems when no packages exist.
fn top_level_packages(dir: &Path) -> Vec<String> {
    let mut packages = Vec::new();
    let mut modules = Vec::new();

    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return packages,
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n.to_string(),
            None => continue,
        };
        if name.starts_with('.') || name == "src" {
            continue;
        }
        if path.is_dir() && path.join("__init__.py").is_file() {
            packages.push(name);
        } else if path.is_file()
            && let Some(stem) = name.strip_suffix(".py")
            && !matches!(stem, "setup" | "conftest")
        {
            modules.push(stem.to_string());
        }
    }

    let mut result = if packages.is_empty() { modules } else { packages };
    result.sort();
    result
}

/// Lightweight pre-scan: the fraction of `import`/`from` first segments in a
/// sample of files under `source_root` that resolve to one of `packages`.
/// Returns 1.0 when the sample contains no imports at all (nothing is
/// unresolved).
fn prescan_resolved_fraction(source_root: &Path, packages: &[String]) -> f64 {
    const SAMPLE_LIMIT: usize = 40;

    let import_re = Regex::new(r"^\s*(?:from|import)\s+([A-Za-z_][A-Za-z0-9_]*)")
        .expect("static regex is valid");

    let mut sampled = 0usize;
    let mut total_imports = 0usize;
    let mut resolved_imports = 0usize;

    let walker = ignore::WalkBuilder::new(source_root)
        .standard_filters(true)
        .require_git(false)
        .build();

    for result in walker {
        if sampled >= SAMPLE_LIMIT {
            break;
        }
        let entry = match result {
            Ok(e) => e,
            Err(_) => continue,
        };
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("py") {
            continue;
        }
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => continue,
        };
        sampled += 1;
        for line in contents.lines() {
            if let Some(caps) = import_re.captures(line) {
                total_imports += 1;
                let first = &caps[1];
                if packages.iter().any(|p| p == first) {
                    resolved_imports += 1;
                }
            }
        }
    }

    if total_imports == 0 {
        return 1.0;
    }
    resolved_imports as f64 / total_imports as f64
}
