use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One detection rule for the semantic link engine. Rules are applied in the
/// order they appear in the configuration; all kinds except the dynamic pass
/// contribute to an order-independent edge set.
///
/// Patterns are glob patterns matched against fully qualified names
/// (e.g. `"*.LocalProxy"`, `"myapp.registry.*"`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IocRule {
    /// `class Child(Base)` — emits an `Inherits` edge for each base whose
    /// resolved name matches `base_pattern` (every base when omitted).
    Inherit {
        #[serde(default)]
        base_pattern: Option<String>,
    },
    /// `@decorator` on a class or function — emits a `Decorates` edge from
    /// the decorator's owning component to the decorated definition.
    Decorate { callee_pattern: String },
    /// `x = Factory(target)` where `Factory` matches `factory_pattern` —
    /// emits a `Proxies` edge from the binding to the target.
    Proxy { factory_pattern: String },
    /// A class-body list/tuple whose elements are known components —
    /// emits `Registers` edges from the enclosing class to each element.
    Register,
    /// A call matching `callee_pattern` with a known component argument —
    /// emits an `Injects` edge from the calling component to the argument.
    Inject { callee_pattern: String },
    /// A factory-style call matching `callee_pattern` with a known class
    /// argument — emits a `Uses` edge labeled `strategy`.
    Strategy { callee_pattern: String },
}

/// One side (producer or consumer) of a dynamic-behavior rule: which call
/// sites participate and where their literal string key lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleSpec {
    /// Glob over the call site's resolved callee name.
    pub callee_pattern: String,
    /// Positional index of the string-literal key argument.
    #[serde(default)]
    pub key_arg: Option<usize>,
    /// Keyword argument carrying the string-literal key.
    #[serde(default)]
    pub key_kwarg: Option<String>,
}

/// A string-keyed producer/consumer correlation rule. Call sites matching the
/// producer and consumer specs are linked whenever their keys are equal.
/// Later rules re-label edges emitted by earlier rules on the same pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamicRule {
    pub name: String,
    pub producer: RoleSpec,
    pub consumer: RoleSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    pub ioc: Vec<IocRule>,
    pub dynamic: Vec<DynamicRule>,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            ioc: vec![
                IocRule::Inherit { base_pattern: None },
                IocRule::Decorate {
                    callee_pattern: "*".to_string(),
                },
                IocRule::Register,
                IocRule::Proxy {
                    factory_pattern: "*LocalProxy".to_string(),
                },
                IocRule::Proxy {
                    factory_pattern: "*LocalStack".to_string(),
                },
            ],
            dynamic: Vec::new(),
        }
    }
}

/// Concept-flow pass settings: which instances to track and how far to
/// propagate their identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Fully qualified names to track explicitly.
    pub seeds: Vec<String>,
    /// Auto-discover seeds: module-top-level names bound to a direct
    /// instantiation of a project class.
    pub auto_discover: bool,
    /// Glob patterns removing auto-discovered seeds.
    pub exclude_patterns: Vec<String>,
    /// Maximum propagation rounds; guarantees termination on cycles.
    pub max_depth: usize,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            seeds: Vec::new(),
            auto_discover: true,
            exclude_patterns: vec!["*._*".to_string(), "*.tests.*".to_string()],
            max_depth: 10,
        }
    }
}

/// Centrality and recommendation-filter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub damping: f64,
    pub epsilon: f64,
    pub max_iterations: usize,
    /// Regex patterns over qualified names; matching nodes are excluded from
    /// recommendation candidacy (they remain in the graph).
    pub test_patterns: Vec<String>,
    pub exclude_private: bool,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            damping: 0.85,
            epsilon: 1e-6,
            max_iterations: 100,
            test_patterns: vec![r"(^|.*\.)(tests?|conftest)(\..*|$)".to_string()],
            exclude_private: true,
        }
    }
}

/// Size ceilings and failure budgets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Run fails when failed/total exceeds this ratio.
    pub max_parse_failure_ratio: f64,
    /// Whole-graph export ceiling; beyond it the engine degrades to focus mode.
    pub max_render_nodes: usize,
    /// Focus-subgraph ceiling; depth is decremented until satisfied.
    pub max_focus_nodes: usize,
    /// Default focus traversal depth.
    pub focus_depth: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_parse_failure_ratio: 0.2,
            max_render_nodes: 300,
            max_focus_nodes: 150,
            focus_depth: 2,
        }
    }
}

/// Analysis configuration, loaded from `archgraph.toml` at the project root.
///
/// The pipeline consumes this as an already-validated structure; loading
/// falls back to defaults when the file is missing or unparseable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Expert override for the root package; bypasses layout detection.
    pub root_package: Option<String>,
    /// Additional path patterns to exclude from discovery (beyond .gitignore).
    pub exclude: Vec<String>,
    pub rules: RulesConfig,
    pub concept_flow: FlowConfig,
    pub ranking: RankingConfig,
    pub limits: LimitsConfig,
}

impl AnalysisConfig {
    /// Load configuration from `archgraph.toml` in the given root directory.
    ///
    /// Returns the default configuration if the file does not exist or cannot
    /// be parsed.
    pub fn load(root: &Path) -> Self {
        let config_path = root.join("archgraph.toml");

        if !config_path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match toml::from_str::<Self>(&contents) {
                Ok(config) => config,
                Err(err) => {
                    tracing::warn!("failed to parse archgraph.toml: {err}. Using defaults.");
                    Self::default()
                }
            },
            Err(err) => {
                tracing::warn!("failed to read archgraph.toml: {err}. Using defaults.");
                Self::default()
            }
        }
    }

    /// Fingerprint of the configuration subset that can change parse results
    /// or derived edges. Any change invalidates the entire cache: rule changes
    /// alter edges in ways not localized to single files.
    ///
    /// Ranking and limit settings are deliberately excluded — they only shape
    /// queries over an already-built graph.
    pub fn fingerprint(&self) -> String {
        #[derive(Serialize)]
        struct Relevant<'a> {
            root_package: &'a Option<String>,
            exclude: &'a [String],
            rules: &'a RulesConfig,
            concept_flow: &'a FlowConfig,
        }
        let relevant = Relevant {
            root_package: &self.root_package,
            exclude: &self.exclude,
            rules: &self.rules,
            concept_flow: &self.concept_flow,
        };
        let json = serde_json::to_string(&relevant).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_config_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AnalysisConfig::load(dir.path());
        assert!(config.root_package.is_none());
        assert_eq!(config.ranking.damping, 0.85);
        assert_eq!(config.limits.focus_depth, 2);
    }

    #[test]
    fn test_load_parses_rules() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("archgraph.toml"),
            r#"
root_package = "myapp"

[[rules.ioc]]
kind = "decorate"
callee_pattern = "*.route"

[[rules.dynamic]]
name = "task-queue"
producer = { callee_pattern = "*.send_task", key_arg = 0 }
consumer = { callee_pattern = "*.register_handler", key_arg = 0 }
"#,
        )
        .unwrap();

        let config = AnalysisConfig::load(dir.path());
        assert_eq!(config.root_package.as_deref(), Some("myapp"));
        assert_eq!(config.rules.ioc.len(), 1);
        assert_eq!(config.rules.dynamic.len(), 1);
        assert!(matches!(
            config.rules.ioc[0],
            IocRule::Decorate { ref callee_pattern } if callee_pattern == "*.route"
        ));
    }

    #[test]
    fn test_fingerprint_changes_with_rules() {
        let base = AnalysisConfig::default();
        let mut changed = AnalysisConfig::default();
        changed.rules.ioc.push(IocRule::Inject {
            callee_pattern: "*.bind".to_string(),
        });
        assert_ne!(base.fingerprint(), changed.fingerprint());
    }

    #[test]
    fn test_fingerprint_ignores_ranking_settings() {
        let base = AnalysisConfig::default();
        let mut changed = AnalysisConfig::default();
        changed.ranking.max_iterations = 7;
        changed.limits.max_render_nodes = 10;
        assert_eq!(
            base.fingerprint(),
            changed.fingerprint(),
            "query-only settings must not invalidate the cache"
        );
    }
}
