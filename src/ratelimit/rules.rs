//! Rate limit rules configuration and matching.
//!
//! Rules map request path prefixes to a limit and a window. Every path
//! inside the protected namespace that matches no rule falls back to the
//! default limit, which is tracked under the namespace prefix itself.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{Result, TurnstileError};

/// The namespace protected by the built-in rules.
pub const DEFAULT_NAMESPACE: &str = "/api/";

const MINUTE_MS: u64 = 60 * 1000;

/// A limit and the window it applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limit {
    /// Maximum requests allowed in one window
    pub limit: u64,
    /// Window length in milliseconds
    pub window_ms: u64,
}

impl Limit {
    /// Create a new limit.
    pub fn new(limit: u64, window_ms: u64) -> Self {
        Self { limit, window_ms }
    }

    /// Get the window duration.
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// A limit applied to every path starting with `prefix`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRule {
    /// Path prefix to match
    pub prefix: String,
    /// Maximum requests allowed in one window
    pub limit: u64,
    /// Window length in milliseconds
    pub window_ms: u64,
    /// Optional name/description for this rule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl PathRule {
    /// Create a new unnamed rule.
    pub fn new(prefix: &str, limit: u64, window_ms: u64) -> Self {
        Self {
            prefix: prefix.to_string(),
            limit,
            window_ms,
            name: None,
        }
    }

    fn as_limit(&self) -> Limit {
        Limit::new(self.limit, self.window_ms)
    }
}

/// The rule that matched a request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchedRule<'a> {
    /// Prefix the record is tracked under
    pub prefix: &'a str,
    /// Limit to enforce
    pub limit: Limit,
}

#[derive(Debug, Deserialize)]
struct RuleFile {
    #[serde(default = "default_namespace")]
    namespace: String,
    #[serde(default = "default_limit")]
    default: Limit,
    #[serde(default)]
    rules: Vec<PathRule>,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_limit() -> Limit {
    Limit::new(50, MINUTE_MS)
}

/// A validated, priority-ordered set of path rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSet {
    namespace: String,
    default: Limit,
    /// Sorted most specific (longest prefix) first
    rules: Vec<PathRule>,
}

impl RuleSet {
    /// Build a rule set, validating it and ordering the rules by specificity.
    pub fn new(namespace: &str, default: Limit, mut rules: Vec<PathRule>) -> Result<Self> {
        if namespace.is_empty() || !namespace.starts_with('/') {
            return Err(TurnstileError::Config(format!(
                "namespace must start with '/', got {:?}",
                namespace
            )));
        }
        validate_limit("default", default)?;

        let mut seen = HashSet::new();
        for rule in &rules {
            if !rule.prefix.starts_with(namespace) {
                return Err(TurnstileError::Config(format!(
                    "rule prefix {:?} is outside namespace {:?}",
                    rule.prefix, namespace
                )));
            }
            if !seen.insert(rule.prefix.as_str()) {
                return Err(TurnstileError::Config(format!(
                    "duplicate rule prefix {:?}",
                    rule.prefix
                )));
            }
            validate_limit(&rule.prefix, rule.as_limit())?;
        }

        // Stable sort keeps file order among prefixes of equal length.
        rules.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));

        Ok(Self {
            namespace: namespace.to_string(),
            default,
            rules,
        })
    }

    /// Load rules from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading rate limit rules");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load rules from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let file: RuleFile = serde_yaml::from_str(yaml)?;
        Self::new(&file.namespace, file.default, file.rules)
    }

    /// The protected namespace prefix.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The fallback limit for unmatched paths in the namespace.
    pub fn default_limit(&self) -> Limit {
        self.default
    }

    /// Rules in match order.
    pub fn rules(&self) -> &[PathRule] {
        &self.rules
    }

    /// Find the rule that applies to `path`.
    ///
    /// Returns `None` for paths outside the namespace. An empty path is
    /// treated as an unmatched namespace path and gets the default limit.
    pub fn match_path(&self, path: &str) -> Option<MatchedRule<'_>> {
        if !path.is_empty() && !path.starts_with(&self.namespace) {
            return None;
        }

        let matched = self
            .rules
            .iter()
            .find(|rule| path.starts_with(&rule.prefix))
            .map(|rule| MatchedRule {
                prefix: &rule.prefix,
                limit: rule.as_limit(),
            })
            .unwrap_or(MatchedRule {
                prefix: &self.namespace,
                limit: self.default,
            });

        Some(matched)
    }
}

impl Default for RuleSet {
    /// The built-in table: contact form, newsletter, articles, then `/api/`.
    fn default() -> Self {
        let mut contact = PathRule::new("/api/contato", 5, MINUTE_MS);
        contact.name = Some("contact form".to_string());
        let mut newsletter = PathRule::new("/api/newsletter", 3, MINUTE_MS);
        newsletter.name = Some("newsletter signup".to_string());
        let mut articles = PathRule::new("/api/artigos", 100, MINUTE_MS);
        articles.name = Some("articles".to_string());

        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            default: default_limit(),
            rules: vec![newsletter, contact, articles],
        }
    }
}

fn validate_limit(what: &str, limit: Limit) -> Result<()> {
    if limit.limit == 0 {
        return Err(TurnstileError::Config(format!(
            "{}: limit must be greater than zero",
            what
        )));
    }
    if limit.window_ms == 0 {
        return Err(TurnstileError::Config(format!(
            "{}: window_ms must be greater than zero",
            what
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table() {
        let rules = RuleSet::default();
        let cases = [
            ("/api/contato", "/api/contato", 5),
            ("/api/newsletter", "/api/newsletter", 3),
            ("/api/artigos", "/api/artigos", 100),
            ("/api/artigos/globalizacao-e-comercio", "/api/artigos", 100),
            ("/api/views", "/api/", 50),
            ("/api/unknown-path", "/api/", 50),
        ];

        for (path, prefix, limit) in cases {
            let matched = rules.match_path(path).unwrap();
            assert_eq!(matched.prefix, prefix, "prefix for {}", path);
            assert_eq!(matched.limit.limit, limit, "limit for {}", path);
            assert_eq!(matched.limit.window(), Duration::from_secs(60));
        }
    }

    #[test]
    fn test_default_is_validated_shape() {
        let built = RuleSet::new(
            DEFAULT_NAMESPACE,
            default_limit(),
            RuleSet::default().rules().to_vec(),
        )
        .unwrap();
        assert_eq!(built, RuleSet::default());
    }

    #[test]
    fn test_paths_outside_namespace_are_unprotected() {
        let rules = RuleSet::default();
        assert!(rules.match_path("/artigos/slug").is_none());
        assert!(rules.match_path("/").is_none());
        assert!(rules.match_path("/api").is_none());
    }

    #[test]
    fn test_empty_path_uses_default_bucket() {
        let rules = RuleSet::default();
        let matched = rules.match_path("").unwrap();
        assert_eq!(matched.prefix, "/api/");
        assert_eq!(matched.limit.limit, 50);
    }

    #[test]
    fn test_more_specific_prefix_wins_regardless_of_order() {
        let yaml = r#"
rules:
  - prefix: /api/artigos
    limit: 100
    window_ms: 60000
  - prefix: /api/artigos/destaque
    limit: 10
    window_ms: 1000
"#;
        let rules = RuleSet::from_yaml(yaml).unwrap();
        let matched = rules.match_path("/api/artigos/destaque/1").unwrap();
        assert_eq!(matched.prefix, "/api/artigos/destaque");
        assert_eq!(matched.limit, Limit::new(10, 1000));

        let matched = rules.match_path("/api/artigos/other").unwrap();
        assert_eq!(matched.prefix, "/api/artigos");
    }

    #[test]
    fn test_parse_full_file() {
        let yaml = r#"
namespace: /v1/
default:
  limit: 20
  window_ms: 30000
rules:
  - prefix: /v1/login
    limit: 2
    window_ms: 60000
    name: login
"#;
        let rules = RuleSet::from_yaml(yaml).unwrap();
        assert_eq!(rules.namespace(), "/v1/");
        assert_eq!(rules.default_limit(), Limit::new(20, 30000));
        assert_eq!(rules.rules().len(), 1);
        assert_eq!(rules.rules()[0].name.as_deref(), Some("login"));

        assert!(rules.match_path("/api/anything").is_none());
        assert_eq!(rules.match_path("/v1/other").unwrap().prefix, "/v1/");
    }

    #[test]
    fn test_empty_file_section_defaults() {
        let rules = RuleSet::from_yaml("rules: []").unwrap();
        assert_eq!(rules.namespace(), DEFAULT_NAMESPACE);
        assert_eq!(rules.default_limit(), Limit::new(50, 60000));
        assert!(rules.rules().is_empty());
    }

    #[test]
    fn test_rejects_prefix_outside_namespace() {
        let yaml = r#"
rules:
  - prefix: /admin
    limit: 1
    window_ms: 1000
"#;
        let err = RuleSet::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, TurnstileError::Config(_)));
    }

    #[test]
    fn test_rejects_duplicate_prefix() {
        let rules = vec![
            PathRule::new("/api/a", 1, 1000),
            PathRule::new("/api/a", 2, 1000),
        ];
        assert!(RuleSet::new("/api/", default_limit(), rules).is_err());
    }

    #[test]
    fn test_rejects_zero_limit_or_window() {
        assert!(RuleSet::new("/api/", Limit::new(0, 1000), vec![]).is_err());
        assert!(RuleSet::new("/api/", Limit::new(1, 0), vec![]).is_err());
        assert!(
            RuleSet::new("/api/", default_limit(), vec![PathRule::new("/api/x", 0, 10)]).is_err()
        );
    }

    #[test]
    fn test_rejects_bad_namespace() {
        assert!(RuleSet::new("", default_limit(), vec![]).is_err());
        assert!(RuleSet::new("api/", default_limit(), vec![]).is_err());
    }

    #[test]
    fn test_malformed_yaml() {
        let err = RuleSet::from_yaml("rules: [not a rule").unwrap_err();
        assert!(matches!(err, TurnstileError::Config(_)));
    }
}
