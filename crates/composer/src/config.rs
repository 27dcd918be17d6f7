use crate::error::{ComposerError, Result};
use modforge_parser::{CommentPolicy, DeclarationKind};
use once_cell::sync::Lazy;
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Category that receives every declaration no rule claims
pub const FALLBACK_CATEGORY: &str = "core";

/// Built-in category order
pub const DEFAULT_CATEGORIES: &[&str] = &[
    "config",
    "handlers",
    "managers",
    "gui",
    "utils",
    "models",
    "analyzers",
    "logging",
    FALLBACK_CATEGORY,
];

static CATEGORY_NAME: Lazy<regex::Regex> =
    Lazy::new(|| regex::Regex::new(r"^[a-z][a-z0-9_]*$").expect("valid category regex"));

/// Complete modforge configuration, usually read from `modforge.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModforgeConfig {
    pub decompose: DecomposeConfig,

    /// Category evaluation order
    pub categories: Vec<String>,

    /// Explicit rules; `None` selects the built-in rule set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_rules: Option<Vec<CategoryRule>>,

    pub cleanup: CleanupConfig,

    pub dist: DistConfig,
}

impl Default for ModforgeConfig {
    fn default() -> Self {
        Self {
            decompose: DecomposeConfig::default(),
            categories: DEFAULT_CATEGORIES.iter().map(|c| (*c).to_string()).collect(),
            category_rules: None,
            cleanup: CleanupConfig::default(),
            dist: DistConfig::default(),
        }
    }
}

/// Decomposition options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecomposeConfig {
    pub preserve_comments: bool,
    pub preserve_docstrings: bool,
    /// Write an `__init__.py` listing the generated modules
    pub generate_init: bool,
}

impl Default for DecomposeConfig {
    fn default() -> Self {
        Self {
            preserve_comments: true,
            preserve_docstrings: true,
            generate_init: true,
        }
    }
}

impl DecomposeConfig {
    #[must_use]
    pub const fn comment_policy(&self) -> CommentPolicy {
        CommentPolicy {
            preserve_comments: self.preserve_comments,
            preserve_docstrings: self.preserve_docstrings,
        }
    }
}

/// How a rule selects declarations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    /// Pattern is a declaration kind label
    Kind,
    /// Pattern is a case-insensitive regex over the declaration name
    Name,
    /// Pattern is an exact declaration name; wins over every other rule
    Override,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub category: String,
    pub match_kind: MatchKind,
    pub pattern: String,
}

impl CategoryRule {
    pub fn new(category: &str, match_kind: MatchKind, pattern: &str) -> Self {
        Self {
            category: category.to_string(),
            match_kind,
            pattern: pattern.to_string(),
        }
    }
}

/// Built-in rules, mirroring the category names
#[must_use]
pub fn default_rules() -> Vec<CategoryRule> {
    vec![
        CategoryRule::new("config", MatchKind::Kind, "import"),
        CategoryRule::new("config", MatchKind::Kind, "constant"),
        CategoryRule::new("handlers", MatchKind::Name, "handler"),
        CategoryRule::new("managers", MatchKind::Name, "manager|monitor"),
        CategoryRule::new("gui", MatchKind::Name, "gui|window|dialog"),
        CategoryRule::new("utils", MatchKind::Name, "util|helper"),
        CategoryRule::new("models", MatchKind::Name, "model"),
        CategoryRule::new("analyzers", MatchKind::Name, "analyzer|checker"),
        CategoryRule::new("logging", MatchKind::Name, "log"),
    ]
}

/// Recompose cleanup options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    /// Drop import declarations whose normalized text repeats; applied only with cleanup
    pub dedupe_imports: bool,
    pub remove_unused_imports: bool,
    pub reorder_imports: bool,
    pub collapse_blank_lines: bool,
    pub max_blank_lines: usize,
    pub strip_trailing_whitespace: bool,
    /// Module roots treated as first-party when grouping imports
    pub local_modules: Vec<String>,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            dedupe_imports: true,
            remove_unused_imports: true,
            reorder_imports: false,
            collapse_blank_lines: true,
            max_blank_lines: 2,
            strip_trailing_whitespace: false,
            local_modules: Vec::new(),
        }
    }
}

/// Native packager handed the recomposed source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistTool {
    #[default]
    Pyinstaller,
    #[serde(alias = "cx_freeze")]
    Cxfreeze,
    Nuitka,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DistConfig {
    pub default_tool: DistTool,
}

impl ModforgeConfig {
    /// Parse TOML text and validate it
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|err| ComposerError::invalid_config(err.to_string()))?;
        config.validated()
    }

    /// Read and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|err| ComposerError::io(path, err))?;
        Self::from_toml_str(&text).map_err(|err| match err {
            ComposerError::InvalidConfig(message) => {
                ComposerError::invalid_config(format!("{}: {message}", path.display()))
            }
            other => other,
        })
    }

    /// Explicit file if given, else `<root>/modforge.toml` when present, else defaults
    pub fn discover(root: &Path, explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let candidate = root.join(crate::project::CONFIG_FILE);
        if candidate.is_file() {
            log::debug!("Using config {}", candidate.display());
            return Self::load(&candidate);
        }
        Ok(Self::default())
    }

    /// Normalize (append the fallback category) and validate
    pub fn validated(mut self) -> Result<Self> {
        if !self.categories.iter().any(|c| c == FALLBACK_CATEGORY) {
            self.categories.push(FALLBACK_CATEGORY.to_string());
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for category in &self.categories {
            if !CATEGORY_NAME.is_match(category) {
                return Err(ComposerError::invalid_config(format!(
                    "category `{category}` must match [a-z][a-z0-9_]*"
                )));
            }
            if !seen.insert(category.as_str()) {
                return Err(ComposerError::invalid_config(format!(
                    "category `{category}` is listed twice"
                )));
            }
        }

        if let Some(rules) = &self.category_rules {
            for rule in rules {
                validate_rule(rule, &seen)?;
            }
        }

        if self.cleanup.max_blank_lines == 0 {
            return Err(ComposerError::invalid_config(
                "cleanup.max_blank_lines must be at least 1",
            ));
        }
        Ok(())
    }

    /// Rules in effect. Built-in rules for categories missing from the list are dropped.
    #[must_use]
    pub fn rules(&self) -> Vec<CategoryRule> {
        match &self.category_rules {
            Some(rules) => rules.clone(),
            None => default_rules()
                .into_iter()
                .filter(|rule| self.categories.contains(&rule.category))
                .collect(),
        }
    }
}

fn validate_rule(rule: &CategoryRule, categories: &HashSet<&str>) -> Result<()> {
    if !categories.contains(rule.category.as_str()) {
        return Err(ComposerError::invalid_config(format!(
            "rule refers to unknown category `{}`",
            rule.category
        )));
    }
    match rule.match_kind {
        MatchKind::Kind => {
            let label = rule.pattern.trim().to_ascii_lowercase();
            if DeclarationKind::from_label(&label).is_none() {
                return Err(ComposerError::invalid_config(format!(
                    "unknown declaration kind `{}` in rule for `{}`",
                    rule.pattern, rule.category
                )));
            }
        }
        MatchKind::Name => {
            RegexBuilder::new(&rule.pattern)
                .case_insensitive(true)
                .build()
                .map_err(|err| {
                    ComposerError::invalid_config(format!(
                        "invalid name pattern for `{}`: {err}",
                        rule.category
                    ))
                })?;
        }
        MatchKind::Override => {
            if rule.pattern.trim().is_empty() {
                return Err(ComposerError::invalid_config(format!(
                    "empty override in rule for `{}`",
                    rule.category
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = ModforgeConfig::from_toml_str("").unwrap();
        assert_eq!(config, ModforgeConfig::default());
        assert_eq!(config.rules(), default_rules());
        assert!(config.decompose.comment_policy().is_verbatim());
    }

    #[test]
    fn test_full_file() {
        let text = r#"
categories = ["widgets", "config"]

[decompose]
preserve_comments = false
generate_init = false

[[category_rules]]
category = "widgets"
match_kind = "name"
pattern = "^Widget"

[[category_rules]]
category = "config"
match_kind = "override"
pattern = "main"

[cleanup]
reorder_imports = true
max_blank_lines = 1
local_modules = ["app"]

[dist]
default_tool = "cx_freeze"
"#;
        let config = ModforgeConfig::from_toml_str(text).unwrap();
        assert_eq!(config.categories, vec!["widgets", "config", "core"]);
        assert!(!config.decompose.preserve_comments);
        assert!(config.decompose.preserve_docstrings);
        assert_eq!(config.rules().len(), 2);
        assert_eq!(config.rules()[1].match_kind, MatchKind::Override);
        assert!(config.cleanup.reorder_imports);
        assert!(config.cleanup.dedupe_imports);
        assert_eq!(config.cleanup.local_modules, vec!["app"]);
        assert_eq!(config.dist.default_tool, DistTool::Cxfreeze);
    }

    #[test]
    fn test_custom_categories_filter_builtin_rules() {
        let config =
            ModforgeConfig::from_toml_str(r#"categories = ["gui", "config"]"#).unwrap();
        let categories: Vec<String> = config.rules().into_iter().map(|r| r.category).collect();
        assert_eq!(categories, vec!["config", "config", "gui"]);
    }

    #[test]
    fn test_validation_rejects_bad_config() {
        let cases = [
            r#"categories = ["Bad-Name"]"#,
            r#"categories = ["gui", "gui"]"#,
            "[[category_rules]]\ncategory = \"nowhere\"\nmatch_kind = \"kind\"\npattern = \"class\"",
            "[[category_rules]]\ncategory = \"gui\"\nmatch_kind = \"name\"\npattern = \"(\"",
            "[[category_rules]]\ncategory = \"gui\"\nmatch_kind = \"kind\"\npattern = \"struct\"",
            "[cleanup]\nmax_blank_lines = 0",
            "[dist]\ndefault_tool = \"py2exe\"",
        ];
        for text in cases {
            let err = ModforgeConfig::from_toml_str(text).unwrap_err();
            assert!(
                matches!(err, ComposerError::InvalidConfig(_)),
                "expected invalid config for {text:?}"
            );
        }
    }

    #[test]
    fn test_discover_prefers_project_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            ModforgeConfig::discover(dir.path(), None).unwrap(),
            ModforgeConfig::default()
        );

        std::fs::write(
            dir.path().join("modforge.toml"),
            "[cleanup]\nstrip_trailing_whitespace = true\n",
        )
        .unwrap();
        let config = ModforgeConfig::discover(dir.path(), None).unwrap();
        assert!(config.cleanup.strip_trailing_whitespace);
    }
}
