use crate::config::{CategoryRule, MatchKind, ModforgeConfig, FALLBACK_CATEGORY};
use crate::error::{ComposerError, Result};
use crate::warning::ComposeWarning;
use modforge_parser::Declaration;
use regex::{Regex, RegexBuilder};
use std::path::{Path, PathBuf};

/// One category's declarations, in ascending order index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub category: String,
    pub declarations: Vec<Declaration>,
}

impl Module {
    /// File name of the module, e.g. `config.py`
    #[must_use]
    pub fn file_name(&self) -> String {
        module_file_name(&self.category)
    }

    #[must_use]
    pub fn path(&self, modules_dir: &Path) -> PathBuf {
        modules_dir.join(self.file_name())
    }
}

/// File name for a category
#[must_use]
pub fn module_file_name(category: &str) -> String {
    format!("{category}.py")
}

/// Outcome of classifying one declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: String,
    /// Later categories whose rules also matched
    pub shadowed: Vec<String>,
}

enum Matcher {
    Kind(String),
    Name(Regex),
    Override(String),
}

impl Matcher {
    fn compile(rule: &CategoryRule) -> Result<Self> {
        Ok(match rule.match_kind {
            MatchKind::Kind => Self::Kind(rule.pattern.trim().to_ascii_lowercase()),
            MatchKind::Name => Self::Name(
                RegexBuilder::new(&rule.pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|err| ComposerError::invalid_config(err.to_string()))?,
            ),
            MatchKind::Override => Self::Override(rule.pattern.trim().to_string()),
        })
    }

    fn matches(&self, declaration: &Declaration) -> bool {
        match self {
            Self::Kind(label) => declaration.kind.matches_label(label),
            Self::Name(regex) => declaration
                .name
                .as_deref()
                .is_some_and(|name| regex.is_match(name)),
            Self::Override(name) => declaration.name.as_deref() == Some(name.as_str()),
        }
    }

    const fn is_override(&self) -> bool {
        matches!(self, Self::Override(_))
    }
}

struct CategoryMatchers {
    name: String,
    matchers: Vec<Matcher>,
}

impl CategoryMatchers {
    fn overrides(&self, declaration: &Declaration) -> bool {
        self.matchers
            .iter()
            .any(|m| m.is_override() && m.matches(declaration))
    }

    fn claims(&self, declaration: &Declaration) -> bool {
        self.matchers
            .iter()
            .any(|m| !m.is_override() && m.matches(declaration))
    }
}

/// Assigns declarations to categories with compiled rules
pub struct Classifier {
    categories: Vec<CategoryMatchers>,
}

impl Classifier {
    /// Compile the rules of a validated configuration
    pub fn new(config: &ModforgeConfig) -> Result<Self> {
        let rules = config.rules();
        let mut categories = Vec::with_capacity(config.categories.len());

        for name in &config.categories {
            let matchers = rules
                .iter()
                .filter(|rule| &rule.category == name)
                .map(Matcher::compile)
                .collect::<Result<Vec<_>>>()?;
            categories.push(CategoryMatchers {
                name: name.clone(),
                matchers,
            });
        }

        Ok(Self { categories })
    }

    /// Category of one declaration
    #[must_use]
    pub fn classify(&self, declaration: &Declaration) -> String {
        self.classify_detailed(declaration).category
    }

    /// Category of one declaration plus the categories it also matched
    #[must_use]
    pub fn classify_detailed(&self, declaration: &Declaration) -> Classification {
        let chosen = self
            .categories
            .iter()
            .position(|c| c.overrides(declaration))
            .or_else(|| self.categories.iter().position(|c| c.claims(declaration)));

        let Some(index) = chosen else {
            return Classification {
                category: FALLBACK_CATEGORY.to_string(),
                shadowed: Vec::new(),
            };
        };

        let shadowed = self
            .categories
            .iter()
            .enumerate()
            .filter(|(i, c)| {
                *i != index && (c.overrides(declaration) || c.claims(declaration))
            })
            .map(|(_, c)| c.name.clone())
            .collect();

        Classification {
            category: self.categories[index].name.clone(),
            shadowed,
        }
    }

    /// Split declarations into modules, one per non-empty category, in category order.
    ///
    /// Every declaration lands in exactly one module. Ambiguous matches are
    /// returned as warnings.
    #[must_use]
    pub fn partition(&self, declarations: &[Declaration]) -> (Vec<Module>, Vec<ComposeWarning>) {
        let mut buckets: Vec<Vec<Declaration>> = vec![Vec::new(); self.categories.len()];
        let mut warnings = Vec::new();

        for declaration in declarations {
            let classification = self.classify_detailed(declaration);
            let slot = self
                .categories
                .iter()
                .position(|c| c.name == classification.category)
                .unwrap_or(self.categories.len().saturating_sub(1));

            if !classification.shadowed.is_empty() {
                warnings.push(ComposeWarning::ClassificationAmbiguity {
                    id: declaration.id.clone(),
                    chosen: classification.category.clone(),
                    shadowed: classification.shadowed,
                });
            }
            log::debug!("{} -> {}", declaration.id, classification.category);
            buckets[slot].push(declaration.clone());
        }

        let modules = self
            .categories
            .iter()
            .zip(buckets)
            .filter(|(_, bucket)| !bucket.is_empty())
            .map(|(category, mut bucket)| {
                bucket.sort_by_key(|d| d.order);
                Module {
                    category: category.name.clone(),
                    declarations: bucket,
                }
            })
            .collect();

        (modules, warnings)
    }
}
