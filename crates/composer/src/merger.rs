use crate::reader::ReadDeclaration;
use modforge_parser::{normalize_import, DeclarationKind};
use std::collections::HashSet;

/// Result of concatenating declarations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutput {
    pub body: String,
    /// Normalized text of each import dropped as a duplicate
    pub deduplicated: Vec<String>,
}

/// Concatenates declarations into one source body
#[derive(Debug, Clone, Copy)]
pub struct Merger {
    dedupe_imports: bool,
}

impl Merger {
    #[must_use]
    pub const fn new(dedupe_imports: bool) -> Self {
        Self { dedupe_imports }
    }

    /// Emit declarations in the given order.
    ///
    /// Import declarations repeating an earlier import's normalized text are
    /// dropped; declarations of unknown kind are never dropped.
    #[must_use]
    pub fn merge(&self, declarations: &[ReadDeclaration]) -> MergeOutput {
        let mut body = String::with_capacity(declarations.iter().map(|d| d.text.len()).sum());
        let mut seen_imports: HashSet<String> = HashSet::new();
        let mut deduplicated = Vec::new();

        for declaration in declarations {
            if self.dedupe_imports && declaration.kind == Some(DeclarationKind::Import) {
                let key = normalize_import(&declaration.text);
                if !key.is_empty() && !seen_imports.insert(key.clone()) {
                    log::debug!("Dropping duplicate import `{key}`");
                    deduplicated.push(key);
                    continue;
                }
            }

            if !body.is_empty() && !body.ends_with('\n') && !declaration.text.is_empty() {
                body.push('\n');
            }
            body.push_str(&declaration.text);
        }

        MergeOutput { body, deduplicated }
    }
}
