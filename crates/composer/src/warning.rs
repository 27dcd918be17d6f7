use std::fmt;
use std::path::PathBuf;

/// Recoverable conditions; the run completes and reports them
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposeWarning {
    /// A module unit no longer matches the checksum recorded at decomposition
    ChecksumMismatch { id: String, module: PathBuf },

    /// The source file changed since it was decomposed
    SourceDrift { source_file: PathBuf },

    /// No metadata; order was reconstructed heuristically
    MetadataMissing { path: PathBuf },

    /// Module files and metadata disagree; best-effort order was used
    Reconstruction { detail: String },

    /// The merged body could not be re-parsed, cleanup was not applied
    CleanupSkipped { reason: String },

    /// A declaration matched rules of more than one category
    ClassificationAmbiguity {
        id: String,
        chosen: String,
        shadowed: Vec<String>,
    },
}

impl fmt::Display for ComposeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChecksumMismatch { id, module } => write!(
                f,
                "declaration {id} in {} was edited after decomposition",
                module.display()
            ),
            Self::SourceDrift { source_file } => write!(
                f,
                "{} changed since it was decomposed; modules may be stale",
                source_file.display()
            ),
            Self::MetadataMissing { path } => write!(
                f,
                "metadata missing at {}; using heuristic module order",
                path.display()
            ),
            Self::Reconstruction { detail } => {
                write!(f, "reconstruction fell back to best-effort order: {detail}")
            }
            Self::CleanupSkipped { reason } => write!(f, "cleanup skipped: {reason}"),
            Self::ClassificationAmbiguity {
                id,
                chosen,
                shadowed,
            } => write!(
                f,
                "{id} assigned to `{chosen}` but also matches {}",
                shadowed.join(", ")
            ),
        }
    }
}

/// Collected warnings of one run; every push is also logged
#[derive(Debug, Default, Clone)]
pub struct Warnings {
    items: Vec<ComposeWarning>,
}

impl Warnings {
    pub fn push(&mut self, warning: ComposeWarning) {
        log::warn!("{warning}");
        self.items.push(warning);
    }

    pub fn extend(&mut self, warnings: impl IntoIterator<Item = ComposeWarning>) {
        for warning in warnings {
            self.push(warning);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<ComposeWarning> {
        self.items
    }
}
