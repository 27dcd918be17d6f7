use crate::checksum::sha256_hex;
use crate::error::{ComposerError, Result};
use crate::project::Project;
use modforge_parser::{CommentPolicy, Declaration, DeclarationKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const SCHEMA_VERSION: u32 = 1;

/// Everything recomposition needs to restore the original file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMetadata {
    pub schema_version: u32,

    /// Decomposed source, relative to the modules directory's parent when possible
    pub source_file: PathBuf,

    /// SHA-256 of the whole source at decomposition time
    pub source_checksum: String,

    pub comment_policy: CommentPolicy,

    /// Non-empty categories in module order
    pub categories: Vec<String>,

    /// Keyed by declaration id
    pub entries: BTreeMap<String, MetadataEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub order: usize,
    pub category: String,
    /// SHA-256 of the text written to the module file
    pub checksum: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// False when the writer had to append a newline after the text
    pub ends_with_newline: bool,
}

impl MetadataEntry {
    #[must_use]
    pub fn kind(&self) -> Option<DeclarationKind> {
        DeclarationKind::from_label(&self.kind)
    }
}

impl ProjectMetadata {
    /// Entry ids sorted by order index
    #[must_use]
    pub fn ids_in_order(&self) -> Vec<&str> {
        let mut ids: Vec<(&str, usize)> = self
            .entries
            .iter()
            .map(|(id, entry)| (id.as_str(), entry.order))
            .collect();
        ids.sort_by_key(|(_, order)| *order);
        ids.into_iter().map(|(id, _)| id).collect()
    }
}

/// Accumulates entries during decomposition
#[derive(Debug)]
pub struct MetadataStore {
    source_file: PathBuf,
    policy: CommentPolicy,
    categories: Vec<String>,
    entries: BTreeMap<String, MetadataEntry>,
}

impl MetadataStore {
    pub fn new(source_file: impl Into<PathBuf>, policy: CommentPolicy) -> Self {
        Self {
            source_file: source_file.into(),
            policy,
            categories: Vec::new(),
            entries: BTreeMap::new(),
        }
    }

    /// Record one declaration's assignment
    pub fn record(&mut self, declaration: &Declaration, category: &str) {
        let rendered = declaration.render(self.policy);
        if !self.categories.iter().any(|c| c == category) {
            self.categories.push(category.to_string());
        }
        self.entries.insert(
            declaration.id.clone(),
            MetadataEntry {
                order: declaration.order,
                category: category.to_string(),
                checksum: sha256_hex(&rendered),
                kind: declaration.kind.as_str().to_string(),
                name: declaration.name.clone(),
                ends_with_newline: rendered.is_empty() || rendered.ends_with('\n'),
            },
        );
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Close the store with the whole-file checksum
    #[must_use]
    pub fn finalize(self, source_checksum: &str) -> ProjectMetadata {
        ProjectMetadata {
            schema_version: SCHEMA_VERSION,
            source_file: self.source_file,
            source_checksum: source_checksum.to_string(),
            comment_policy: self.policy,
            categories: self.categories,
            entries: self.entries,
        }
    }

    /// Load persisted metadata, failing with `MetadataMissing` when absent
    pub fn load(project: &Project) -> Result<ProjectMetadata> {
        let path = project.metadata_path();
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(ComposerError::MetadataMissing { path });
            }
            Err(err) => return Err(ComposerError::io(&path, err)),
        };

        let metadata: ProjectMetadata = serde_json::from_slice(&bytes)
            .map_err(|err| ComposerError::metadata(&path, err.to_string()))?;
        if metadata.schema_version > SCHEMA_VERSION {
            return Err(ComposerError::metadata(
                &path,
                format!("unsupported schema version {}", metadata.schema_version),
            ));
        }
        Ok(metadata)
    }
}

/// Create `path` with `bytes` and flush it to disk
pub(crate) fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// Write through a temp file in the same directory, then rename over `path`
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(parent).map_err(|err| ComposerError::io(parent, err))?;

    let tmp = parent.join(format!(
        ".{}.tmp-{}",
        path.file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("modforge"),
        std::process::id()
    ));

    if let Err(err) = write_synced(&tmp, bytes) {
        let _ = std::fs::remove_file(&tmp);
        return Err(ComposerError::io(&tmp, err));
    }

    std::fs::rename(&tmp, path).map_err(|err| {
        let _ = std::fs::remove_file(&tmp);
        ComposerError::io(path, err)
    })
}
