use crate::classifier::Module;
use crate::error::{ComposerError, Result};
use crate::format;
use crate::metadata::{write_synced, ProjectMetadata};
use crate::project::Project;
use modforge_parser::CommentPolicy;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Staged metadata file name; modules always end in `.py`
const STAGED_METADATA: &str = "metadata.json";

/// Serializes modules into `<modules_dir>/<category>.py`
pub struct ModuleWriter<'a> {
    project: &'a Project,
    policy: CommentPolicy,
    source_name: String,
}

impl<'a> ModuleWriter<'a> {
    pub fn new(project: &'a Project, policy: CommentPolicy) -> Self {
        let source_name = project
            .main_file()
            .and_then(Path::file_name)
            .map_or_else(|| "source".to_string(), |n| n.to_string_lossy().into_owned());
        Self {
            project,
            policy,
            source_name,
        }
    }

    /// File contents for one module; byte-identical for identical input
    #[must_use]
    pub fn render(&self, module: &Module) -> String {
        let mut out = format::header(&self.source_name, &module.category);
        for declaration in &module.declarations {
            out.push_str(&format::marker(&declaration.id));
            let rendered = declaration.render(self.policy);
            let text = format::escape_reserved(&rendered);
            out.push_str(&text);
            if !text.is_empty() && !text.ends_with('\n') {
                out.push('\n');
            }
        }
        out
    }

    /// Contents of `__init__.py` for a set of modules
    #[must_use]
    pub fn render_init(&self, modules: &[Module]) -> String {
        let names: Vec<String> = modules.iter().map(|m| m.category.clone()).collect();
        format::init_contents(&self.source_name, &names)
    }

    /// Start a staged write; neither modules nor metadata change until commit
    pub fn stage(&self) -> Result<StagedModules> {
        let staging = self.project.staging_dir();
        if staging.exists() {
            std::fs::remove_dir_all(&staging).map_err(|err| ComposerError::io(&staging, err))?;
        }
        std::fs::create_dir_all(&staging).map_err(|err| ComposerError::io(&staging, err))?;
        Ok(StagedModules {
            staging,
            modules_dir: self.project.modules_dir().to_path_buf(),
            metadata_path: self.project.metadata_path(),
            files: Vec::new(),
            metadata_staged: false,
            committed: false,
        })
    }
}

/// Module files and metadata written to the staging directory.
///
/// Dropping without [`StagedModules::commit`] deletes everything staged.
#[derive(Debug)]
pub struct StagedModules {
    staging: PathBuf,
    modules_dir: PathBuf,
    metadata_path: PathBuf,
    files: Vec<String>,
    metadata_staged: bool,
    committed: bool,
}

impl StagedModules {
    pub fn write(&mut self, file_name: &str, contents: &str) -> Result<()> {
        let path = self.staging.join(file_name);
        std::fs::write(&path, contents).map_err(|err| ComposerError::io(&path, err))?;
        log::debug!("Staged {}", path.display());
        self.files.push(file_name.to_string());
        Ok(())
    }

    /// Serialize metadata next to the staged modules
    pub fn write_metadata(&mut self, metadata: &ProjectMetadata) -> Result<()> {
        let path = self.staged_metadata_path();
        let bytes = serde_json::to_vec_pretty(metadata)
            .map_err(|err| ComposerError::metadata(&self.metadata_path, err.to_string()))?;
        write_synced(&path, &bytes).map_err(|err| ComposerError::io(&path, err))?;
        log::debug!(
            "Staged metadata for {} declarations",
            metadata.entries.len()
        );
        self.metadata_staged = true;
        Ok(())
    }

    fn staged_metadata_path(&self) -> PathBuf {
        self.staging.join(STAGED_METADATA)
    }

    /// Move staged files into place, then the metadata, and remove generated
    /// files that were not rewritten
    pub fn commit(mut self) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(self.files.len());
        for file_name in &self.files {
            let from = self.staging.join(file_name);
            let to = self.modules_dir.join(file_name);
            std::fs::rename(&from, &to).map_err(|err| ComposerError::io(&to, err))?;
            written.push(to);
        }

        if self.metadata_staged {
            let from = self.staged_metadata_path();
            std::fs::rename(&from, &self.metadata_path)
                .map_err(|err| ComposerError::io(&self.metadata_path, err))?;
        }

        let keep: BTreeSet<&str> = self.files.iter().map(String::as_str).collect();
        remove_stale_modules(&self.modules_dir, &keep)?;

        self.committed = true;
        let _ = std::fs::remove_dir_all(&self.staging);
        Ok(written)
    }
}

impl Drop for StagedModules {
    fn drop(&mut self) {
        if !self.committed {
            log::debug!("Discarding staged modules in {}", self.staging.display());
            let _ = std::fs::remove_dir_all(&self.staging);
        }
    }
}

/// Delete `*.py` files in `dir` that carry the generated header and are not in `keep`
fn remove_stale_modules(dir: &Path, keep: &BTreeSet<&str>) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|err| ComposerError::io(dir, err))?;
    for entry in entries {
        let entry = entry.map_err(|err| ComposerError::io(dir, err))?;
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.ends_with(".py") || keep.contains(name) || !path.is_file() {
            continue;
        }
        let generated = std::fs::read_to_string(&path)
            .map(|contents| format::is_generated(&contents))
            .unwrap_or(false);
        if generated {
            std::fs::remove_file(&path).map_err(|err| ComposerError::io(&path, err))?;
            log::info!("Removed stale module {}", path.display());
        }
    }
    Ok(())
}
