use crate::cancel::CancellationToken;
use crate::checksum::sha256_hex;
use crate::classifier::Classifier;
use crate::cleaner::Cleaner;
use crate::config::ModforgeConfig;
use crate::error::{ComposerError, Result};
use crate::format;
use crate::lock::ProjectLock;
use crate::merger::Merger;
use crate::metadata::{write_atomic, MetadataStore, ProjectMetadata};
use crate::project::Project;
use crate::reader::ModuleReader;
use crate::warning::{ComposeWarning, Warnings};
use crate::writer::ModuleWriter;
use modforge_parser::SourceParser;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// One written module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSummary {
    pub category: String,
    pub path: PathBuf,
    pub declarations: usize,
}

#[derive(Debug, Clone)]
pub struct DecomposeReport {
    pub source_file: PathBuf,
    pub declarations: usize,
    pub modules: Vec<ModuleSummary>,
    pub metadata_path: PathBuf,
    pub warnings: Vec<ComposeWarning>,
}

/// Source file → per-category modules + metadata
pub struct Decomposer {
    config: ModforgeConfig,
    cancel: CancellationToken,
}

impl Decomposer {
    pub fn new(config: ModforgeConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn run(&self, project: &Project) -> Result<DecomposeReport> {
        let started = Instant::now();
        let source_file = project
            .main_file()
            .ok_or_else(|| ComposerError::invalid_config("decomposition needs a source file"))?
            .to_path_buf();

        let source = std::fs::read_to_string(&source_file)
            .map_err(|err| ComposerError::io(&source_file, err))?;
        let mut parser = SourceParser::new()?;
        let declarations = parser.parse(&source)?;
        log::info!(
            "Parsed {} declarations from {}",
            declarations.len(),
            source_file.display()
        );

        let modules_dir = project.modules_dir();
        std::fs::create_dir_all(modules_dir).map_err(|err| ComposerError::io(modules_dir, err))?;
        let _lock = ProjectLock::acquire(project)?;
        self.cancel.check("after parse")?;

        let classifier = Classifier::new(&self.config)?;
        let (modules, ambiguities) = classifier.partition(&declarations);
        let mut warnings = Warnings::default();
        warnings.extend(ambiguities);
        self.cancel.check("after classify")?;

        let policy = self.config.decompose.comment_policy();
        let writer = ModuleWriter::new(project, policy);
        let mut staged = writer.stage()?;
        let mut summaries = Vec::with_capacity(modules.len());
        for module in &modules {
            let file_name = module.file_name();
            staged.write(&file_name, &writer.render(module))?;
            summaries.push(ModuleSummary {
                category: module.category.clone(),
                path: module.path(modules_dir),
                declarations: module.declarations.len(),
            });
            self.cancel.check("after module write")?;
        }
        if self.config.decompose.generate_init {
            staged.write(format::INIT_FILE, &writer.render_init(&modules))?;
        }

        let mut store = MetadataStore::new(project.portable_source_path(&source_file), policy);
        for module in &modules {
            for declaration in &module.declarations {
                store.record(declaration, &module.category);
            }
        }
        staged.write_metadata(&store.finalize(&sha256_hex(&source)))?;
        staged.commit()?;

        log::info!(
            "Decomposed {} into {} modules in {:.2?}",
            source_file.display(),
            summaries.len(),
            started.elapsed()
        );

        Ok(DecomposeReport {
            source_file,
            declarations: declarations.len(),
            modules: summaries,
            metadata_path: project.metadata_path(),
            warnings: warnings.into_vec(),
        })
    }
}

/// Options of one recomposition
#[derive(Debug, Clone, Default)]
pub struct RecomposeOptions {
    /// Destination; defaults to `<modules_dir>_built.py` next to the modules directory
    pub output: Option<PathBuf>,
    /// Drop duplicate imports and run the Cleaner on the merged body
    pub cleanup: bool,
}

#[derive(Debug, Clone)]
pub struct RecomposeReport {
    pub output: PathBuf,
    pub declarations: usize,
    /// Order came from metadata with no fallback
    pub exact: bool,
    pub deduplicated_imports: Vec<String>,
    pub removed_imports: Vec<String>,
    pub warnings: Vec<ComposeWarning>,
}

/// Modules + metadata → one source file
pub struct Recomposer {
    config: ModforgeConfig,
    cancel: CancellationToken,
}

impl Recomposer {
    pub fn new(config: ModforgeConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Recompose and write the output file atomically, all under the project lock
    pub fn run(&self, project: &Project, options: &RecomposeOptions) -> Result<RecomposeReport> {
        let started = Instant::now();
        let _lock = lock_modules_dir(project)?;
        let (body, mut report) = self.compose_locked(project, options.cleanup)?;

        let output = options
            .output
            .clone()
            .unwrap_or_else(|| project.default_output());
        write_atomic(&output, body.as_bytes())?;
        report.output = output;

        log::info!(
            "Recomposed {} declarations into {} in {:.2?}",
            report.declarations,
            report.output.display(),
            started.elapsed()
        );
        Ok(report)
    }

    /// Recompose into memory; the report's `output` is left empty
    pub fn compose(&self, project: &Project, cleanup: bool) -> Result<(String, RecomposeReport)> {
        let _lock = lock_modules_dir(project)?;
        self.compose_locked(project, cleanup)
    }

    fn compose_locked(&self, project: &Project, cleanup: bool) -> Result<(String, RecomposeReport)> {
        let modules_dir = project.modules_dir();
        let mut warnings = Warnings::default();

        let metadata = match MetadataStore::load(project) {
            Ok(metadata) => Some(metadata),
            Err(ComposerError::MetadataMissing { path }) => {
                warnings.push(ComposeWarning::MetadataMissing { path });
                None
            }
            Err(err) => return Err(err),
        };
        if let Some(metadata) = &metadata {
            if let Some(drift) = detect_drift(project, metadata) {
                warnings.push(drift);
            }
        }

        let reconstruction = ModuleReader::new(project)
            .with_cancellation(self.cancel.clone())
            .read(metadata.as_ref())?;
        warnings.extend(reconstruction.warnings);
        log::debug!(
            "Read {} declarations from {}",
            reconstruction.declarations.len(),
            modules_dir.display()
        );

        // Without cleanup the body must match the modules byte for byte.
        let merged = Merger::new(cleanup && self.config.cleanup.dedupe_imports)
            .merge(&reconstruction.declarations);
        let mut body = merged.body;
        let mut removed_imports = Vec::new();

        if cleanup {
            self.cancel.check("before cleanup")?;
            let cleaned = Cleaner::new(&self.config.cleanup).clean(&body);
            warnings.extend(cleaned.warnings);
            body = cleaned.body;
            removed_imports = cleaned.removed_imports;
        }

        Ok((
            body,
            RecomposeReport {
                output: PathBuf::new(),
                declarations: reconstruction.declarations.len(),
                exact: reconstruction.exact,
                deduplicated_imports: merged.deduplicated,
                removed_imports,
                warnings: warnings.into_vec(),
            },
        ))
    }
}

/// Lock an existing modules directory; never creates it
fn lock_modules_dir(project: &Project) -> Result<ProjectLock> {
    let modules_dir = project.modules_dir();
    if !modules_dir.is_dir() {
        return Err(ComposerError::ModulesDirMissing(modules_dir.to_path_buf()));
    }
    ProjectLock::acquire(project)
}

/// Compare the live source against the checksum captured at decomposition
fn detect_drift(project: &Project, metadata: &ProjectMetadata) -> Option<ComposeWarning> {
    let source_file = project
        .main_file()
        .map_or_else(|| project.resolve_source_path(&metadata.source_file), Path::to_path_buf);

    match std::fs::read(&source_file) {
        Ok(bytes) if sha256_hex(&bytes) != metadata.source_checksum => {
            Some(ComposeWarning::SourceDrift { source_file })
        }
        Ok(_) => None,
        Err(err) => {
            log::debug!(
                "Skipping drift check, cannot read {}: {err}",
                source_file.display()
            );
            None
        }
    }
}
