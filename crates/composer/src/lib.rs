//! # modforge composer
//!
//! Decomposes a monolithic Python file into per-category modules and
//! recomposes them, losslessly when nothing was edited in between.
//!
//! ## Architecture
//!
//! ```text
//! decompose:  SourceParser ─> Classifier ─> ModuleWriter (staged) ─> MetadataStore
//!                                                 │                        │
//!                                           <category>.py        .metadata/metadata.json
//!                                                 │                        │
//! recompose:              ModuleReader <──────────┴────────────────────────┘
//!                              │
//!                              └─> Merger ─> Cleaner (optional) ─> <modules>_built.py
//! ```
//!
//! Both paths hold an exclusive lock on the modules directory and check a
//! [`CancellationToken`] between steps.
//!
//! ## Example
//!
//! ```no_run
//! use modforge_composer::{Decomposer, ModforgeConfig, Project, RecomposeOptions, Recomposer};
//!
//! let project = Project::new("/work/app", "main.py");
//! let config = ModforgeConfig::default();
//!
//! let split = Decomposer::new(config.clone()).run(&project).unwrap();
//! println!("wrote {} modules", split.modules.len());
//!
//! let built = Recomposer::new(config).run(&project, &RecomposeOptions::default()).unwrap();
//! println!("rebuilt {}", built.output.display());
//! ```

mod cancel;
mod checksum;
mod classifier;
mod cleaner;
mod config;
mod error;
mod format;
mod lock;
mod merger;
mod metadata;
mod pipeline;
mod project;
mod reader;
mod warning;
mod writer;

pub use cancel::CancellationToken;
pub use checksum::sha256_hex;
pub use classifier::{module_file_name, Classification, Classifier, Module};
pub use cleaner::{CleanOutput, Cleaner};
pub use config::{
    default_rules, CategoryRule, CleanupConfig, DecomposeConfig, DistConfig, DistTool, MatchKind,
    ModforgeConfig, DEFAULT_CATEGORIES, FALLBACK_CATEGORY,
};
pub use error::{ComposerError, Result};
pub use format::{HEADER_TAG, INIT_FILE, MARKER_PREFIX};
pub use lock::ProjectLock;
pub use merger::{MergeOutput, Merger};
pub use metadata::{MetadataEntry, MetadataStore, ProjectMetadata, SCHEMA_VERSION};
pub use pipeline::{
    DecomposeReport, Decomposer, ModuleSummary, RecomposeOptions, RecomposeReport, Recomposer,
};
pub use project::{Project, BUILT_SUFFIX, CONFIG_FILE, MODULES_DIR};
pub use reader::{ModuleReader, ReadDeclaration, Reconstruction};
pub use warning::{ComposeWarning, Warnings};
pub use writer::{ModuleWriter, StagedModules};
