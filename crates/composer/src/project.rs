use std::path::{Path, PathBuf};

/// Default modules directory name inside a project
pub const MODULES_DIR: &str = "modules";
/// Bookkeeping directory inside the modules directory
pub const METADATA_DIR: &str = ".metadata";
pub const METADATA_FILE: &str = "metadata.json";
pub const LOCK_FILE: &str = "modforge.lock";
pub const STAGING_DIR: &str = "staging";
/// Per-project configuration file
pub const CONFIG_FILE: &str = "modforge.toml";
/// Suffix of the default recompose output
pub const BUILT_SUFFIX: &str = "_built";

/// Where a project lives on disk. Read-only for both pipelines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    root: PathBuf,
    main_file: Option<PathBuf>,
    modules_dir: PathBuf,
}

impl Project {
    /// Project rooted at `root` whose entry file is `main_file` (relative to root
    /// unless absolute); modules go to `<root>/modules`
    pub fn new(root: impl Into<PathBuf>, main_file: impl AsRef<Path>) -> Self {
        let root = root.into();
        let main_file = root.join(main_file);
        let modules_dir = root.join(MODULES_DIR);
        Self {
            root,
            main_file: Some(main_file),
            modules_dir,
        }
    }

    /// Project made of a single source file; modules go next to it
    pub fn from_source_file(path: impl Into<PathBuf>) -> Self {
        let main_file = path.into();
        let root = main_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let modules_dir = root.join(MODULES_DIR);
        Self {
            root,
            main_file: Some(main_file),
            modules_dir,
        }
    }

    /// Project known only by its modules directory (recompose from `--modules-dir`)
    pub fn from_modules_dir(modules_dir: impl Into<PathBuf>) -> Self {
        let modules_dir = modules_dir.into();
        let root = modules_dir
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self {
            root,
            main_file: None,
            modules_dir,
        }
    }

    /// Override the modules directory (relative paths resolve against the root)
    #[must_use]
    pub fn with_modules_dir(mut self, modules_dir: impl AsRef<Path>) -> Self {
        self.modules_dir = self.root.join(modules_dir);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn main_file(&self) -> Option<&Path> {
        self.main_file.as_deref()
    }

    pub fn modules_dir(&self) -> &Path {
        &self.modules_dir
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.modules_dir.join(METADATA_DIR)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.metadata_dir().join(METADATA_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.metadata_dir().join(LOCK_FILE)
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.metadata_dir().join(STAGING_DIR)
    }

    /// `<parent of modules dir>/<modules dir name>_built.py`
    pub fn default_output(&self) -> PathBuf {
        let name = self
            .modules_dir
            .file_name()
            .map_or_else(|| MODULES_DIR.into(), |n| n.to_string_lossy());
        let parent = self.modules_dir.parent().unwrap_or(Path::new(""));
        parent.join(format!("{name}{BUILT_SUFFIX}.py"))
    }

    /// Source path as stored in metadata: relative to the modules directory's
    /// parent when the file lives below it
    pub(crate) fn portable_source_path(&self, source: &Path) -> PathBuf {
        match self.modules_dir.parent() {
            Some(base) => source
                .strip_prefix(base)
                .map_or_else(|_| source.to_path_buf(), Path::to_path_buf),
            None => source.to_path_buf(),
        }
    }

    /// Inverse of [`Project::portable_source_path`]
    pub(crate) fn resolve_source_path(&self, stored: &Path) -> PathBuf {
        if stored.is_absolute() {
            return stored.to_path_buf();
        }
        self.modules_dir
            .parent()
            .map_or_else(|| stored.to_path_buf(), |base| base.join(stored))
    }
}
