use modforge_parser::ParserError;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ComposerError>;

/// Fatal errors of the decompose and recompose paths
#[derive(Error, Debug)]
pub enum ComposerError {
    #[error(transparent)]
    Parse(#[from] ParserError),

    #[error("metadata not found at {}", path.display())]
    MetadataMissing { path: PathBuf },

    #[error("invalid metadata at {}: {message}", path.display())]
    Metadata { path: PathBuf, message: String },

    #[error("cannot read module file {}: {source}", path.display())]
    ModuleUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("modules directory not found: {}", .0.display())]
    ModulesDirMissing(PathBuf),

    #[error("another modforge operation is running (lock held on {})", path.display())]
    ConcurrentOperation { path: PathBuf },

    #[error("operation cancelled {stage}")]
    Cancelled { stage: &'static str },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ComposerError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn metadata(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self::Metadata {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// True for errors that describe an aborted rather than a failed run
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}
