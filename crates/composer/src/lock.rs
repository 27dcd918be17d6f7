use crate::error::{ComposerError, Result};
use crate::project::Project;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::PathBuf;

/// Exclusive advisory lock on a project's modules directory.
///
/// Released when dropped, on every exit path.
#[derive(Debug)]
pub struct ProjectLock {
    file: File,
    path: PathBuf,
}

impl ProjectLock {
    /// Take the lock or fail fast with `ConcurrentOperation`
    pub fn acquire(project: &Project) -> Result<Self> {
        let path = project.lock_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|err| ComposerError::io(parent, err))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|err| ComposerError::io(&path, err))?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                log::debug!("Acquired project lock {}", path.display());
                Ok(Self { file, path })
            }
            Err(err) if is_contended(&err) => Err(ComposerError::ConcurrentOperation { path }),
            Err(err) => Err(ComposerError::io(&path, err)),
        }
    }
}

impl Drop for ProjectLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        log::debug!("Released project lock {}", self.path.display());
    }
}

fn is_contended(err: &std::io::Error) -> bool {
    err.kind() == std::io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_acquire_fails_until_release() {
        let dir = TempDir::new().unwrap();
        let project = Project::new(dir.path(), "main.py");

        let held = ProjectLock::acquire(&project).unwrap();
        let err = ProjectLock::acquire(&project).unwrap_err();
        assert!(matches!(err, ComposerError::ConcurrentOperation { .. }));

        drop(held);
        assert!(ProjectLock::acquire(&project).is_ok());
    }
}
