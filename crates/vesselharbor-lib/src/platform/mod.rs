//! Local filesystem primitives for private state: advisory locking,
//! atomic replacement and owner-only permissions.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Platform-specific storage errors
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Failed to lock {}: {source}", path.display())]
    LockFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {}: {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to prepare directory {}: {source}", path.display())]
    DirectoryFailed {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Exclusive advisory lock held for the lifetime of the value
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Block until an exclusive lock on `path` is acquired, creating the
    /// lock file when missing.
    pub fn exclusive(path: &Path) -> Result<Self, PlatformError> {
        if let Some(parent) = path.parent() {
            ensure_private_dir(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .map_err(|source| PlatformError::LockFailed {
                path: path.to_path_buf(),
                source,
            })?;

        file.lock().map_err(|source| PlatformError::LockFailed {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::trace!(path = %path.display(), "acquired lock");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release lock");
        }
    }
}

/// Replace `path` with `contents` so readers observe either the old or the
/// new file, never a partial write. The result is readable by the owner only.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), PlatformError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    ensure_private_dir(parent)?;

    let write_failed = |source: std::io::Error| PlatformError::WriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(write_failed)?;
    temp.write_all(contents).map_err(write_failed)?;
    temp.as_file().sync_all().map_err(write_failed)?;
    restrict_to_owner(temp.path()).map_err(write_failed)?;
    temp.persist(path).map_err(|e| write_failed(e.error))?;

    tracing::trace!(path = %path.display(), bytes = contents.len(), "wrote file atomically");
    Ok(())
}

/// Create `dir` (and parents) if needed; new directories are owner-only.
pub fn ensure_private_dir(dir: &Path) -> Result<(), PlatformError> {
    if dir.is_dir() {
        return Ok(());
    }

    fs::create_dir_all(dir).map_err(|source| PlatformError::DirectoryFailed {
        path: dir.to_path_buf(),
        source,
    })?;

    #[cfg(target_family = "unix")]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700)).map_err(|source| {
            PlatformError::DirectoryFailed {
                path: dir.to_path_buf(),
                source,
            }
        })?;
    }

    Ok(())
}

#[cfg(target_family = "unix")]
fn restrict_to_owner(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(target_family = "unix"))]
fn restrict_to_owner(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    include!("mod.test.rs");
}
