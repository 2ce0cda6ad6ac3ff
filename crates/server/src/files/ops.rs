//! Single-shot file management: delete, move, create.

use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use super::sandbox::PathSandbox;

/// Errors that can occur during a file operation.
#[derive(Debug, Error)]
pub enum OpsError {
    /// A request field is missing or refers to something not allowed.
    #[error("{0}")]
    InvalidInput(&'static str),

    /// The path to operate on does not exist.
    #[error("not found: {0}")]
    NotFound(PathBuf),

    /// The parent of a move destination does not exist.
    #[error("destination parent does not exist: {0}")]
    DestinationMissing(PathBuf),

    /// The path to create is already taken.
    #[error("already exists: {0}")]
    AlreadyExists(PathBuf),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// File management confined to a share root.
#[derive(Debug, Clone)]
pub struct FileOps {
    sandbox: PathSandbox,
}

impl FileOps {
    /// Create file operations rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            sandbox: PathSandbox::new(root),
        }
    }

    /// Delete a file or a directory tree.
    ///
    /// A link is removed without touching what it points at. The root
    /// itself can never be deleted.
    pub fn delete(&self, path: &str) -> Result<PathBuf, OpsError> {
        if path.trim().is_empty() {
            return Err(OpsError::InvalidInput("Invalid path. Do not delete root."));
        }

        let target = self.sandbox.resolve(path);
        if self.sandbox.is_root(&target) {
            return Err(OpsError::InvalidInput("You cannot delete the root directory."));
        }
        if !target.exists() {
            return Err(OpsError::NotFound(target));
        }

        let metadata = fs::symlink_metadata(&target)?;
        if metadata.is_dir() {
            fs::remove_dir_all(&target)?;
        } else {
            fs::remove_file(&target)?;
        }

        info!(path = %target.display(), "deleted");
        Ok(target)
    }

    /// Move a file or directory.
    ///
    /// When the destination is an existing directory the source is moved
    /// into it, otherwise the source is renamed to the destination. An empty
    /// destination means the root. Moves across filesystems fall back to
    /// copy and delete.
    pub fn move_item(&self, source: &str, destination: &str) -> Result<PathBuf, OpsError> {
        if source.trim().is_empty() {
            return Err(OpsError::InvalidInput("Invalid path"));
        }

        let source = self.sandbox.resolve(source);
        let mut destination = self.sandbox.resolve(destination);

        if !source.exists() {
            return Err(OpsError::NotFound(source));
        }
        if self.sandbox.is_root(&source) {
            return Err(OpsError::InvalidInput("Invalid path"));
        }

        if destination.is_dir() {
            if let Some(name) = source.file_name() {
                destination.push(name);
            }
        }

        match fs::rename(&source, &destination) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(OpsError::DestinationMissing(destination));
            }
            Err(e) if e.kind() == ErrorKind::CrossesDevices => {
                copy_recursive(&source, &destination)?;
                remove_any(&source)?;
            }
            Err(e) => return Err(e.into()),
        }

        info!(from = %source.display(), to = %destination.display(), "moved");
        Ok(destination)
    }

    /// Create an empty file, along with any missing parent directories.
    pub fn new_file(&self, filename: &str) -> Result<PathBuf, OpsError> {
        if filename.trim().is_empty() {
            return Err(OpsError::InvalidInput("Invalid file name"));
        }

        let target = self.sandbox.resolve(filename);
        if self.sandbox.is_root(&target) {
            return Err(OpsError::AlreadyExists(target));
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        match OpenOptions::new().write(true).create_new(true).open(&target) {
            Ok(_) => {
                info!(path = %target.display(), "file created");
                Ok(target)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(OpsError::AlreadyExists(target)),
            Err(e) => Err(e.into()),
        }
    }

    /// Create a directory and its parents. Existing directories are fine.
    pub fn new_folder(&self, foldername: &str) -> Result<PathBuf, OpsError> {
        if foldername.trim().is_empty() {
            return Err(OpsError::InvalidInput("Invalid folder name"));
        }

        let target = self.sandbox.resolve(foldername);
        match fs::create_dir_all(&target) {
            Ok(()) => {
                info!(path = %target.display(), "folder created");
                Ok(target)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(OpsError::AlreadyExists(target)),
            Err(e) => Err(e.into()),
        }
    }
}

fn copy_recursive(from: &Path, to: &Path) -> std::io::Result<()> {
    if fs::metadata(from)?.is_dir() {
        fs::create_dir(to)?;
        for entry in fs::read_dir(from)? {
            let entry = entry?;
            copy_recursive(&entry.path(), &to.join(entry.file_name()))?;
        }
    } else {
        fs::copy(from, to)?;
    }
    Ok(())
}

fn remove_any(path: &Path) -> std::io::Result<()> {
    if fs::symlink_metadata(path)?.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}
