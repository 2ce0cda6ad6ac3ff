//! The directory served to clients.
//!
//! A single shared directory is served as is. Anything else (several paths,
//! or a lone file) is gathered into a temporary directory holding one link
//! per shared path, named after the path's last component. The temporary
//! directory is removed on [`ShareRoot::close`] or drop; the shared paths
//! themselves are never touched.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use tempfile::TempDir;
use tracing::info;

/// Root directory of everything being shared.
#[derive(Debug)]
pub struct ShareRoot {
    root: PathBuf,
    staging: Option<TempDir>,
}

impl ShareRoot {
    /// Build the root for `paths`.
    ///
    /// Fails if a path does not exist, has no final component, or shares
    /// its final component with another path.
    pub fn new(paths: &[PathBuf]) -> Result<Self> {
        if paths.is_empty() {
            bail!("No paths to share");
        }

        let resolved = paths
            .iter()
            .map(|p| {
                fs::canonicalize(p)
                    .with_context(|| format!("The path {} does not exist", p.display()))
            })
            .collect::<Result<Vec<_>>>()?;

        if let [only] = resolved.as_slice() {
            if only.is_dir() {
                return Ok(Self {
                    root: only.clone(),
                    staging: None,
                });
            }
        }

        let staging = tempfile::Builder::new()
            .prefix("qrshare-")
            .tempdir()
            .context("Failed to create staging directory")?;

        let mut names = HashSet::new();
        for path in &resolved {
            let name = path
                .file_name()
                .ok_or_else(|| anyhow!("Cannot share {}", path.display()))?;
            if !names.insert(name.to_os_string()) {
                bail!("More than one shared path is named {:?}", name);
            }

            let link = staging.path().join(name);
            create_link(path, &link).with_context(|| {
                format!("Failed to link {} into the share root", path.display())
            })?;
            info!("Symbolic link created: {} -> {}", path.display(), link.display());
        }

        Ok(Self {
            root: staging.path().to_path_buf(),
            staging: Some(staging),
        })
    }

    /// The directory to serve.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Whether the root is a temporary directory of links.
    pub fn is_staged(&self) -> bool {
        self.staging.is_some()
    }

    /// Remove the temporary directory, if any.
    pub fn close(self) -> Result<()> {
        if let Some(staging) = self.staging {
            let path = staging.path().to_path_buf();
            staging
                .close()
                .with_context(|| format!("Failed to remove {}", path.display()))?;
            info!("Cleanup {}", path.display());
        }
        Ok(())
    }
}

#[cfg(unix)]
fn create_link(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn create_link(target: &Path, link: &Path) -> std::io::Result<()> {
    if target.is_dir() {
        std::os::windows::fs::symlink_dir(target, link)
    } else {
        std::os::windows::fs::symlink_file(target, link)
    }
}
