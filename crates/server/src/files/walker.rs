//! Recursive directory traversal that follows symbolic links.
//!
//! The share root is assembled from links, so traversal has to follow them,
//! and a link pointing back at one of its ancestors would otherwise send the
//! walk around the same cycle forever. Each directory reached through a link
//! is identified by the device and inode of its target; the first time an
//! identity is seen it is recorded and the walk continues, any later time the
//! walk is cut short according to the configured [`CycleGuard`].
//!
//! A link whose target is gone is reported as a file, so listings show it.
//! Archives built from a traversal leave such entries out.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// What to do when a directory link whose target was already seen is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CycleGuard {
    /// Abandon the repeated link and every sibling directory after it.
    ///
    /// Always terminates but drops the remaining siblings of the repeated
    /// link, even those that have nothing to do with the cycle.
    #[default]
    Coarse,
    /// Skip only the repeated link and keep scanning its siblings.
    PerEntry,
}

/// A file reached during traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Path to open, under the traversal root.
    pub absolute_path: PathBuf,
    /// Path relative to the traversal root.
    pub relative_path: PathBuf,
}

/// A directory reached during traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Path relative to the traversal root.
    pub relative_path: PathBuf,
}

/// Files and directories found below a traversal root, in visit order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraversalResult {
    /// Every non-directory entry, including dangling links.
    pub files: Vec<FileEntry>,
    /// Every directory entry that was descended into.
    pub dirs: Vec<DirEntry>,
}

impl TraversalResult {
    /// Relative file paths with `/` separators.
    pub fn file_paths(&self) -> Vec<String> {
        self.files
            .iter()
            .map(|f| slash_path(&f.relative_path))
            .collect()
    }

    /// Relative directory paths with `/` separators.
    pub fn dir_paths(&self) -> Vec<String> {
        self.dirs
            .iter()
            .map(|d| slash_path(&d.relative_path))
            .collect()
    }
}

/// Render a relative path with `/` separators regardless of platform.
pub fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Identity of the directory a link resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum LinkIdentity {
    #[cfg(unix)]
    Inode { dev: u64, ino: u64 },
    #[cfg(not(unix))]
    Canonical(PathBuf),
}

impl LinkIdentity {
    #[cfg(unix)]
    fn of(path: &Path) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;

        let metadata = fs::metadata(path).ok()?;
        Some(Self::Inode {
            dev: metadata.dev(),
            ino: metadata.ino(),
        })
    }

    #[cfg(not(unix))]
    fn of(path: &Path) -> Option<Self> {
        fs::canonicalize(path).ok().map(Self::Canonical)
    }
}

/// Link targets seen during a single traversal.
#[derive(Debug, Default)]
struct VisitedLinkSet {
    seen: HashSet<LinkIdentity>,
}

impl VisitedLinkSet {
    /// Record `identity`; returns `false` if it was already present.
    fn insert(&mut self, identity: LinkIdentity) -> bool {
        self.seen.insert(identity)
    }
}

/// Walks a directory tree, following links, without looping on link cycles.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryWalker {
    guard: CycleGuard,
}

impl DirectoryWalker {
    /// Create a walker with the given cycle guard.
    pub fn new(guard: CycleGuard) -> Self {
        Self { guard }
    }

    /// The cycle guard in use.
    pub fn guard(&self) -> CycleGuard {
        self.guard
    }

    /// Walk everything below `root`.
    ///
    /// Directories are visited top-down, each one fully classified before
    /// its children are entered, and entries keep the order the filesystem
    /// returns them in. Directories that cannot be read are skipped. A
    /// missing or unreadable `root` yields an empty result.
    pub fn walk(&self, root: &Path) -> TraversalResult {
        let mut result = TraversalResult::default();
        let mut visited = VisitedLinkSet::default();
        let mut pending = vec![root.to_path_buf()];

        while let Some(dir) = pending.pop() {
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) => {
                    debug!(path = %dir.display(), error = %e, "skipping unreadable directory");
                    continue;
                }
            };

            let mut subdirs = Vec::new();
            for entry in entries.flatten() {
                let path = entry.path();
                // fs::metadata follows links, so a link to a directory lands here too.
                let is_dir = fs::metadata(&path).map(|m| m.is_dir()).unwrap_or(false);
                if is_dir {
                    let is_link = entry.file_type().map(|t| t.is_symlink()).unwrap_or(false);
                    subdirs.push((path, is_link));
                } else {
                    result.files.push(FileEntry {
                        relative_path: relative_to(root, &path),
                        absolute_path: path,
                    });
                }
            }

            let mut accepted = Vec::with_capacity(subdirs.len());
            for (path, is_link) in subdirs {
                if is_link {
                    let Some(identity) = LinkIdentity::of(&path) else {
                        continue;
                    };
                    if !visited.insert(identity) {
                        debug!(path = %path.display(), guard = ?self.guard, "directory link already visited");
                        match self.guard {
                            CycleGuard::Coarse => break,
                            CycleGuard::PerEntry => continue,
                        }
                    }
                }
                result.dirs.push(DirEntry {
                    relative_path: relative_to(root, &path),
                });
                accepted.push(path);
            }

            // Reversed so the first child is popped first, keeping pre-order.
            pending.extend(accepted.into_iter().rev());
        }

        result
    }
}

fn relative_to(root: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}
