//! Confining untrusted relative paths to the share root.
//!
//! Every path that arrives from a client goes through [`PathSandbox::resolve`]
//! before it touches the filesystem. Resolution is purely lexical: the share
//! root is itself built out of symbolic links to the shared directories, so
//! canonicalizing would reject every legitimate path. Containment is
//! therefore checked on the normalized component list, never on the resolved
//! target of a link.

use std::path::{Path, PathBuf};

/// Windows device names that cannot be used as file names.
const WINDOWS_DEVICE_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "LPT1", "LPT2", "LPT3",
];

/// Resolves client-supplied paths against a fixed root.
#[derive(Debug, Clone)]
pub struct PathSandbox {
    root: PathBuf,
}

impl PathSandbox {
    /// Create a sandbox rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root every resolved path stays under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `user_input` to a path inside the root.
    ///
    /// See [`resolve`].
    pub fn resolve(&self, user_input: &str) -> PathBuf {
        resolve(&self.root, user_input)
    }

    /// Whether `path` is the root itself.
    pub fn is_root(&self, path: &Path) -> bool {
        path == self.root
    }
}

/// Resolve `user_input` against `root`.
///
/// The input is first joined component by component, with `.` dropped and
/// `..` popping the previous component. Absolute inputs, backslashes, NUL
/// bytes, and any `..` that would climb above the root make the join fail.
/// On failure the whole input is reduced to a single safe file name with
/// [`secure_filename`] and placed directly under the root; an input that
/// sanitizes to nothing resolves to the root itself.
///
/// Never fails, and the returned path always starts with `root`.
pub fn resolve(root: &Path, user_input: &str) -> PathBuf {
    if let Some(joined) = safe_join(root, user_input) {
        return joined;
    }

    let name = secure_filename(user_input);
    tracing::debug!(input = %user_input, sanitized = %name, "path escaped root, falling back to file name");
    if name.is_empty() {
        root.to_path_buf()
    } else {
        root.join(name)
    }
}

/// Join `user_input` under `root`, or `None` if it would escape.
pub fn safe_join(root: &Path, user_input: &str) -> Option<PathBuf> {
    if user_input.starts_with('/') || user_input.contains('\\') || user_input.contains('\0') {
        return None;
    }

    let mut parts: Vec<&str> = Vec::new();
    for part in user_input.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            #[cfg(windows)]
            part if part.contains(':') => return None,
            part => parts.push(part),
        }
    }

    let mut joined = root.to_path_buf();
    joined.extend(parts);
    Some(joined)
}

/// Reduce an arbitrary string to a file name safe to place in a directory.
///
/// Non-ASCII characters are dropped, path separators become spaces, runs of
/// whitespace become a single `_`, anything outside `[A-Za-z0-9_.-]` is
/// removed, and leading or trailing `.` and `_` are stripped. The result may
/// be empty.
pub fn secure_filename(name: &str) -> String {
    let spaced: String = name
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");

    let filtered: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();

    let trimmed = filtered.trim_matches(|c| c == '.' || c == '_');

    if cfg!(windows) && !trimmed.is_empty() {
        let stem = trimmed.split('.').next().unwrap_or_default().to_ascii_uppercase();
        if WINDOWS_DEVICE_NAMES.contains(&stem.as_str()) {
            return format!("_{trimmed}");
        }
    }

    trimmed.to_string()
}
