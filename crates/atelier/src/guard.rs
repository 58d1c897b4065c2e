//! Path confinement for session workspaces.
//!
//! [`WorkspaceRoot`] is the single trust boundary between caller-supplied
//! paths (ultimately produced by an LLM) and the filesystem. Every tool
//! operation resolves its path through [`WorkspaceRoot::resolve`] before any
//! read or write happens.
//!
//! Resolution follows symlinks for every prefix of the path that exists on
//! disk, so a link pointing outside the workspace is caught even when the
//! final component has not been created yet:
//!
//! ```text
//! root/
//! ├── src/a.txt          "src/a.txt"          -> root/src/a.txt
//! ├── escape -> /etc     "escape/passwd"      -> REJECTED
//! └── ...                "../../etc/passwd"   -> REJECTED
//!                        "/etc/passwd"        -> REJECTED
//!                        "new/dir/../f.txt"   -> root/new/f.txt
//! ```

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

/// Reasons a path is refused by the guard.
#[derive(Debug, Error)]
pub enum ConfinementError {
    /// The workspace root itself is unusable.
    #[error("workspace root {path:?} is not an accessible directory: {source}")]
    InvalidRoot {
        /// The root that was supplied.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The resolved path lies outside the workspace.
    #[error("path {0:?} resolves outside of the workspace")]
    Escape(String),
    /// The path could not be resolved (dangling symlink, permission error, ...).
    #[error("path {path:?} could not be resolved: {source}")]
    Unresolvable {
        /// The caller-supplied path.
        path: String,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
}

/// The canonical root directory of one workspace.
///
/// Constructed once and never mutated; a tool channel is parameterized by a
/// `WorkspaceRoot`, so there is no state in which a tool runs without a root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceRoot {
    root: PathBuf,
}

impl WorkspaceRoot {
    /// Bind to an existing directory, canonicalizing it.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, ConfinementError> {
        let path = path.as_ref();
        let root = fs::canonicalize(path).map_err(|source| ConfinementError::InvalidRoot {
            path: path.to_path_buf(),
            source,
        })?;
        if !root.is_dir() {
            return Err(ConfinementError::InvalidRoot {
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::NotADirectory, "not a directory"),
            });
        }
        Ok(Self { root })
    }

    /// The canonical root path.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Resolve a caller-supplied path to an absolute path inside the root.
    ///
    /// Returns the root itself for `""` or `"."`. Never returns a path that
    /// is not the root or a descendant of it.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, ConfinementError> {
        let joined = self.root.join(relative);
        let resolved =
            canonicalize_lenient(&joined).map_err(|source| ConfinementError::Unresolvable {
                path: relative.to_string(),
                source,
            })?;

        if resolved.starts_with(&self.root) {
            Ok(resolved)
        } else {
            tracing::debug!(
                root = %self.root.display(),
                path = %relative,
                resolved = %resolved.display(),
                "path escapes workspace"
            );
            Err(ConfinementError::Escape(relative.to_string()))
        }
    }
}

/// Canonicalize a path whose trailing components may not exist yet.
///
/// Existing prefixes are canonicalized by the OS (symlinks followed), the
/// rest is normalized lexically. Because each existing prefix is canonical,
/// popping on `..` afterwards always walks the real parent.
fn canonicalize_lenient(path: &Path) -> io::Result<PathBuf> {
    let mut resolved = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => resolved.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            Component::Normal(part) => {
                resolved.push(part);
                // symlink_metadata succeeds for dangling links too; canonicalize
                // then fails and the whole path is refused.
                if resolved.symlink_metadata().is_ok() {
                    resolved = fs::canonicalize(&resolved)?;
                }
            }
        }
    }
    Ok(resolved)
}
