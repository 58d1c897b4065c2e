//! Session workspaces on disk.
//!
//! Every session owns one directory under the store's base directory, named
//! by its UUID:
//!
//! ```text
//! <workspaces_dir>/
//! ├── 1b4e28ba-2fa1-11d2-883f-0016d3cca427/   - one session workspace
//! │   └── ...                                  - the uploaded project
//! └── 6fa459ea-ee8a-3ca4-894e-db77e160355e/
//! ```
//!
//! Sessions are created from an uploaded zip and are never removed
//! automatically; [`SessionStore::remove`] and [`SessionStore::prune`] are the
//! manual cleanup paths.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use walkdir::WalkDir;

use crate::archive::{self, ArchiveError};
use crate::guard::{ConfinementError, WorkspaceRoot};

/// Errors from session lookup and lifecycle operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No session with this identifier exists.
    #[error("session not found: {0}")]
    NotFound(String),
    /// The uploaded bytes are not a valid zip archive.
    #[error("uploaded file is not a valid zip archive: {0}")]
    MalformedArchive(String),
    /// The session directory could not be used as a workspace root.
    #[error(transparent)]
    Confinement(#[from] ConfinementError),
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<ArchiveError> for SessionError {
    fn from(err: ArchiveError) -> Self {
        match err {
            ArchiveError::Malformed(msg) => SessionError::MalformedArchive(msg),
            ArchiveError::Io(e) => SessionError::Io(e),
        }
    }
}

/// Opaque session identifier (a UUID v4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a fresh identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// File name offered when the session is downloaded.
    pub fn download_file_name(&self) -> String {
        format!("project_{self}.zip")
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for SessionId {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| SessionError::NotFound(s.to_string()))
    }
}

/// One relative file path in a [`FileTree`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Path relative to the workspace root, `/`-separated.
    pub path: String,
}

/// Sorted snapshot of the regular files in a workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileTree(Vec<FileEntry>);

impl FileTree {
    /// Recursively scan `root`. Symlinks are neither listed nor followed.
    pub fn scan(root: &Path) -> io::Result<Self> {
        let mut entries = Vec::new();
        for entry in WalkDir::new(root).min_depth(1).follow_links(false) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            let path = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            entries.push(FileEntry { path });
        }
        // Component-wise, so "a/b" sorts before "a-b/x".
        entries.sort_by(|a, b| a.path.split('/').cmp(b.path.split('/')));
        Ok(Self(entries))
    }

    /// The relative paths, in order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|e| e.path.as_str())
    }

    /// The entries, in order.
    pub fn entries(&self) -> &[FileEntry] {
        &self.0
    }

    /// Whether `path` is listed.
    pub fn contains(&self, path: &str) -> bool {
        self.paths().any(|p| p == path)
    }

    /// Number of files.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the workspace holds no files.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// An existing session and its workspace root.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    root: WorkspaceRoot,
}

impl Session {
    /// The session identifier.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// The workspace root.
    pub fn root(&self) -> &WorkspaceRoot {
        &self.root
    }

    /// Snapshot the workspace's current files.
    pub fn file_tree(&self) -> io::Result<FileTree> {
        FileTree::scan(self.root.path())
    }
}

/// Creates, locates and removes session workspaces under one base directory.
#[derive(Debug, Clone)]
pub struct SessionStore {
    base: PathBuf,
}

impl SessionStore {
    /// Create a store rooted at `base`. The directory is created on first use.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// The base directory holding all session workspaces.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Materialize a new session from zip archive bytes.
    ///
    /// On failure the partially populated session directory is removed.
    pub fn create_from_archive(&self, bytes: &[u8]) -> Result<(Session, FileTree), SessionError> {
        fs::create_dir_all(&self.base)?;
        let id = SessionId::generate();
        let dir = self.dir_for(id);
        fs::create_dir(&dir)?;

        let populated = archive::extract(bytes, &dir)
            .map_err(SessionError::from)
            .and_then(|_| {
                let root = WorkspaceRoot::new(&dir)?;
                let tree = FileTree::scan(root.path())?;
                Ok((Session { id, root }, tree))
            });

        match populated {
            Ok((session, tree)) => {
                tracing::info!(session = %id, files = tree.len(), "created session");
                Ok((session, tree))
            }
            Err(e) => {
                if let Err(cleanup) = fs::remove_dir_all(&dir) {
                    tracing::warn!(session = %id, error = %cleanup, "failed to clean up session");
                }
                Err(e)
            }
        }
    }

    /// Look up an existing session.
    pub fn open(&self, id: &str) -> Result<Session, SessionError> {
        let id: SessionId = id.parse()?;
        let dir = self.dir_for(id);
        if !dir.is_dir() {
            return Err(SessionError::NotFound(id.to_string()));
        }
        Ok(Session {
            id,
            root: WorkspaceRoot::new(&dir)?,
        })
    }

    /// Snapshot the files of an existing session.
    pub fn file_tree(&self, id: &str) -> Result<FileTree, SessionError> {
        Ok(self.open(id)?.file_tree()?)
    }

    /// Zip the current contents of a session.
    pub fn archive(&self, id: &str) -> Result<Vec<u8>, SessionError> {
        let session = self.open(id)?;
        let tree = session.file_tree()?;
        let bytes = archive::pack(session.root().path(), &tree)?;
        tracing::info!(session = %session.id(), files = tree.len(), bytes = bytes.len(), "archived session");
        Ok(bytes)
    }

    /// Delete a session and its workspace.
    pub fn remove(&self, id: &str) -> Result<(), SessionError> {
        let session = self.open(id)?;
        fs::remove_dir_all(session.root().path())?;
        tracing::info!(session = %session.id(), "removed session");
        Ok(())
    }

    /// Every session currently on disk, sorted.
    pub fn list(&self) -> Result<Vec<SessionId>, SessionError> {
        let entries = match fs::read_dir(&self.base) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(id) = entry.file_name().to_str().and_then(|n| n.parse().ok()) {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Remove sessions whose newest file is at least `max_age` old.
    ///
    /// Returns the identifiers that were removed.
    pub fn prune(&self, max_age: Duration) -> Result<Vec<SessionId>, SessionError> {
        let now = SystemTime::now();
        let mut removed = Vec::new();

        for id in self.list()? {
            let dir = self.dir_for(id);
            let modified = last_modified(&dir)?;
            let age = now.duration_since(modified).unwrap_or_default();
            if age >= max_age {
                fs::remove_dir_all(&dir)?;
                tracing::info!(session = %id, age_secs = age.as_secs(), "pruned session");
                removed.push(id);
            }
        }
        Ok(removed)
    }

    fn dir_for(&self, id: SessionId) -> PathBuf {
        self.base.join(id.to_string())
    }
}

/// Most recent modification time of `dir` or anything below it.
fn last_modified(dir: &Path) -> io::Result<SystemTime> {
    let mut newest = fs::metadata(dir)?.modified()?;
    for entry in WalkDir::new(dir).min_depth(1).follow_links(false) {
        let modified = entry?.metadata().map_err(io::Error::from)?.modified()?;
        newest = newest.max(modified);
    }
    Ok(newest)
}
