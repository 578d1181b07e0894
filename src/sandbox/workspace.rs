//! Per-request workspace directories
//!
//! Every request gets a fresh, randomly named directory under the scratch
//! root. The directory is removed exactly once: explicitly by the judge when
//! the request finishes, or by `Drop` if the request future is abandoned.

use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};

use crate::languages::LanguageAdapter;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("Failed to prepare scratch root {path}: {source}")]
    Root {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to create workspace under {root}: {source}")]
    Create {
        root: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to remove workspace {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Creates workspaces under an injected scratch root
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    /// Create the manager, making sure the scratch root exists
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, WorkspaceError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|source| WorkspaceError::Root {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create an exclusive, uniquely named workspace directory
    pub fn create(&self) -> Result<Workspace, WorkspaceError> {
        let dir = tempfile::Builder::new()
            .prefix("run-")
            .rand_bytes(12)
            .tempdir_in(&self.root)
            .map_err(|source| WorkspaceError::Create {
                root: self.root.clone(),
                source,
            })?;
        let path = dir.keep();
        debug!("Created workspace {}", path.display());

        Ok(Workspace {
            path,
            destroyed: false,
        })
    }

    /// Write the submission to the adapter's canonical source file
    pub async fn write(
        &self,
        workspace: &Workspace,
        code: &str,
        adapter: &LanguageAdapter<'_>,
    ) -> Result<PathBuf, WorkspaceError> {
        let path = workspace.path().join(adapter.source_file());
        fs::write(&path, code)
            .await
            .map_err(|source| WorkspaceError::Write {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }
}

/// An exclusively owned scratch directory
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
    destroyed: bool,
}

impl Workspace {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the directory and everything in it. Safe to call repeatedly.
    pub fn destroy(&mut self) -> Result<(), WorkspaceError> {
        if self.destroyed {
            return Ok(());
        }
        self.destroyed = true;
        remove_workspace_dir(&self.path).map_err(|source| WorkspaceError::Remove {
            path: self.path.clone(),
            source,
        })?;
        debug!("Removed workspace {}", self.path.display());
        Ok(())
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Err(e) = self.destroy() {
            warn!("{}", e);
        }
    }
}

/// Recursively remove `path`; a path that is already gone is not an error.
///
/// Judged programs can strip permissions from directories they create, so a
/// failed removal restores owner permissions and tries once more.
pub fn remove_workspace_dir(path: &Path) -> io::Result<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(_) => {
            restore_permissions(path);
            match std::fs::remove_dir_all(path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e),
            }
        }
    }
}

fn restore_permissions(path: &Path) {
    let Ok(metadata) = std::fs::symlink_metadata(path) else {
        return;
    };
    if !metadata.is_dir() {
        return;
    }
    let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700));
    if let Ok(entries) = std::fs::read_dir(path) {
        for entry in entries.flatten() {
            restore_permissions(&entry.path());
        }
    }
}
