//! Invocation-scoped temporary directories.
//!
//! Every file-based strategy gets its own uniquely named directory under the
//! configured temp root. The directory is removed when the [`Workspace`] is
//! dropped, so cleanup also happens when the strategy returns early with an
//! error or panics. Removal failures are logged and never surface to callers.

use std::future::Future;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::EngineError;

pub const DEFAULT_PREFIX: &str = "code-exec-";

#[derive(Debug)]
pub struct Workspace {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl Workspace {
    /// Create a fresh, empty directory under `root`
    pub fn create(root: &Path, prefix: &str) -> Result<Self, EngineError> {
        let dir = tempfile::Builder::new().prefix(prefix).tempdir_in(root)?;
        let path = dir.path().to_path_buf();
        debug!(workspace = ?path, "Workspace created");
        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            match dir.close() {
                Ok(()) => debug!(workspace = ?self.path, "Workspace removed"),
                Err(e) => warn!(workspace = ?self.path, "Failed to remove workspace: {}", e),
            }
        }
    }
}

/// Run `body` with the path of an exclusive workspace that is removed
/// afterwards, whatever `body` returns.
pub async fn with_workspace<T, F, Fut>(root: &Path, prefix: &str, body: F) -> Result<T, EngineError>
where
    F: FnOnce(PathBuf) -> Fut,
    Fut: Future<Output = Result<T, EngineError>>,
{
    let workspace = Workspace::create(root, prefix)?;
    let result = body(workspace.path().to_path_buf()).await;
    drop(workspace);
    result
}

/// Write `contents` to `file_name` inside `dir`
pub async fn write_file(dir: &Path, file_name: &str, contents: &str) -> Result<PathBuf, EngineError> {
    let file_path = dir.join(file_name);
    tokio::fs::write(&file_path, contents).await?;
    Ok(file_path)
}
