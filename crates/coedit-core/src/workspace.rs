//! Source-control backed workspaces
//!
//! A session may be bound to a git work tree. The core only needs two
//! things from it: the list of tracked files and commit-by-message.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Message used when a commit is requested with a blank message
const DEFAULT_COMMIT_MESSAGE: &str = "Apply changes from coedit session";

/// Source-control capability of a workspace
#[async_trait]
pub trait SourceControl: Send + Sync {
    /// Root directory of the work tree
    fn root(&self) -> &Path;

    /// Paths of tracked files, relative to the root
    async fn tracked_files(&self) -> Result<Vec<String>>;

    /// Stage everything and commit. `None` when there was nothing to commit.
    async fn commit(&self, message: &str) -> Result<Option<String>>;
}

/// Helper to run git commands
async fn run_git(workspace: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(workspace)
        .output()
        .await
        .map_err(|e| Error::Workspace(format!("Failed to run git: {}", e)))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    } else {
        Err(Error::Workspace(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ))
    }
}

/// A git work tree driven through the `git` CLI
#[derive(Debug, Clone)]
pub struct GitRepo {
    root: PathBuf,
}

impl GitRepo {
    /// Open the work tree containing `path`.
    ///
    /// A missing directory or a directory outside any git work tree is a
    /// configuration error: the session cannot be built as requested.
    pub async fn open(path: &Path) -> Result<Self> {
        if !path.is_dir() {
            return Err(Error::Config(format!(
                "Workspace path is not a directory: {}",
                path.display()
            )));
        }

        let toplevel = run_git(path, &["rev-parse", "--show-toplevel"])
            .await
            .map_err(|e| {
                Error::Config(format!(
                    "Not a git repository: {} ({})",
                    path.display(),
                    e
                ))
            })?;

        let root = dunce::canonicalize(toplevel.trim())?;
        debug!(root = %root.display(), "Opened git workspace");
        Ok(Self { root })
    }
}

#[async_trait]
impl SourceControl for GitRepo {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn tracked_files(&self) -> Result<Vec<String>> {
        let out = run_git(&self.root, &["ls-files", "-z"]).await?;
        Ok(out
            .split('\0')
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn commit(&self, message: &str) -> Result<Option<String>> {
        run_git(&self.root, &["add", "-A"]).await?;

        let status = run_git(&self.root, &["status", "--porcelain"]).await?;
        if status.trim().is_empty() {
            debug!(root = %self.root.display(), "Nothing to commit");
            return Ok(None);
        }

        let message = if message.trim().is_empty() {
            DEFAULT_COMMIT_MESSAGE
        } else {
            message
        };
        run_git(&self.root, &["commit", "-q", "-m", message]).await?;

        let hash = run_git(&self.root, &["rev-parse", "--short", "HEAD"]).await?;
        let hash = hash.trim().to_string();
        info!(root = %self.root.display(), commit = %hash, "Committed changes");
        Ok(Some(hash))
    }
}

/// Resolve a requested chat file.
///
/// Relative paths are taken against `root`. Returns the canonical path and the
/// display name relative to `root`, or `None` when the file does not exist or
/// lies outside the workspace. Without a workspace nothing resolves.
pub fn resolve_file(root: Option<&Path>, requested: &str) -> Option<(PathBuf, String)> {
    let root = root?;
    let canonical = dunce::canonicalize(root.join(requested)).ok()?;
    if !canonical.is_file() {
        return None;
    }

    let rel = canonical.strip_prefix(root).ok()?;
    let display = rel.to_string_lossy().replace('\\', "/");
    Some((canonical, display))
}
