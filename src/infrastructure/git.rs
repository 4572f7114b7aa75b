//! Git integration for change detection
//!
//! Shells out to `git` for HEAD, branch and name-status diffs. Expected
//! failure modes (`fatal: ...`, git missing from PATH) are logged at debug
//! level and surface as `None`/`Err` so callers can gracefully downgrade to
//! mtime-based detection.

use crate::domain::error::{Error, Result};
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// One entry from `git diff --name-status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffEntry {
    /// File added in the new commit
    Added(String),
    /// File modified between commits
    Modified(String),
    /// File renamed: `(old, new)`
    Renamed(String, String),
    /// File deleted in the new commit
    Deleted(String),
}

/// Git operations bound to one working directory.
#[derive(Debug, Clone)]
pub struct GitContext {
    root: PathBuf,
}

impl GitContext {
    /// Bind to a project root.
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// True when the root is inside a git work tree and git is available.
    pub async fn is_repo(&self) -> bool {
        matches!(
            self.run(&["rev-parse", "--is-inside-work-tree"]).await.as_deref(),
            Ok("true")
        )
    }

    /// Current HEAD commit SHA.
    pub async fn head_commit(&self) -> Result<String> {
        self.run(&["rev-parse", "HEAD"])
            .await
            .map_err(|e| Error::git(format!("rev-parse HEAD failed: {e}")))
    }

    /// Current branch name; `HEAD` when detached.
    pub async fn branch(&self) -> Result<String> {
        match self.run(&["symbolic-ref", "--short", "HEAD"]).await {
            Ok(branch) => Ok(branch),
            // Detached head: symbolic-ref fails with `fatal: ref HEAD is not
            // a symbolic ref`.
            Err(_) => self
                .run(&["rev-parse", "--abbrev-ref", "HEAD"])
                .await
                .map_err(|e| Error::git(format!("branch detection failed: {e}"))),
        }
    }

    /// `git diff --name-status old..new` parsed into typed entries.
    pub async fn diff_name_status(&self, old: &str, new: &str) -> Result<Vec<DiffEntry>> {
        let range = format!("{old}..{new}");
        let output = self
            .run(&["diff", "--name-status", &range])
            .await
            .map_err(|e| Error::git(format!("diff {range} failed: {e}")))?;

        let mut entries = Vec::new();
        for line in output.lines() {
            let mut parts = line.split('\t');
            let Some(status) = parts.next() else { continue };
            let Some(path) = parts.next() else { continue };
            match status.chars().next() {
                Some('A') => entries.push(DiffEntry::Added(path.to_string())),
                Some('M') | Some('T') => entries.push(DiffEntry::Modified(path.to_string())),
                Some('D') => entries.push(DiffEntry::Deleted(path.to_string())),
                Some('R') | Some('C') => {
                    if let Some(new_path) = parts.next() {
                        entries.push(DiffEntry::Renamed(path.to_string(), new_path.to_string()));
                    }
                }
                _ => {}
            }
        }
        Ok(entries)
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()
            .await
            .map_err(|e| Error::git(format!("git not available: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::debug!(args = ?args, stderr = %stderr.trim(), "git command failed");
            return Err(Error::git(stderr.trim().to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
