//! Incremental change detection
//!
//! Computes the minimized `{added, modified, deleted}` work set for the
//! orchestrator. Strategy order:
//!
//! 1. no manifest -> full reindex;
//! 2. recorded git state + live repo + git available and HEAD/branch moved
//!    -> `git diff --name-status` fast path (plus any filesystem file newer
//!    than the manifest that the diff missed);
//! 3. otherwise mtime + content-hash comparison per file.
//!
//! Git being unavailable is a silent downgrade to strategy 3; a git
//! *failure* after a detected state change falls back to a full reindex.

use super::discovery::Scanner;
use crate::infrastructure::git::{DiffEntry, GitContext};
use crate::infrastructure::manifest::{file_mtime_millis, ManifestManager};
use std::collections::BTreeSet;
use std::path::Path;

/// Why the work set looks the way it does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeReason {
    /// No usable manifest: everything is new
    Full,
    /// Per-file mtime + hash comparison
    Mtime,
    /// Git HEAD or branch moved since the last index
    GitStateChanged,
}

/// Minimized work set with repository-relative paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    /// Files to index for the first time
    pub added: Vec<String>,
    /// Files whose content changed
    pub modified: Vec<String>,
    /// Files to remove from the store
    pub deleted: Vec<String>,
    /// Strategy that produced this set
    pub reason: ChangeReason,
}

impl ChangeSet {
    /// True when there is nothing to do.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    /// Added and modified files in one deterministic list.
    pub fn work_list(&self) -> Vec<String> {
        let mut list: Vec<String> = self
            .added
            .iter()
            .chain(self.modified.iter())
            .cloned()
            .collect();
        list.sort();
        list.dedup();
        list
    }
}

/// Change detector over manifest, filesystem and git.
pub struct ChangeDetector<'a> {
    root: &'a Path,
    manifest: &'a ManifestManager,
    scanner: &'a Scanner,
}

impl<'a> ChangeDetector<'a> {
    /// Bind a detector to one project.
    pub fn new(root: &'a Path, manifest: &'a ManifestManager, scanner: &'a Scanner) -> Self {
        Self {
            root,
            manifest,
            scanner,
        }
    }

    /// Compute the work set.
    pub async fn detect(&self) -> ChangeSet {
        let Some(manifest) = self.manifest.load().await else {
            return ChangeSet {
                added: self.scanner.scan(),
                modified: Vec::new(),
                deleted: Vec::new(),
                reason: ChangeReason::Full,
            };
        };

        let current = self.scanner.scan();

        if let Some(recorded) = manifest.git_state.clone() {
            let git = GitContext::new(self.root);
            if git.is_repo().await {
                match (git.head_commit().await, git.branch().await) {
                    (Ok(head), Ok(branch)) => {
                        if head != recorded.commit || branch != recorded.branch {
                            return self
                                .detect_via_git(&git, &recorded.commit, &head, &current, manifest.last_indexed)
                                .await;
                        }
                    }
                    _ => {
                        // Repo exists but git is failing: downgrade silently.
                        tracing::debug!("git state probe failed, using mtime detection");
                    }
                }
            }
        }

        self.detect_via_mtime(&current).await
    }

    async fn detect_via_git(
        &self,
        git: &GitContext,
        old: &str,
        new: &str,
        current: &[String],
        last_indexed: u64,
    ) -> ChangeSet {
        let entries = match git.diff_name_status(old, new).await {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(error = %err, "git diff failed, falling back to full reindex");
                let deleted = self.manifest.get_deleted_files(current).await;
                return ChangeSet {
                    added: current.to_vec(),
                    modified: Vec::new(),
                    deleted,
                    reason: ChangeReason::GitStateChanged,
                };
            }
        };

        let indexed: BTreeSet<String> = self.manifest.get_indexed_files().await.into_iter().collect();
        let current_set: BTreeSet<&str> = current.iter().map(String::as_str).collect();
        let mut added = BTreeSet::new();
        let mut modified = BTreeSet::new();
        let mut deleted = BTreeSet::new();
        let mut in_diff = BTreeSet::new();

        let mut note = |path: &str, target: &mut BTreeSet<String>| {
            if self.scanner.matches(path) {
                target.insert(path.to_string());
            }
        };

        for entry in entries {
            match entry {
                DiffEntry::Added(path) => {
                    in_diff.insert(path.clone());
                    if current_set.contains(path.as_str()) {
                        note(&path, &mut added);
                    }
                }
                DiffEntry::Modified(path) => {
                    in_diff.insert(path.clone());
                    if current_set.contains(path.as_str()) {
                        note(&path, &mut modified);
                    }
                }
                DiffEntry::Renamed(old_path, new_path) => {
                    in_diff.insert(old_path.clone());
                    in_diff.insert(new_path.clone());
                    if indexed.contains(&old_path) {
                        note(&old_path, &mut deleted);
                    }
                    if current_set.contains(new_path.as_str()) {
                        note(&new_path, &mut added);
                    }
                }
                DiffEntry::Deleted(path) => {
                    in_diff.insert(path.clone());
                    if indexed.contains(&path) {
                        note(&path, &mut deleted);
                    }
                }
            }
        }

        // Working-tree files newer than the manifest that the commit diff
        // cannot see (uncommitted edits, untracked files).
        for path in current {
            if in_diff.contains(path) {
                continue;
            }
            let newer = file_mtime_millis(&self.root.join(path))
                .is_some_and(|mtime| mtime > last_indexed);
            if newer {
                if indexed.contains(path) {
                    modified.insert(path.clone());
                } else {
                    added.insert(path.clone());
                }
            }
        }

        ChangeSet {
            added: added.into_iter().collect(),
            modified: modified.into_iter().collect(),
            deleted: deleted.into_iter().collect(),
            reason: ChangeReason::GitStateChanged,
        }
    }

    async fn detect_via_mtime(&self, current: &[String]) -> ChangeSet {
        let indexed: BTreeSet<String> = self.manifest.get_indexed_files().await.into_iter().collect();
        let changed = self.manifest.get_changed_files(current, self.root).await;

        let mut added = Vec::new();
        let mut modified = Vec::new();
        for file in changed {
            if indexed.contains(&file) {
                modified.push(file);
            } else {
                added.push(file);
            }
        }
        let deleted = self.manifest.get_deleted_files(current).await;

        ChangeSet {
            added,
            modified,
            deleted,
            reason: ChangeReason::Mtime,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::indexing::discovery::ScannerOptions;
    use crate::infrastructure::hash::ContentHasher;
    use crate::infrastructure::manifest::FileEntry;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    async fn record(manifest: &ManifestManager, root: &Path, file: &str) {
        let absolute = root.join(file);
        let hash = ContentHasher::new().hash_file(&absolute).unwrap();
        let mtime = file_mtime_millis(&absolute).unwrap();
        manifest
            .update_file(
                file,
                FileEntry {
                    last_modified: mtime,
                    chunk_count: 1,
                    content_hash: hash,
                },
            )
            .await;
    }

    #[tokio::test]
    async fn missing_manifest_is_full() {
        let project = TempDir::new().unwrap();
        let index = TempDir::new().unwrap();
        touch(project.path(), "src/a.ts", "const a = 1;");

        let manifest = ManifestManager::new(index.path());
        let scanner = Scanner::new(project.path(), ScannerOptions::default());
        let detector = ChangeDetector::new(project.path(), &manifest, &scanner);
        let changes = detector.detect().await;

        assert_eq!(changes.reason, ChangeReason::Full);
        assert_eq!(changes.added, vec!["src/a.ts"]);
        assert!(changes.modified.is_empty());
        assert!(changes.deleted.is_empty());
    }

    #[tokio::test]
    async fn unchanged_project_yields_empty_set() {
        let project = TempDir::new().unwrap();
        let index = TempDir::new().unwrap();
        touch(project.path(), "src/a.ts", "const a = 1;");

        let manifest = ManifestManager::new(index.path());
        record(&manifest, project.path(), "src/a.ts").await;

        let scanner = Scanner::new(project.path(), ScannerOptions::default());
        let detector = ChangeDetector::new(project.path(), &manifest, &scanner);
        let changes = detector.detect().await;

        assert_eq!(changes.reason, ChangeReason::Mtime);
        assert!(changes.is_empty());
    }

    #[tokio::test]
    async fn new_and_deleted_files_are_partitioned() {
        let project = TempDir::new().unwrap();
        let index = TempDir::new().unwrap();
        touch(project.path(), "src/kept.ts", "const k = 1;");
        touch(project.path(), "src/gone.ts", "const g = 1;");

        let manifest = ManifestManager::new(index.path());
        record(&manifest, project.path(), "src/kept.ts").await;
        record(&manifest, project.path(), "src/gone.ts").await;

        std::fs::remove_file(project.path().join("src/gone.ts")).unwrap();
        touch(project.path(), "src/new.ts", "const n = 1;");

        let scanner = Scanner::new(project.path(), ScannerOptions::default());
        let detector = ChangeDetector::new(project.path(), &manifest, &scanner);
        let changes = detector.detect().await;

        assert_eq!(changes.reason, ChangeReason::Mtime);
        assert_eq!(changes.added, vec!["src/new.ts"]);
        assert!(changes.modified.is_empty());
        assert_eq!(changes.deleted, vec!["src/gone.ts"]);
    }

    #[tokio::test]
    async fn touch_without_content_change_is_ignored() {
        let project = TempDir::new().unwrap();
        let index = TempDir::new().unwrap();
        touch(project.path(), "src/a.ts", "const a = 1;");

        let manifest = ManifestManager::new(index.path());
        record(&manifest, project.path(), "src/a.ts").await;

        // Rewrite identical bytes with a fresh mtime.
        let path = project.path().join("src/a.ts");
        let stored = std::fs::read(&path).unwrap();
        std::fs::write(&path, stored).unwrap();

        let scanner = Scanner::new(project.path(), ScannerOptions::default());
        let detector = ChangeDetector::new(project.path(), &manifest, &scanner);
        let changes = detector.detect().await;
        assert!(changes.is_empty(), "touch-only must not reindex: {changes:?}");
    }
}
