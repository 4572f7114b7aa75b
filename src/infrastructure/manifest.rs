//! Index manifest persistence
//!
//! The manifest records per-file index state (mtime, chunk count, content
//! hash) plus the git state observed at the last commit point. All mutators
//! are serialized through a single async mutex so read-modify-write stays
//! atomic under concurrent tasks. Writes are best-effort: failures are
//! logged, never thrown.

use crate::infrastructure::hash::{ContentHasher, HASH_ALGORITHM};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Manifest format version. A mismatch invalidates the manifest and forces
/// a full reindex.
pub const MANIFEST_FORMAT_VERSION: u32 = 3;

/// Name of the manifest file inside the index root.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Per-file index record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileEntry {
    /// Filesystem mtime at indexing time (epoch millis)
    pub last_modified: u64,
    /// Rows currently held by the store for this file
    pub chunk_count: u32,
    /// Content fingerprint (see [`HASH_ALGORITHM`])
    pub content_hash: String,
}

/// Git state observed when the index was last committed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GitState {
    /// Branch name (or `HEAD` when detached)
    pub branch: String,
    /// Commit SHA
    pub commit: String,
    /// Epoch millis when observed
    pub timestamp: u64,
}

/// On-disk manifest shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexManifest {
    /// Format version gate
    pub format_version: u32,
    /// Binary version for diagnostics
    pub tool_version: String,
    /// Epoch millis of the last save
    pub last_indexed: u64,
    /// Content hash algorithm tag
    pub hash_algorithm: String,
    /// Git state at the last commit point, when the project is a repo
    pub git_state: Option<GitState>,
    /// Per-file records keyed by repository-relative path
    pub files: BTreeMap<String, FileEntry>,
}

impl IndexManifest {
    fn new() -> Self {
        Self {
            format_version: MANIFEST_FORMAT_VERSION,
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            last_indexed: now_millis(),
            hash_algorithm: HASH_ALGORITHM.to_string(),
            git_state: None,
            files: BTreeMap::new(),
        }
    }
}

/// Serialized access to the manifest file.
///
/// Every public operation takes the internal lock, so concurrent callers
/// observe each other's writes in full (never a torn read-modify-write).
/// The lock is never held across embedding or store calls.
pub struct ManifestManager {
    path: PathBuf,
    state: Mutex<Option<IndexManifest>>,
    hasher: ContentHasher,
}

impl ManifestManager {
    /// Create a manager for the manifest inside `index_root`.
    pub fn new(index_root: &Path) -> Self {
        Self {
            path: index_root.join(MANIFEST_FILE),
            state: Mutex::new(None),
            hasher: ContentHasher::new(),
        }
    }

    /// Load the manifest from disk.
    ///
    /// Returns `None` when the manifest is missing, corrupt, or carries a
    /// different format version (in which case the stale file is deleted so
    /// the orchestrator performs a full reindex).
    pub async fn load(&self) -> Option<IndexManifest> {
        let mut state = self.state.lock().await;
        if state.is_some() {
            return state.clone();
        }
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(_) => return None,
        };
        let manifest: IndexManifest = match serde_json::from_slice(&bytes) {
            Ok(m) => m,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "corrupt manifest, forcing full reindex");
                return None;
            }
        };
        if manifest.format_version != MANIFEST_FORMAT_VERSION {
            tracing::info!(
                found = manifest.format_version,
                expected = MANIFEST_FORMAT_VERSION,
                "manifest format version mismatch, invalidating"
            );
            let _ = std::fs::remove_file(&self.path);
            return None;
        }
        *state = Some(manifest.clone());
        Some(manifest)
    }

    /// Persist the current manifest. Best-effort; failures are logged.
    pub async fn save(&self) {
        let mut state = self.state.lock().await;
        let manifest = state.get_or_insert_with(IndexManifest::new);
        manifest.format_version = MANIFEST_FORMAT_VERSION;
        manifest.tool_version = env!("CARGO_PKG_VERSION").to_string();
        manifest.hash_algorithm = HASH_ALGORITHM.to_string();
        manifest.last_indexed = now_millis();
        write_atomic(&self.path, manifest);
    }

    /// Record one file entry and persist.
    pub async fn update_file(&self, file: &str, entry: FileEntry) {
        {
            let mut state = self.state.lock().await;
            let manifest = state.get_or_insert_with(IndexManifest::new);
            manifest.files.insert(file.to_string(), entry);
        }
        self.save().await;
    }

    /// Record many file entries atomically (one lock, one write).
    pub async fn update_files(&self, entries: Vec<(String, FileEntry)>) {
        {
            let mut state = self.state.lock().await;
            let manifest = state.get_or_insert_with(IndexManifest::new);
            for (file, entry) in entries {
                manifest.files.insert(file, entry);
            }
        }
        self.save().await;
    }

    /// Drop one file entry and persist.
    pub async fn remove_file(&self, file: &str) {
        {
            let mut state = self.state.lock().await;
            let manifest = state.get_or_insert_with(IndexManifest::new);
            manifest.files.remove(file);
        }
        self.save().await;
    }

    /// Record the git state observed at commit time.
    pub async fn update_git_state(&self, git_state: Option<GitState>) {
        {
            let mut state = self.state.lock().await;
            let manifest = state.get_or_insert_with(IndexManifest::new);
            manifest.git_state = git_state;
        }
        self.save().await;
    }

    /// Paths currently recorded in the manifest.
    pub async fn get_indexed_files(&self) -> Vec<String> {
        let state = self.state.lock().await;
        state
            .as_ref()
            .map(|m| m.files.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Files recorded in the manifest but absent from `current_files`.
    pub async fn get_deleted_files(&self, current_files: &[String]) -> Vec<String> {
        let current: HashSet<&str> = current_files.iter().map(String::as_str).collect();
        let state = self.state.lock().await;
        state
            .as_ref()
            .map(|m| {
                m.files
                    .keys()
                    .filter(|f| !current.contains(f.as_str()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Two-stage change check over `current_files` (repo-relative paths).
    ///
    /// Per file: when the mtime equals the stored value the file is skipped
    /// outright; otherwise the content hash decides. A hash match despite a
    /// newer mtime refreshes `last_modified` in place (touch without a real
    /// change) and still skips; the manifest is resaved once if any entry
    /// was silently refreshed.
    pub async fn get_changed_files(&self, current_files: &[String], root: &Path) -> Vec<String> {
        let mut changed = Vec::new();
        let mut refreshed = false;
        {
            let mut state = self.state.lock().await;
            let Some(manifest) = state.as_mut() else {
                return current_files.to_vec();
            };
            for file in current_files {
                let absolute = root.join(file);
                let Some(entry) = manifest.files.get_mut(file) else {
                    changed.push(file.clone());
                    continue;
                };
                let mtime = file_mtime_millis(&absolute);
                if mtime == Some(entry.last_modified) {
                    continue;
                }
                match self.hasher.hash_file(&absolute) {
                    Some(hash) if hash == entry.content_hash => {
                        if let Some(mtime) = mtime {
                            entry.last_modified = mtime;
                            refreshed = true;
                        }
                    }
                    _ => changed.push(file.clone()),
                }
            }
        }
        if refreshed {
            self.save().await;
        }
        changed
    }

    /// Forget everything and delete the on-disk manifest.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        *state = None;
        if let Err(err) = std::fs::remove_file(&self.path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %err, "manifest delete failed");
            }
        }
    }

    /// Snapshot of the in-memory manifest (loading it first if needed).
    pub async fn snapshot(&self) -> Option<IndexManifest> {
        if let Some(m) = { self.state.lock().await.clone() } {
            return Some(m);
        }
        self.load().await
    }
}

/// Current epoch millis.
pub fn now_millis() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

/// Filesystem mtime as epoch millis, `None` on error.
pub fn file_mtime_millis(path: &Path) -> Option<u64> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    let duration = modified.duration_since(std::time::UNIX_EPOCH).ok()?;
    Some(duration.as_millis() as u64)
}

fn write_atomic(path: &Path, manifest: &IndexManifest) {
    let Ok(json) = serde_json::to_vec_pretty(manifest) else {
        tracing::warn!("manifest serialization failed");
        return;
    };
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let tmp = path.with_extension("json.tmp");
    if let Err(err) = std::fs::write(&tmp, &json).and_then(|()| std::fs::rename(&tmp, path)) {
        tracing::warn!(path = %path.display(), error = %err, "manifest write failed");
    }
}
