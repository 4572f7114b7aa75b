//! Watch service: wires the filesystem watcher to the orchestrator
//!
//! Each flushed watch batch triggers an incremental indexing run. The
//! batch itself is only a wake-up signal: the change detector recomputes
//! the minimized work set from the manifest, which also folds in anything
//! that happened while a previous run was in flight. Because the watcher
//! awaits the batch handler, runs never overlap.
//!
//! The git overlay (opt-in) reuses the same path: a debounced `.git`
//! change schedules one more incremental run, which the detector turns
//! into a `git-state-changed` work set.

use super::discovery::{Scanner, ScannerOptions};
use super::orchestrator::{Indexer, IndexingOptions};
use crate::domain::error::Result;
use crate::infrastructure::watcher::{
    BatchHandler, FileWatcher, GitHandler, PathFilter, WatcherOptions,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Continuous incremental indexing driven by filesystem events.
pub struct WatchService {
    indexer: Arc<Indexer>,
    root: PathBuf,
    watcher: FileWatcher,
}

impl WatchService {
    /// Create a service for a project root. The scanner's pattern sets
    /// filter events at intake so churn in ignored directories never wakes
    /// the orchestrator.
    pub fn new(
        indexer: Arc<Indexer>,
        root: &Path,
        watcher_options: WatcherOptions,
        scanner_options: ScannerOptions,
    ) -> Self {
        let scanner = Arc::new(Scanner::new(root, scanner_options));
        let filter_root = root.to_path_buf();
        let filter: PathFilter = Arc::new(move |path: &Path| {
            path.strip_prefix(&filter_root)
                .ok()
                .map(|relative| relative.to_string_lossy().replace('\\', "/"))
                .is_some_and(|relative| scanner.matches(&relative))
        });

        Self {
            indexer,
            root: root.to_path_buf(),
            watcher: FileWatcher::new(root, watcher_options, Some(filter)),
        }
    }

    /// Start watching. Each batch runs one incremental indexing pass.
    pub fn start(&mut self) -> Result<()> {
        let indexer = self.indexer.clone();
        let root = self.root.clone();
        let handler: BatchHandler = Arc::new(move |batch| {
            let indexer = indexer.clone();
            let root = root.clone();
            Box::pin(async move {
                tracing::debug!(
                    added = batch.added.len(),
                    modified = batch.modified.len(),
                    deleted = batch.deleted.len(),
                    "watch batch received"
                );
                let result = indexer.index_codebase(&IndexingOptions::new(&root)).await;
                if !result.success {
                    tracing::error!(
                        error = result.error.as_deref().unwrap_or("unknown"),
                        "watch-triggered indexing failed"
                    );
                } else if result.files_indexed > 0 {
                    tracing::info!(
                        files = result.files_indexed,
                        chunks = result.chunks_created,
                        "reindexed after filesystem change"
                    );
                }
            })
        });

        let indexer = self.indexer.clone();
        let root = self.root.clone();
        let git_handler: GitHandler = Arc::new(move || {
            let indexer = indexer.clone();
            let root = root.clone();
            // Fire-and-forget: the run serializes against batch runs
            // through the store and manifest locks.
            tokio::spawn(async move {
                tracing::debug!("git state changed, scheduling reindex");
                let result = indexer.index_codebase(&IndexingOptions::new(&root)).await;
                if !result.success {
                    tracing::error!(
                        error = result.error.as_deref().unwrap_or("unknown"),
                        "git-triggered indexing failed"
                    );
                }
            });
        });

        self.watcher.start(handler, Some(git_handler))
    }

    /// Stop watching; awaits the in-flight run and flushes pending events.
    pub async fn stop(&mut self) {
        self.watcher.stop().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::embedding::HashEmbeddingProvider;
    use crate::adapters::vector_store::EmbeddedVectorStore;
    use crate::domain::chunking::ChunkingOptions;
    use crate::domain::ports::vector_store::ScanFilter;
    use crate::domain::ports::{SharedEmbeddingProvider, SharedVectorStore, VectorStore};
    use crate::domain::types::TenantScope;
    use crate::infrastructure::config::IndexingSettings;
    use crate::infrastructure::manifest::ManifestManager;
    use std::time::Duration;
    use tempfile::TempDir;

    fn build_indexer(project: &Path, index_root: &Path) -> (Arc<Indexer>, SharedVectorStore) {
        let scope = TenantScope::local_for(project);
        let store: SharedVectorStore =
            Arc::new(EmbeddedVectorStore::new(index_root, scope.clone(), 384));
        let embedder: SharedEmbeddingProvider = Arc::new(HashEmbeddingProvider::new(384).unwrap());
        let manifest = Arc::new(ManifestManager::new(index_root));
        let indexer = Arc::new(Indexer::new(
            store.clone(),
            embedder,
            None,
            manifest,
            index_root,
            scope,
            IndexingSettings::default(),
            ChunkingOptions::default(),
        ));
        (indexer, store)
    }

    #[tokio::test]
    async fn file_creation_triggers_incremental_index() {
        let project = TempDir::new().unwrap();
        let index = TempDir::new().unwrap();
        let (indexer, store) = build_indexer(project.path(), index.path());

        // Baseline index of the empty project.
        assert!(indexer
            .index_codebase(&IndexingOptions::new(project.path()))
            .await
            .success);

        let mut service = WatchService::new(
            indexer,
            project.path(),
            WatcherOptions {
                batch_window_ms: 200,
                max_batch_wait_ms: 2000,
                ..Default::default()
            },
            ScannerOptions::default(),
        );
        service.start().unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        std::fs::create_dir_all(project.path().join("src")).unwrap();
        std::fs::write(
            project.path().join("src/live.ts"),
            "export function live(){ return 42; }",
        )
        .unwrap();

        // Wait for the watch batch to flush and the run to land.
        let mut indexed = false;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let rows = store
                .scan_with_filter(&ScanFilter {
                    file: Some("src/live.ts".into()),
                    ..Default::default()
                })
                .await
                .unwrap();
            if !rows.is_empty() {
                indexed = true;
                break;
            }
        }
        service.stop().await;
        assert!(indexed, "watched file must reach the store");
    }
}
