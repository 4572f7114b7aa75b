//! Indexing orchestrator
//!
//! Drives the full pipeline: initialize store -> detect changes ->
//! (deletions first, updates next) -> bump version. Per-file CPU-bound work
//! (chunking + hashing) runs on a bounded worker pool; embedding is batched
//! through the persistent cache so unchanged chunks never hit the model;
//! store writes go through `update_file` per file (incremental) or a
//! [`ChunkBatchProcessor`] (full path).
//!
//! Failure policy: per-file failures are logged and counted, the run
//! continues. Store or embedder initialization failures are fatal. A final
//! embedding failure (after retries) aborts the run with `success = false`,
//! keeping whatever partial progress already committed. Cooperative
//! cancellation at file boundaries is not an error.

use super::change_detection::{ChangeDetector, ChangeReason};
use super::discovery::{Scanner, ScannerOptions};
use super::progress::{Phase, ProgressCallback, ProgressEvent};
use crate::domain::chunking::{chunk_file, ChunkingOptions};
use crate::domain::error::{Error, Result};
use crate::domain::ports::{
    EmbeddingProvider, SharedEmbeddingProvider, SharedVectorStore, VectorStore,
};
use crate::domain::types::{ChunkMetadata, CodeChunk, IndexingResult, TenantScope};
use crate::infrastructure::config::IndexingSettings;
use crate::infrastructure::embedding_cache::EmbeddingCache;
use crate::infrastructure::git::GitContext;
use crate::infrastructure::hash::ContentHasher;
use crate::infrastructure::manifest::{
    file_mtime_millis, now_millis, FileEntry, GitState, ManifestManager,
};
use crate::infrastructure::version::VersionFile;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Options for one indexing run.
#[derive(Clone)]
pub struct IndexingOptions {
    /// Project root to index
    pub root_dir: PathBuf,
    /// Force the full path even when a manifest exists
    pub force: bool,
    /// Emit per-file progress messages
    pub verbose: bool,
    /// When false, vectors come from the deterministic hash embedder
    /// instead of the configured model (no model initialization)
    pub embeddings: bool,
    /// Progress callback
    pub on_progress: Option<ProgressCallback>,
    /// Cooperative cancellation flag, checked at file boundaries
    pub cancel: Option<Arc<AtomicBool>>,
}

impl IndexingOptions {
    /// Defaults for a project root.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            force: false,
            verbose: false,
            embeddings: true,
            on_progress: None,
            cancel: None,
        }
    }
}

struct ProcessedFile {
    file: String,
    chunks: Vec<CodeChunk>,
    mtime: u64,
    content_hash: String,
}

/// Accumulates chunk rows across files and flushes `insert_batch` when the
/// batch threshold is crossed. Callers block on `add_chunks` only while a
/// flush is in progress.
pub struct ChunkBatchProcessor {
    store: SharedVectorStore,
    threshold: usize,
    vectors: Vec<Vec<f32>>,
    metadatas: Vec<ChunkMetadata>,
    contents: Vec<String>,
    flushed_rows: usize,
}

impl ChunkBatchProcessor {
    /// Create a processor flushing at `threshold` accumulated chunks.
    pub fn new(store: SharedVectorStore, threshold: usize) -> Self {
        Self {
            store,
            threshold: threshold.max(1),
            vectors: Vec::new(),
            metadatas: Vec::new(),
            contents: Vec::new(),
            flushed_rows: 0,
        }
    }

    /// Queue one file's chunks, flushing when the threshold is crossed.
    pub async fn add_chunks(
        &mut self,
        vectors: Vec<Vec<f32>>,
        metadatas: Vec<ChunkMetadata>,
        contents: Vec<String>,
    ) -> Result<()> {
        self.vectors.extend(vectors);
        self.metadatas.extend(metadatas);
        self.contents.extend(contents);
        if self.vectors.len() >= self.threshold {
            self.flush().await?;
        }
        Ok(())
    }

    /// Flush everything accumulated so far.
    pub async fn flush(&mut self) -> Result<()> {
        if self.vectors.is_empty() {
            return Ok(());
        }
        let vectors = std::mem::take(&mut self.vectors);
        let metadatas = std::mem::take(&mut self.metadatas);
        let contents = std::mem::take(&mut self.contents);
        self.flushed_rows += vectors.len();
        self.store.insert_batch(vectors, metadatas, contents).await
    }

    /// Rows flushed to the store so far.
    pub fn flushed_rows(&self) -> usize {
        self.flushed_rows
    }
}

/// Indexing orchestrator bound to one store/embedder/manifest set.
pub struct Indexer {
    store: SharedVectorStore,
    embedder: SharedEmbeddingProvider,
    cache: Option<Arc<EmbeddingCache>>,
    manifest: Arc<ManifestManager>,
    version: VersionFile,
    scope: TenantScope,
    settings: IndexingSettings,
    chunking: ChunkingOptions,
    hasher: ContentHasher,
    index_root: PathBuf,
}

impl Indexer {
    /// Wire an orchestrator. `index_root` hosts manifest, version file and
    /// cache; `scope` stamps every stored row.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: SharedVectorStore,
        embedder: SharedEmbeddingProvider,
        cache: Option<Arc<EmbeddingCache>>,
        manifest: Arc<ManifestManager>,
        index_root: &Path,
        scope: TenantScope,
        settings: IndexingSettings,
        chunking: ChunkingOptions,
    ) -> Self {
        Self {
            store,
            embedder,
            cache,
            manifest,
            version: VersionFile::new(index_root),
            scope,
            settings,
            chunking,
            hasher: ContentHasher::new(),
            index_root: index_root.to_path_buf(),
        }
    }

    /// Run a full or incremental indexing pass.
    pub async fn index_codebase(&self, options: &IndexingOptions) -> IndexingResult {
        let started = Instant::now();
        match self.run(options, started).await {
            Ok(result) => result,
            Err(Error::Cancelled) => IndexingResult {
                success: true,
                files_indexed: 0,
                chunks_created: 0,
                duration_ms: started.elapsed().as_millis() as u64,
                incremental: true,
                error: None,
            },
            Err(err) => {
                tracing::error!(error = %err, "indexing run failed");
                IndexingResult {
                    success: false,
                    files_indexed: 0,
                    chunks_created: 0,
                    duration_ms: started.elapsed().as_millis() as u64,
                    incremental: false,
                    error: Some(err.to_string()),
                }
            }
        }
    }

    async fn run(&self, options: &IndexingOptions, started: Instant) -> Result<IndexingResult> {
        let progress = options.on_progress.clone();
        emit(&progress, ProgressEvent::phase(Phase::Initializing, "initializing store"));
        self.store.initialize().await?;

        let embedder: SharedEmbeddingProvider = if options.embeddings {
            self.embedder.clone()
        } else {
            Arc::new(crate::adapters::embedding::HashEmbeddingProvider::new(
                self.embedder.dimensions(),
            )?)
        };

        emit(&progress, ProgressEvent::phase(Phase::Scanning, "scanning repository"));
        let scanner = Scanner::new(
            &options.root_dir,
            ScannerOptions {
                max_file_size_bytes: self.settings.max_file_size_bytes,
                index_root: Some(self.index_root.clone()),
            },
        );

        let manifest_loaded = self.manifest.load().await.is_some();
        if options.force || !manifest_loaded {
            return self
                .full_index(options, &scanner, embedder, progress, started)
                .await;
        }

        let detector = ChangeDetector::new(&options.root_dir, &self.manifest, &scanner);
        let changes = detector.detect().await;
        if changes.reason == ChangeReason::Full {
            return self
                .full_index(options, &scanner, embedder, progress, started)
                .await;
        }

        if changes.is_empty() {
            emit(&progress, ProgressEvent::phase(Phase::Complete, "index up to date"));
            return Ok(IndexingResult::empty(true, started.elapsed().as_millis() as u64));
        }

        let work = changes.work_list();
        if work.is_empty() {
            // Deletions only.
            self.apply_deletions(&changes.deleted).await?;
            self.commit_git_state(&options.root_dir).await;
            self.version.bump()?;
            emit(&progress, ProgressEvent::phase(Phase::Complete, "deletions applied"));
            return Ok(IndexingResult::empty(true, started.elapsed().as_millis() as u64));
        }

        let mut files_indexed = 0u32;
        let mut chunks_created = 0u32;
        let files_total = work.len() as u32;

        let mut was_cancelled = false;
        let mut processed = self.process_files(&options.root_dir, work);
        while let Some(outcome) = processed.next().await {
            if cancelled(options) {
                // Cooperative shutdown at a file boundary: keep partial
                // progress and commit what landed.
                was_cancelled = true;
                break;
            }
            let Some(file) = outcome else { continue };
            if file.chunks.is_empty() {
                // The file emptied out: drop any stale rows and record a
                // zero-count entry so the next run sees it unchanged.
                self.store.delete_by_file(&file.file).await?;
                self.manifest
                    .update_file(
                        &file.file,
                        FileEntry {
                            last_modified: file.mtime,
                            chunk_count: 0,
                            content_hash: file.content_hash.clone(),
                        },
                    )
                    .await;
                continue;
            }

            emit(
                &progress,
                ProgressEvent {
                    phase: Phase::Embedding,
                    message: format!("embedding {}", file.file),
                    files_total: Some(files_total),
                    files_processed: Some(files_indexed),
                    chunks_processed: Some(chunks_created),
                },
            );
            let vectors = self.embed_with_cache(embedder.as_ref(), &file.chunks).await?;
            let metadatas: Vec<ChunkMetadata> = file
                .chunks
                .iter()
                .map(|c| ChunkMetadata::from_chunk(c, &self.scope))
                .collect();
            let contents: Vec<String> = file.chunks.iter().map(|c| c.content.clone()).collect();

            // `update_file` is the per-file critical section: delete + insert
            // appear atomic to concurrent readers.
            self.store
                .update_file(&file.file, vectors, metadatas, contents)
                .await?;
            self.manifest
                .update_file(
                    &file.file,
                    FileEntry {
                        last_modified: file.mtime,
                        chunk_count: file.chunks.len() as u32,
                        content_hash: file.content_hash.clone(),
                    },
                )
                .await;

            files_indexed += 1;
            chunks_created += file.chunks.len() as u32;
            if options.verbose {
                tracing::info!(file = %file.file, chunks = file.chunks.len(), "indexed");
            }
        }

        if !was_cancelled {
            self.apply_deletions(&changes.deleted).await?;
        }
        emit(&progress, ProgressEvent::phase(Phase::Saving, "committing manifest"));
        self.finish_commit(&options.root_dir).await?;
        self.version.bump()?;

        emit(
            &progress,
            ProgressEvent {
                phase: Phase::Complete,
                message: format!("indexed {files_indexed} files"),
                files_total: Some(files_total),
                files_processed: Some(files_indexed),
                chunks_processed: Some(chunks_created),
            },
        );
        Ok(IndexingResult {
            success: true,
            files_indexed,
            chunks_created,
            duration_ms: started.elapsed().as_millis() as u64,
            incremental: true,
            error: None,
        })
    }

    async fn full_index(
        &self,
        options: &IndexingOptions,
        scanner: &Scanner,
        embedder: SharedEmbeddingProvider,
        progress: Option<ProgressCallback>,
        started: Instant,
    ) -> Result<IndexingResult> {
        self.store.clear().await?;
        self.manifest.clear().await;

        let files = scanner.scan();
        let files_total = files.len() as u32;
        emit(
            &progress,
            ProgressEvent {
                phase: Phase::Scanning,
                message: format!("found {files_total} files"),
                files_total: Some(files_total),
                files_processed: None,
                chunks_processed: None,
            },
        );

        let mut batcher = ChunkBatchProcessor::new(self.store.clone(), self.settings.chunk_batch_size);
        let mut entries: Vec<(String, FileEntry)> = Vec::new();
        let mut files_indexed = 0u32;
        let mut chunks_created = 0u32;

        let mut processed = self.process_files(&options.root_dir, files);
        while let Some(outcome) = processed.next().await {
            if cancelled(options) {
                // Cooperative shutdown at a file boundary: flush and commit
                // what landed, report the partial counts as success.
                break;
            }
            let Some(file) = outcome else { continue };
            if file.chunks.is_empty() {
                entries.push((
                    file.file.clone(),
                    FileEntry {
                        last_modified: file.mtime,
                        chunk_count: 0,
                        content_hash: file.content_hash.clone(),
                    },
                ));
                continue;
            }

            emit(
                &progress,
                ProgressEvent {
                    phase: Phase::Indexing,
                    message: format!("indexing {}", file.file),
                    files_total: Some(files_total),
                    files_processed: Some(files_indexed),
                    chunks_processed: Some(chunks_created),
                },
            );
            let vectors = self.embed_with_cache(embedder.as_ref(), &file.chunks).await?;
            let metadatas: Vec<ChunkMetadata> = file
                .chunks
                .iter()
                .map(|c| ChunkMetadata::from_chunk(c, &self.scope))
                .collect();
            let contents: Vec<String> = file.chunks.iter().map(|c| c.content.clone()).collect();
            batcher.add_chunks(vectors, metadatas, contents).await?;

            entries.push((
                file.file.clone(),
                FileEntry {
                    last_modified: file.mtime,
                    chunk_count: file.chunks.len() as u32,
                    content_hash: file.content_hash.clone(),
                },
            ));
            files_indexed += 1;
            chunks_created += file.chunks.len() as u32;
            if options.verbose {
                tracing::info!(file = %file.file, chunks = file.chunks.len(), "indexed");
            }
        }

        batcher.flush().await?;
        emit(&progress, ProgressEvent::phase(Phase::Saving, "committing manifest"));
        self.manifest.update_files(entries).await;
        self.finish_commit(&options.root_dir).await?;
        self.version.bump()?;

        emit(
            &progress,
            ProgressEvent {
                phase: Phase::Complete,
                message: format!("indexed {files_indexed} files"),
                files_total: Some(files_total),
                files_processed: Some(files_indexed),
                chunks_processed: Some(chunks_created),
            },
        );
        Ok(IndexingResult {
            success: true,
            files_indexed,
            chunks_created,
            duration_ms: started.elapsed().as_millis() as u64,
            incremental: false,
            error: None,
        })
    }

    /// Chunk + hash files on the bounded worker pool, streaming results as
    /// they complete. Per-file failures are logged and yield `None`.
    fn process_files(
        &self,
        root: &Path,
        files: Vec<String>,
    ) -> futures::stream::BoxStream<'static, Option<ProcessedFile>> {
        let root = root.to_path_buf();
        let chunking = self.chunking.clone();
        let hasher = self.hasher;
        stream::iter(files)
            .map(move |file| {
                let root = root.clone();
                let chunking = chunking.clone();
                tokio::task::spawn_blocking(move || process_one(&root, &file, &chunking, &hasher))
            })
            .buffer_unordered(self.settings.concurrency)
            .map(|joined| match joined {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::error!(error = %err, "file worker panicked");
                    None
                }
            })
            .boxed()
    }

    /// Cache-first embedding. Misses are batched through the provider in
    /// `embedding_batch_size` groups and written back to the cache.
    async fn embed_with_cache(
        &self,
        embedder: &dyn EmbeddingProvider,
        chunks: &[CodeChunk],
    ) -> Result<Vec<Vec<f32>>> {
        let dimensions = embedder.dimensions();
        let mut vectors: Vec<Option<Vec<f32>>> = vec![None; chunks.len()];
        let mut miss_indices: Vec<usize> = Vec::new();
        let mut hashes: Vec<String> = Vec::with_capacity(chunks.len());

        for (i, chunk) in chunks.iter().enumerate() {
            let content_hash = self.hasher.hash_content(&chunk.content);
            if let Some(cache) = &self.cache {
                match cache.get(&content_hash) {
                    // Dimension drift between cache and service counts as a
                    // miss; never persist or reuse a wrong-width vector.
                    Some(vector) if vector.len() == dimensions => {
                        vectors[i] = Some(vector);
                        hashes.push(content_hash);
                        continue;
                    }
                    _ => {}
                }
            }
            miss_indices.push(i);
            hashes.push(content_hash);
        }

        for batch in miss_indices.chunks(self.settings.embedding_batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|&i| chunks[i].content.clone()).collect();
            let embedded = embed_with_retries(embedder, &texts).await?;
            if embedded.len() != texts.len() {
                return Err(Error::embedding(format!(
                    "provider returned {} vectors for {} inputs",
                    embedded.len(),
                    texts.len()
                )));
            }
            for (&i, vector) in batch.iter().zip(embedded) {
                if let Some(cache) = &self.cache {
                    cache.put(&hashes[i], vector.clone());
                }
                vectors[i] = Some(vector);
            }
        }

        Ok(vectors
            .into_iter()
            .map(|v| v.expect("every chunk embedded"))
            .collect())
    }

    async fn apply_deletions(&self, deleted: &[String]) -> Result<()> {
        for file in deleted {
            self.store.delete_by_file(file).await?;
            self.manifest.remove_file(file).await;
            tracing::debug!(file = %file, "removed from index");
        }
        Ok(())
    }

    async fn commit_git_state(&self, root: &Path) {
        let git = GitContext::new(root);
        let state = if git.is_repo().await {
            match (git.branch().await, git.head_commit().await) {
                (Ok(branch), Ok(commit)) => Some(GitState {
                    branch,
                    commit,
                    timestamp: now_millis(),
                }),
                _ => None,
            }
        } else {
            None
        };
        self.manifest.update_git_state(state).await;
    }

    async fn finish_commit(&self, root: &Path) -> Result<()> {
        self.commit_git_state(root).await;
        if let Some(cache) = &self.cache {
            if let Err(err) = cache.flush() {
                tracing::warn!(error = %err, "embedding cache flush failed");
            }
            let stats = cache.stats();
            tracing::debug!(hits = stats.hits, misses = stats.misses, entries = stats.entries, "embedding cache stats");
        }
        Ok(())
    }
}

fn cancelled(options: &IndexingOptions) -> bool {
    options
        .cancel
        .as_ref()
        .is_some_and(|flag| flag.load(Ordering::Relaxed))
}

fn emit(progress: &Option<ProgressCallback>, event: ProgressEvent) {
    if let Some(callback) = progress {
        callback(event);
    }
}

async fn embed_with_retries(
    embedder: &dyn EmbeddingProvider,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    let mut delay = std::time::Duration::from_millis(200);
    let mut attempt = 1;
    loop {
        match embedder.embed_batch(texts).await {
            Ok(vectors) => return Ok(vectors),
            Err(err) if attempt < 3 => {
                tracing::warn!(attempt, error = %err, "embedding failed, retrying");
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

fn process_one(
    root: &Path,
    file: &str,
    chunking: &ChunkingOptions,
    hasher: &ContentHasher,
) -> Option<ProcessedFile> {
    let absolute = root.join(file);
    let bytes = match std::fs::read(&absolute) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!(file, error = %err, "read failed, file skipped");
            return None;
        }
    };
    let content = String::from_utf8_lossy(&bytes).into_owned();
    let content_hash = hasher.hash_bytes(&bytes);
    let mtime = file_mtime_millis(&absolute).unwrap_or_else(now_millis);

    let chunks = match chunk_file(file, &content, chunking) {
        Ok(chunks) => chunks,
        Err(err) => {
            // ast_fallback = Error surfaces parse failures here; record the
            // skip and keep going.
            tracing::warn!(file, error = %err, "chunking failed, file skipped");
            return None;
        }
    };
    // Empty chunk lists flow through so the caller can drop stale rows for
    // files that became empty.
    Some(ProcessedFile {
        file: file.to_string(),
        chunks,
        mtime,
        content_hash,
    })
}
