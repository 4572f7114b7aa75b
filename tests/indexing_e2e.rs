//! End-to-end indexing scenarios against the embedded backend.
//!
//! All runs use the deterministic hash embedder so vector outcomes are
//! reproducible without a model runtime.

use codescope::adapters::embedding::HashEmbeddingProvider;
use codescope::adapters::vector_store::EmbeddedVectorStore;
use codescope::application::analysis::{find_duplicates, DuplicateOptions};
use codescope::application::indexing::{Indexer, IndexingOptions};
use codescope::domain::chunking::ChunkingOptions;
use codescope::domain::ports::vector_store::ScanFilter;
use codescope::domain::ports::{SharedEmbeddingProvider, SharedVectorStore, VectorStore};
use codescope::domain::types::{ChunkKind, TenantScope};
use codescope::infrastructure::config::IndexingSettings;
use codescope::infrastructure::embedding_cache::{EmbeddingCache, EmbeddingCacheConfig};
use codescope::infrastructure::manifest::{ManifestManager, MANIFEST_FILE, MANIFEST_FORMAT_VERSION};
use codescope::infrastructure::version::VersionFile;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const DIMS: usize = 384;

struct Harness {
    _project: TempDir,
    _index: TempDir,
    project_root: std::path::PathBuf,
    index_root: std::path::PathBuf,
    indexer: Indexer,
    store: SharedVectorStore,
    manifest: Arc<ManifestManager>,
}

fn harness() -> Harness {
    let project = TempDir::new().unwrap();
    let index = TempDir::new().unwrap();
    let project_root = project.path().to_path_buf();
    let index_root = index.path().to_path_buf();

    let scope = TenantScope::local_for(&project_root);
    let store: SharedVectorStore =
        Arc::new(EmbeddedVectorStore::new(&index_root, scope.clone(), DIMS));
    let embedder: SharedEmbeddingProvider = Arc::new(HashEmbeddingProvider::new(DIMS).unwrap());
    let cache = EmbeddingCache::open(EmbeddingCacheConfig::at_index_root(
        &index_root,
        embedder.model_name(),
    ))
    .ok()
    .map(Arc::new);
    let manifest = Arc::new(ManifestManager::new(&index_root));

    let indexer = Indexer::new(
        store.clone(),
        embedder,
        cache,
        manifest.clone(),
        &index_root,
        scope,
        IndexingSettings::default(),
        ChunkingOptions::default(),
    );

    Harness {
        _project: project,
        _index: index,
        project_root,
        index_root,
        indexer,
        store,
        manifest,
    }
}

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

async fn run(h: &Harness) -> codescope::IndexingResult {
    h.indexer
        .index_codebase(&IndexingOptions::new(&h.project_root))
        .await
}

#[tokio::test]
async fn first_time_index_single_file() {
    let h = harness();
    write(
        &h.project_root,
        "src/a.ts",
        "export function f(x){ if(x){return 1;} return 0; }",
    );

    let result = run(&h).await;
    assert!(result.success, "error: {:?}", result.error);
    assert_eq!(result.files_indexed, 1);
    assert_eq!(result.chunks_created, 1);
    assert!(!result.incremental);

    let rows = h.store.scan_all(&ScanFilter::default()).await.unwrap();
    assert_eq!(rows.len(), 1);
    let meta = &rows[0].metadata;
    assert_eq!(meta.file, "src/a.ts");
    assert_eq!(meta.symbol_name.as_deref(), Some("f"));
    assert_eq!(meta.symbol_type, Some(ChunkKind::Function));
    assert_eq!(meta.complexity, 2);
    assert!(meta.imports.is_empty());
    assert!(meta.call_sites.is_empty());
    assert!(meta.start_line <= meta.end_line);

    let manifest = h.manifest.snapshot().await.unwrap();
    assert_eq!(manifest.files["src/a.ts"].chunk_count, 1);
    assert_eq!(manifest.format_version, MANIFEST_FORMAT_VERSION);

    let version = VersionFile::new(&h.index_root).read().unwrap();
    assert!(version > 0, "version file must be written");
}

#[tokio::test]
async fn touch_only_second_run_reindexes_nothing() {
    let h = harness();
    let content = "export function f(x){ if(x){return 1;} return 0; }";
    write(&h.project_root, "src/a.ts", content);

    let first = run(&h).await;
    assert!(first.success);

    // Touch: rewrite identical bytes with a fresh mtime.
    std::fs::write(h.project_root.join("src/a.ts"), content).unwrap();

    let second = run(&h).await;
    assert!(second.success);
    assert_eq!(second.files_indexed, 0);
    assert_eq!(second.chunks_created, 0);
    assert!(second.incremental);
}

#[tokio::test]
async fn reindex_is_idempotent_on_store_and_manifest() {
    let h = harness();
    write(&h.project_root, "src/a.ts", "export function f(x){ return x; }");
    write(&h.project_root, "src/b.ts", "export function g(y){ return y * 2; }");

    assert!(run(&h).await.success);
    let rows_before = h.store.scan_all(&ScanFilter::default()).await.unwrap();
    let files_before = h.manifest.get_indexed_files().await;

    let second = run(&h).await;
    assert!(second.success);
    assert_eq!(second.files_indexed, 0);

    let rows_after = h.store.scan_all(&ScanFilter::default()).await.unwrap();
    assert_eq!(rows_before, rows_after, "store must be byte-for-byte stable");
    assert_eq!(files_before, h.manifest.get_indexed_files().await);
}

#[tokio::test]
async fn modification_replaces_rows_without_stale_duplicates() {
    let h = harness();
    write(
        &h.project_root,
        "src/a.ts",
        "export function f(x){ if(x){return 1;} return 0; }",
    );
    assert!(run(&h).await.success);

    write(
        &h.project_root,
        "src/a.ts",
        "export function f(x){ if(x){return 1;} if(!x){return 2;} return 0; }",
    );
    let result = run(&h).await;
    assert!(result.success);
    assert_eq!(result.files_indexed, 1);
    assert!(result.incremental);

    let rows = h
        .store
        .scan_with_filter(&ScanFilter {
            file: Some("src/a.ts".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(rows.len(), 1, "old row must be gone");
    assert_eq!(rows[0].metadata.complexity, 3);
}

#[tokio::test]
async fn deletion_removes_rows_and_manifest_entry() {
    let h = harness();
    write(&h.project_root, "src/a.ts", "export function f(){ return 1; }");
    write(&h.project_root, "src/b.ts", "export function g(){ return 2; }");
    assert!(run(&h).await.success);

    std::fs::remove_file(h.project_root.join("src/a.ts")).unwrap();
    let result = run(&h).await;
    assert!(result.success);
    assert_eq!(result.files_indexed, 0);

    let rows = h
        .store
        .scan_with_filter(&ScanFilter {
            file: Some("src/a.ts".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(rows.is_empty(), "deleted file must have zero rows");
    assert!(!h.manifest.get_indexed_files().await.contains(&"src/a.ts".to_string()));
    // The surviving file is untouched.
    assert!(h.store.has_data().await.unwrap());
}

#[tokio::test]
async fn manifest_version_mismatch_forces_full_reindex() {
    let h = harness();
    write(&h.project_root, "src/a.ts", "export function f(){ return 1; }");
    assert!(run(&h).await.success);

    // Corrupt the format version on disk.
    let manifest_path = h.index_root.join(MANIFEST_FILE);
    let mut value: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&manifest_path).unwrap()).unwrap();
    value["format_version"] = serde_json::json!(MANIFEST_FORMAT_VERSION - 1);
    std::fs::write(&manifest_path, serde_json::to_vec(&value).unwrap()).unwrap();

    // A fresh manager (fresh process) sees the mismatch and goes full.
    let h2 = {
        let scope = TenantScope::local_for(&h.project_root);
        let store: SharedVectorStore =
            Arc::new(EmbeddedVectorStore::new(&h.index_root, scope.clone(), DIMS));
        let embedder: SharedEmbeddingProvider = Arc::new(HashEmbeddingProvider::new(DIMS).unwrap());
        let manifest = Arc::new(ManifestManager::new(&h.index_root));
        Indexer::new(
            store,
            embedder,
            None,
            manifest,
            &h.index_root,
            scope,
            IndexingSettings::default(),
            ChunkingOptions::default(),
        )
    };
    let result = h2.index_codebase(&IndexingOptions::new(&h.project_root)).await;
    assert!(result.success);
    assert!(!result.incremental, "format mismatch must trigger the full path");
    assert_eq!(result.files_indexed, 1);
}

#[tokio::test]
async fn empty_repository_is_success() {
    let h = harness();
    let result = run(&h).await;
    assert!(result.success);
    assert_eq!(result.files_indexed, 0);
    assert_eq!(result.chunks_created, 0);
    assert!(!result.incremental);
}

#[tokio::test]
async fn force_rebuilds_from_scratch() {
    let h = harness();
    write(&h.project_root, "src/a.ts", "export function f(){ return 1; }");
    assert!(run(&h).await.success);

    let mut options = IndexingOptions::new(&h.project_root);
    options.force = true;
    let result = h.indexer.index_codebase(&options).await;
    assert!(result.success);
    assert!(!result.incremental);
    assert_eq!(result.files_indexed, 1);

    let rows = h.store.scan_all(&ScanFilter::default()).await.unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn duplicate_functions_cluster_across_files() {
    let h = harness();

    // A 30-line function duplicated into two files.
    let mut body = String::from("export function copyPasta(a, b) {\n");
    for i in 0..27 {
        body.push_str(&format!("  const v{i} = a + b + {i};\n"));
    }
    body.push_str("  return a + b;\n}");
    assert_eq!(body.lines().count(), 30);

    write(&h.project_root, "src/first.ts", &body);
    write(&h.project_root, "src/second.ts", &body);
    assert!(run(&h).await.success);

    let rows = h.store.scan_all(&ScanFilter::default()).await.unwrap();
    let analysis = find_duplicates(&rows, &DuplicateOptions::default());
    assert_eq!(analysis.clusters.len(), 1);
    let cluster = &analysis.clusters[0];
    assert_eq!(cluster.count, 2);
    assert_eq!(cluster.total_lines, 60);
    let files: Vec<&str> = cluster.instances.iter().map(|i| i.file.as_str()).collect();
    assert!(files.contains(&"src/first.ts"));
    assert!(files.contains(&"src/second.ts"));
}

#[tokio::test]
async fn version_file_is_monotonic_across_runs() {
    let h = harness();
    write(&h.project_root, "src/a.ts", "export function f(){ return 1; }");
    assert!(run(&h).await.success);
    let v1 = VersionFile::new(&h.index_root).read().unwrap();

    write(&h.project_root, "src/a.ts", "export function f(){ return 2; }");
    assert!(run(&h).await.success);
    let v2 = VersionFile::new(&h.index_root).read().unwrap();
    assert!(v2 > v1);
}

#[tokio::test]
async fn manifest_chunk_counts_match_store_rows() {
    let h = harness();
    write(
        &h.project_root,
        "src/multi.ts",
        "import { x } from \"./x\";\n\nexport function a(){ return 1; }\n\nexport function b(){ return 2; }\n",
    );
    assert!(run(&h).await.success);

    let manifest = h.manifest.snapshot().await.unwrap();
    for (file, entry) in &manifest.files {
        let rows = h
            .store
            .scan_with_filter(&ScanFilter {
                file: Some(file.clone()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(
            rows.len() as u32,
            entry.chunk_count,
            "manifest count must match store rows for {file}"
        );
    }
}

#[tokio::test]
async fn embedding_cache_hits_on_second_full_run() {
    let project = TempDir::new().unwrap();
    let index = TempDir::new().unwrap();
    write(project.path(), "src/a.ts", "export function f(){ return 1; }");

    let scope = TenantScope::local_for(project.path());
    let embedder: SharedEmbeddingProvider = Arc::new(HashEmbeddingProvider::new(DIMS).unwrap());
    let cache = Arc::new(
        EmbeddingCache::open(EmbeddingCacheConfig::at_index_root(
            index.path(),
            embedder.model_name(),
        ))
        .unwrap(),
    );
    let store: SharedVectorStore =
        Arc::new(EmbeddedVectorStore::new(index.path(), scope.clone(), DIMS));
    let manifest = Arc::new(ManifestManager::new(index.path()));
    let indexer = Indexer::new(
        store,
        embedder,
        Some(cache.clone()),
        manifest,
        index.path(),
        scope,
        IndexingSettings::default(),
        ChunkingOptions::default(),
    );

    let mut options = IndexingOptions::new(project.path());
    assert!(indexer.index_codebase(&options).await.success);
    let after_first = cache.stats();
    assert!(after_first.misses > 0);

    options.force = true;
    assert!(indexer.index_codebase(&options).await.success);
    let after_second = cache.stats();
    assert!(
        after_second.hits > after_first.hits,
        "second run must hit the cache: {after_second:?}"
    );
}
