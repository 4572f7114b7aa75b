//! Git-aware change detection: branch switches minimize the work set.
//!
//! These tests drive a real temporary git repository and are skipped when
//! git is not on PATH.

use codescope::adapters::embedding::HashEmbeddingProvider;
use codescope::adapters::vector_store::EmbeddedVectorStore;
use codescope::application::indexing::{
    ChangeDetector, ChangeReason, Indexer, IndexingOptions, Scanner, ScannerOptions,
};
use codescope::domain::chunking::ChunkingOptions;
use codescope::domain::ports::{SharedEmbeddingProvider, SharedVectorStore};
use codescope::domain::types::TenantScope;
use codescope::infrastructure::config::IndexingSettings;
use codescope::infrastructure::manifest::ManifestManager;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use tempfile::TempDir;

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn git(root: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(root)
        .env("GIT_AUTHOR_NAME", "test")
        .env("GIT_AUTHOR_EMAIL", "test@test")
        .env("GIT_COMMITTER_NAME", "test")
        .env("GIT_COMMITTER_EMAIL", "test@test")
        .output()
        .expect("git invocation");
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

#[tokio::test]
async fn branch_switch_yields_minimal_work_set() {
    if !git_available() {
        eprintln!("git unavailable, skipping");
        return;
    }

    let project = TempDir::new().unwrap();
    let index = TempDir::new().unwrap();
    let root = project.path();

    // Ten files committed on main.
    git(root, &["init", "-q", "-b", "main"]);
    for i in 0..10 {
        write(root, &format!("src/f{i}.ts"), &format!("export function f{i}() {{ return {i}; }}"));
    }
    git(root, &["add", "."]);
    git(root, &["commit", "-q", "-m", "initial"]);

    // Index on main; this records the git state in the manifest.
    let scope = TenantScope::local_for(root);
    let store: SharedVectorStore =
        Arc::new(EmbeddedVectorStore::new(index.path(), scope.clone(), 384));
    let embedder: SharedEmbeddingProvider = Arc::new(HashEmbeddingProvider::new(384).unwrap());
    let manifest = Arc::new(ManifestManager::new(index.path()));
    let indexer = Indexer::new(
        store,
        embedder,
        None,
        manifest.clone(),
        index.path(),
        scope,
        IndexingSettings::default(),
        ChunkingOptions::default(),
    );
    let result = indexer.index_codebase(&IndexingOptions::new(root)).await;
    assert!(result.success);
    assert_eq!(result.files_indexed, 10);
    assert!(manifest.snapshot().await.unwrap().git_state.is_some());

    // A feature branch modifies one file and adds another.
    git(root, &["checkout", "-q", "-b", "feature"]);
    write(root, "src/f3.ts", "export function f3() { return 333; }");
    write(root, "src/new.ts", "export function brandNew() { return 1; }");
    git(root, &["add", "."]);
    git(root, &["commit", "-q", "-m", "feature work"]);

    let scanner = Scanner::new(root, ScannerOptions::default());
    let detector = ChangeDetector::new(root, &manifest, &scanner);
    let changes = detector.detect().await;

    assert_eq!(changes.reason, ChangeReason::GitStateChanged);
    assert_eq!(changes.modified, vec!["src/f3.ts".to_string()]);
    assert_eq!(changes.added, vec!["src/new.ts".to_string()]);
    assert!(changes.deleted.is_empty(), "nine untouched files stay untouched");
}

#[tokio::test]
async fn same_commit_uses_mtime_detection() {
    if !git_available() {
        eprintln!("git unavailable, skipping");
        return;
    }

    let project = TempDir::new().unwrap();
    let index = TempDir::new().unwrap();
    let root = project.path();

    git(root, &["init", "-q", "-b", "main"]);
    write(root, "src/a.ts", "export function a() { return 1; }");
    git(root, &["add", "."]);
    git(root, &["commit", "-q", "-m", "initial"]);

    let scope = TenantScope::local_for(root);
    let store: SharedVectorStore =
        Arc::new(EmbeddedVectorStore::new(index.path(), scope.clone(), 384));
    let embedder: SharedEmbeddingProvider = Arc::new(HashEmbeddingProvider::new(384).unwrap());
    let manifest = Arc::new(ManifestManager::new(index.path()));
    let indexer = Indexer::new(
        store,
        embedder,
        None,
        manifest.clone(),
        index.path(),
        scope,
        IndexingSettings::default(),
        ChunkingOptions::default(),
    );
    assert!(indexer.index_codebase(&IndexingOptions::new(root)).await.success);

    // Uncommitted working-tree edit: HEAD unchanged, mtime path applies.
    write(root, "src/a.ts", "export function a() { return 2; }");
    let scanner = Scanner::new(root, ScannerOptions::default());
    let detector = ChangeDetector::new(root, &manifest, &scanner);
    let changes = detector.detect().await;

    assert_eq!(changes.reason, ChangeReason::Mtime);
    assert_eq!(changes.modified, vec!["src/a.ts".to_string()]);
    assert!(changes.added.is_empty());
}
