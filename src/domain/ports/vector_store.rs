//! Vector storage backend interface
//!
//! Durable store for `{vector, content, metadata}` rows with tenant, branch
//! and commit isolation. Two concrete backends implement this trait: an
//! embedded columnar store writing local files, and a remote multi-tenant
//! HTTP service. Operations meaningful only to the remote backend live on
//! the [`CrossScopeStore`] extension trait and are feature-detected by the
//! caller.

use crate::domain::error::Result;
use crate::domain::types::{ChunkKind, ChunkMetadata, Language, SearchResult, TenantScope, VectorRow};
use async_trait::async_trait;
use std::sync::Arc;

/// Shared handle to a vector store.
pub type SharedVectorStore = Arc<dyn VectorStore>;

/// Implementation-defined row cap applied by `scan_all`.
pub const SCAN_ALL_LIMIT: usize = 100_000;

/// Structured scan restriction without a vector query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanFilter {
    /// Restrict to one language
    pub language: Option<Language>,
    /// Substring match against the file path
    pub pattern: Option<String>,
    /// Exact file path match
    pub file: Option<String>,
    /// Row cap; backends apply [`SCAN_ALL_LIMIT`] when absent
    pub limit: Option<usize>,
}

impl ScanFilter {
    /// True when a row's metadata passes this filter.
    pub fn matches(&self, metadata: &ChunkMetadata) -> bool {
        if let Some(language) = self.language {
            if metadata.language != language {
                return false;
            }
        }
        if let Some(pattern) = &self.pattern {
            if !metadata.file.contains(pattern.as_str()) {
                return false;
            }
        }
        if let Some(file) = &self.file {
            if metadata.file != *file {
                return false;
            }
        }
        true
    }
}

/// Restriction for symbol queries.
///
/// Matches only rows whose `symbol_type` is one of the symbol kinds
/// (`function`, `method`, `class`, `interface`); `pattern` matches the
/// symbol name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolFilter {
    /// Restrict to one language
    pub language: Option<Language>,
    /// Substring match against the symbol name
    pub pattern: Option<String>,
    /// Restrict to one symbol kind
    pub symbol_type: Option<ChunkKind>,
    /// Row cap
    pub limit: Option<usize>,
}

impl SymbolFilter {
    /// True when a row's metadata passes this filter.
    ///
    /// Matching is on `symbol_type` only; `kind` is intentionally ignored
    /// (module/block rows never carry a symbol type).
    pub fn matches(&self, metadata: &ChunkMetadata) -> bool {
        let Some(symbol_type) = metadata.symbol_type else {
            return false;
        };
        if !symbol_type.is_symbol() {
            return false;
        }
        if let Some(wanted) = self.symbol_type {
            if symbol_type != wanted {
                return false;
            }
        }
        if let Some(language) = self.language {
            if metadata.language != language {
                return false;
            }
        }
        if let Some(pattern) = &self.pattern {
            match &metadata.symbol_name {
                Some(name) if name.contains(pattern.as_str()) => {}
                _ => return false,
            }
        }
        true
    }
}

/// Durable vector storage backend scoped to one tenant quadruple.
///
/// All operations are asynchronous with no ordering guarantees between
/// concurrent calls unless stated. `search` and the scan family MUST
/// enforce the current [`TenantScope`].
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create tables/collections if absent; read and cache the version
    /// counter. Must be called before any other operation.
    async fn initialize(&self) -> Result<()>;

    /// Append rows. Caller guarantees equal column lengths; mismatches are
    /// rejected with `BatchLengthMismatch`. Each call is atomic; ordering
    /// between concurrent calls is unspecified.
    async fn insert_batch(
        &self,
        vectors: Vec<Vec<f32>>,
        metadatas: Vec<ChunkMetadata>,
        contents: Vec<String>,
    ) -> Result<()>;

    /// K-nearest-neighbor search restricted to the current tenant scope.
    async fn search(&self, query: &[f32], limit: usize) -> Result<Vec<SearchResult>>;

    /// Structured scan without a vector query.
    async fn scan_with_filter(&self, filter: &ScanFilter) -> Result<Vec<VectorRow>>;

    /// Scan every row in scope, up to [`SCAN_ALL_LIMIT`].
    async fn scan_all(&self, filter: &ScanFilter) -> Result<Vec<VectorRow>>;

    /// Scan restricted to named symbol rows.
    async fn query_symbols(&self, filter: &SymbolFilter) -> Result<Vec<VectorRow>>;

    /// Remove all rows in scope whose `file` equals the input.
    async fn delete_by_file(&self, file: &str) -> Result<()>;

    /// Atomic-from-the-consumer's-view `delete_by_file` + `insert_batch`.
    async fn update_file(
        &self,
        file: &str,
        vectors: Vec<Vec<f32>>,
        metadatas: Vec<ChunkMetadata>,
        contents: Vec<String>,
    ) -> Result<()>;

    /// Delete all rows in the current tenant/branch/commit scope only.
    async fn clear(&self) -> Result<()>;

    /// Whether any row exists in the current scope.
    async fn has_data(&self) -> Result<bool>;

    /// Inspect the version file; true when the on-disk counter advanced
    /// past the cached one. Rate-limited to at most one real read per
    /// second per handle.
    async fn check_version(&self) -> Result<bool>;

    /// Refresh handles after `check_version` reported a change.
    async fn reconnect(&self) -> Result<()>;

    /// The tenant scope this handle is bound to.
    fn scope(&self) -> &TenantScope;

    /// Short backend identifier for logs.
    fn backend_name(&self) -> &'static str;
}

/// Cross-scope query extension.
///
/// Relaxes the tenant filter to the whole organization, with an optional
/// allow-list of repositories and an optional branch restriction. Only the
/// remote multi-tenant backend implements this; callers feature-detect by
/// downcasting or by a factory-provided handle.
#[async_trait]
pub trait CrossScopeStore: VectorStore {
    /// KNN search across repositories of the current org.
    async fn search_across_repos(
        &self,
        query: &[f32],
        limit: usize,
        repo_ids: Option<&[String]>,
        branch: Option<&str>,
    ) -> Result<Vec<SearchResult>>;

    /// Structured scan across repositories of the current org.
    async fn scan_across_repos(
        &self,
        filter: &ScanFilter,
        repo_ids: Option<&[String]>,
        branch: Option<&str>,
    ) -> Result<Vec<VectorRow>>;
}
