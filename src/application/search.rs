//! Query surface for read consumers
//!
//! Thin service over the store and embedder exposing the read operations
//! consumers (CLI, editors, review engines) use: semantic search from a
//! text query, structured scans, and symbol queries. Also owns the
//! hot-reload handshake: `refresh_if_stale` polls the version file and
//! refreshes store handles when the index moved underneath us.

use crate::domain::error::Result;
use crate::domain::ports::vector_store::{ScanFilter, SymbolFilter};
use crate::domain::ports::{SharedEmbeddingProvider, SharedVectorStore, VectorStore};
use crate::domain::types::{SearchResult, VectorRow};

/// Read-only query service bound to one store and embedder.
pub struct SearchService {
    store: SharedVectorStore,
    embedder: SharedEmbeddingProvider,
}

impl SearchService {
    /// Bind a service to store and embedder handles.
    pub fn new(store: SharedVectorStore, embedder: SharedEmbeddingProvider) -> Self {
        Self { store, embedder }
    }

    /// Semantic search from a text query: embed, then KNN in scope.
    pub async fn search_code(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let vectors = self.embedder.embed_batch(&[query.to_string()]).await?;
        let query_vector = vectors
            .into_iter()
            .next()
            .ok_or_else(|| crate::domain::error::Error::embedding("empty embedding batch"))?;
        self.store.search(&query_vector, limit).await
    }

    /// KNN with a caller-provided vector.
    pub async fn search_vector(&self, query: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        self.store.search(query, limit).await
    }

    /// Structured scan without a vector query.
    pub async fn scan_with_filter(&self, filter: &ScanFilter) -> Result<Vec<VectorRow>> {
        self.store.scan_with_filter(filter).await
    }

    /// Scan every row in scope.
    pub async fn scan_all(&self, filter: &ScanFilter) -> Result<Vec<VectorRow>> {
        self.store.scan_all(filter).await
    }

    /// Scan restricted to named symbol rows.
    pub async fn query_symbols(&self, filter: &SymbolFilter) -> Result<Vec<VectorRow>> {
        self.store.query_symbols(filter).await
    }

    /// Hot-reload handshake: when the version file advanced past the
    /// cached counter, refresh store handles and report `true`.
    pub async fn refresh_if_stale(&self) -> Result<bool> {
        if self.store.check_version().await? {
            self.store.reconnect().await?;
            return Ok(true);
        }
        Ok(false)
    }

    /// The underlying store handle (for analyzers sharing the service).
    pub fn store(&self) -> &SharedVectorStore {
        &self.store
    }
}
