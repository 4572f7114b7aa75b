//! Embedded columnar vector store
//!
//! Local single-node backend writing one struct-of-arrays table under the
//! project's index root (`<home>/.codescope/indices/<project>-<8hex>/`).
//! Hot columns (file, line range, vector) are parallel arrays scanned
//! directly; search is brute-force inner product over unit vectors. The
//! whole table persists atomically (sibling-then-rename) after each
//! mutation batch, and the version file lives beside the data.
//!
//! The tenant scope is synthesized as stable locals by the caller (see
//! `TenantScope::local_for`), so every row written through one handle
//! shares the handle's scope; filtering still checks scope per row so a
//! shared directory stays correct.

use crate::domain::error::{Error, Result};
use crate::domain::ports::vector_store::{ScanFilter, SymbolFilter, VectorStore, SCAN_ALL_LIMIT};
use crate::domain::types::{ChunkMetadata, RelevanceTag, SearchResult, TenantScope, VectorRow};
use crate::infrastructure::version::VersionPoller;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Table file name inside the index root.
pub const TABLE_FILE: &str = "table.json";

/// Struct-of-arrays row storage. All columns stay index-aligned.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Table {
    files: Vec<String>,
    start_lines: Vec<u32>,
    end_lines: Vec<u32>,
    vectors: Vec<Vec<f32>>,
    contents: Vec<String>,
    metadatas: Vec<ChunkMetadata>,
}

impl Table {
    fn len(&self) -> usize {
        self.files.len()
    }

    fn push(&mut self, vector: Vec<f32>, metadata: ChunkMetadata, content: String) {
        self.files.push(metadata.file.clone());
        self.start_lines.push(metadata.start_line);
        self.end_lines.push(metadata.end_line);
        self.vectors.push(vector);
        self.contents.push(content);
        self.metadatas.push(metadata);
    }

    fn remove_where(&mut self, mut predicate: impl FnMut(usize) -> bool) {
        let mut keep = Vec::with_capacity(self.len());
        for i in 0..self.len() {
            if !predicate(i) {
                keep.push(i);
            }
        }
        if keep.len() == self.len() {
            return;
        }
        self.files = keep.iter().map(|&i| self.files[i].clone()).collect();
        self.start_lines = keep.iter().map(|&i| self.start_lines[i]).collect();
        self.end_lines = keep.iter().map(|&i| self.end_lines[i]).collect();
        self.vectors = keep.iter().map(|&i| self.vectors[i].clone()).collect();
        self.contents = keep.iter().map(|&i| self.contents[i].clone()).collect();
        self.metadatas = keep.iter().map(|&i| self.metadatas[i].clone()).collect();
    }
}

struct Scored(f32, usize);

impl PartialEq for Scored {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl Eq for Scored {}
impl PartialOrd for Scored {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Scored {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap by score for top-k selection.
        other.0.partial_cmp(&self.0).unwrap_or(Ordering::Equal)
    }
}

/// Embedded columnar/local vector store backend.
pub struct EmbeddedVectorStore {
    index_root: PathBuf,
    scope: TenantScope,
    dimensions: usize,
    table: RwLock<Option<Table>>,
    poller: VersionPoller,
}

impl EmbeddedVectorStore {
    /// Bind a store to an index root and tenant scope.
    pub fn new(index_root: &Path, scope: TenantScope, dimensions: usize) -> Self {
        Self {
            index_root: index_root.to_path_buf(),
            scope,
            dimensions,
            table: RwLock::new(None),
            poller: VersionPoller::new(index_root),
        }
    }

    fn table_path(&self) -> PathBuf {
        self.index_root.join(TABLE_FILE)
    }

    fn load_table(&self) -> Result<Table> {
        match std::fs::read(self.table_path()) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                Error::vector_db(format!(
                    "corrupt table at {}: {e}; clear the index and re-run",
                    self.table_path().display()
                ))
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Table::default()),
            Err(err) => Err(err.into()),
        }
    }

    fn persist(&self, table: &Table) -> Result<()> {
        std::fs::create_dir_all(&self.index_root)?;
        let json = serde_json::to_vec(table)?;
        let path = self.table_path();
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn in_scope(&self, metadata: &ChunkMetadata) -> bool {
        metadata.scope == self.scope
    }

    fn check_dimensions(&self, vectors: &[Vec<f32>]) -> Result<()> {
        for vector in vectors {
            if vector.len() != self.dimensions {
                return Err(Error::conflict(format!(
                    "vector dimension {} does not match store dimension {}; clear the index to change models",
                    vector.len(),
                    self.dimensions
                )));
            }
        }
        Ok(())
    }

    fn append_rows(
        table: &mut Table,
        vectors: Vec<Vec<f32>>,
        metadatas: Vec<ChunkMetadata>,
        contents: Vec<String>,
    ) {
        for ((vector, metadata), content) in vectors.into_iter().zip(metadatas).zip(contents) {
            table.push(vector, metadata, content);
        }
    }
}

#[async_trait]
impl VectorStore for EmbeddedVectorStore {
    async fn initialize(&self) -> Result<()> {
        std::fs::create_dir_all(&self.index_root)?;
        let loaded = self.load_table()?;
        *self.table.write().await = Some(loaded);
        self.poller.prime()?;
        Ok(())
    }

    async fn insert_batch(
        &self,
        vectors: Vec<Vec<f32>>,
        metadatas: Vec<ChunkMetadata>,
        contents: Vec<String>,
    ) -> Result<()> {
        if vectors.len() != metadatas.len() || vectors.len() != contents.len() {
            return Err(Error::BatchLengthMismatch {
                vectors: vectors.len(),
                metadatas: metadatas.len(),
                contents: contents.len(),
            });
        }
        self.check_dimensions(&vectors)?;

        let mut guard = self.table.write().await;
        let table = guard.as_mut().ok_or(Error::NotInitialized)?;
        Self::append_rows(table, vectors, metadatas, contents);
        self.persist(table)
    }

    async fn search(&self, query: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        let guard = self.table.read().await;
        let table = guard.as_ref().ok_or(Error::NotInitialized)?;

        let mut heap: BinaryHeap<Scored> = BinaryHeap::with_capacity(limit + 1);
        for i in 0..table.len() {
            if !self.in_scope(&table.metadatas[i]) {
                continue;
            }
            let score: f32 = table.vectors[i]
                .iter()
                .zip(query)
                .map(|(a, b)| a * b)
                .sum();
            heap.push(Scored(score, i));
            if heap.len() > limit {
                heap.pop();
            }
        }

        let mut hits: Vec<Scored> = heap.into_vec();
        hits.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
        Ok(hits
            .into_iter()
            .map(|Scored(score, i)| {
                let score = score.clamp(0.0, 1.0);
                SearchResult {
                    content: table.contents[i].clone(),
                    metadata: table.metadatas[i].clone(),
                    score,
                    relevance: RelevanceTag::from_score(score),
                }
            })
            .collect())
    }

    async fn scan_with_filter(&self, filter: &ScanFilter) -> Result<Vec<VectorRow>> {
        let guard = self.table.read().await;
        let table = guard.as_ref().ok_or(Error::NotInitialized)?;
        let limit = filter.limit.unwrap_or(SCAN_ALL_LIMIT);

        let mut rows = Vec::new();
        for i in 0..table.len() {
            if rows.len() >= limit {
                break;
            }
            let metadata = &table.metadatas[i];
            if self.in_scope(metadata) && filter.matches(metadata) {
                rows.push(VectorRow {
                    content: table.contents[i].clone(),
                    metadata: metadata.clone(),
                    vector: table.vectors[i].clone(),
                });
            }
        }
        Ok(rows)
    }

    async fn scan_all(&self, filter: &ScanFilter) -> Result<Vec<VectorRow>> {
        let widened = ScanFilter {
            limit: Some(filter.limit.unwrap_or(SCAN_ALL_LIMIT)),
            ..filter.clone()
        };
        self.scan_with_filter(&widened).await
    }

    async fn query_symbols(&self, filter: &SymbolFilter) -> Result<Vec<VectorRow>> {
        let guard = self.table.read().await;
        let table = guard.as_ref().ok_or(Error::NotInitialized)?;
        let limit = filter.limit.unwrap_or(SCAN_ALL_LIMIT);

        let mut rows = Vec::new();
        for i in 0..table.len() {
            if rows.len() >= limit {
                break;
            }
            let metadata = &table.metadatas[i];
            if self.in_scope(metadata) && filter.matches(metadata) {
                rows.push(VectorRow {
                    content: table.contents[i].clone(),
                    metadata: metadata.clone(),
                    vector: table.vectors[i].clone(),
                });
            }
        }
        Ok(rows)
    }

    async fn delete_by_file(&self, file: &str) -> Result<()> {
        let mut guard = self.table.write().await;
        let table = guard.as_mut().ok_or(Error::NotInitialized)?;
        let scope = self.scope.clone();
        let files = table.files.clone();
        let scopes: Vec<bool> = table.metadatas.iter().map(|m| m.scope == scope).collect();
        table.remove_where(|i| scopes[i] && files[i] == file);
        self.persist(table)
    }

    async fn update_file(
        &self,
        file: &str,
        vectors: Vec<Vec<f32>>,
        metadatas: Vec<ChunkMetadata>,
        contents: Vec<String>,
    ) -> Result<()> {
        if vectors.len() != metadatas.len() || vectors.len() != contents.len() {
            return Err(Error::BatchLengthMismatch {
                vectors: vectors.len(),
                metadatas: metadatas.len(),
                contents: contents.len(),
            });
        }
        self.check_dimensions(&vectors)?;

        // One write lock for delete + insert keeps the pair atomic from any
        // concurrent reader's view, and one persist covers both.
        let mut guard = self.table.write().await;
        let table = guard.as_mut().ok_or(Error::NotInitialized)?;
        let scope = self.scope.clone();
        let files = table.files.clone();
        let scopes: Vec<bool> = table.metadatas.iter().map(|m| m.scope == scope).collect();
        table.remove_where(|i| scopes[i] && files[i] == file);
        Self::append_rows(table, vectors, metadatas, contents);
        self.persist(table)
    }

    async fn clear(&self) -> Result<()> {
        let mut guard = self.table.write().await;
        let table = guard.as_mut().ok_or(Error::NotInitialized)?;
        let scope = self.scope.clone();
        let scopes: Vec<bool> = table.metadatas.iter().map(|m| m.scope == scope).collect();
        table.remove_where(|i| scopes[i]);
        self.persist(table)
    }

    async fn has_data(&self) -> Result<bool> {
        let guard = self.table.read().await;
        let table = guard.as_ref().ok_or(Error::NotInitialized)?;
        Ok(table.metadatas.iter().any(|m| self.in_scope(m)))
    }

    async fn check_version(&self) -> Result<bool> {
        self.poller.check_changed().await
    }

    async fn reconnect(&self) -> Result<()> {
        let loaded = self.load_table()?;
        *self.table.write().await = Some(loaded);
        self.poller.accept()?;
        Ok(())
    }

    fn scope(&self) -> &TenantScope {
        &self.scope
    }

    fn backend_name(&self) -> &'static str {
        "embedded"
    }
}
