//! Remote multi-tenant vector store backend
//!
//! Talks to a Qdrant-compatible HTTP service. One collection per `org_id`
//! hosts many repos and branches: every point's payload carries the full
//! tenant quadruple and all reads filter on it. Point IDs are UUIDs derived
//! deterministically from SHA-256 of `(file, start_line, end_line)`, so
//! re-indexing a file overwrites its rows instead of duplicating them.
//!
//! The service connection is stateless. The version file remains a local
//! signal at the project's index root so watchers on the same machine still
//! see updates.
//!
//! Construction refuses an empty `branch` or `commit_sha`: with payload
//! scoping, an empty component would silently merge tenants, which is a
//! correctness bug rather than a usability nit.

use super::with_retry;
use crate::domain::error::{Error, Result};
use crate::domain::ports::vector_store::{
    CrossScopeStore, ScanFilter, SymbolFilter, VectorStore, SCAN_ALL_LIMIT,
};
use crate::domain::types::{ChunkMetadata, RelevanceTag, SearchResult, TenantScope, VectorRow};
use crate::infrastructure::version::VersionPoller;
use async_trait::async_trait;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::path::Path;
use uuid::Uuid;
use validator::Validate;

/// Points per upsert request.
const UPSERT_BATCH: usize = 256;

/// Page size for scroll reads.
const SCROLL_PAGE: usize = 1024;

/// Remote multi-tenant vector store provider.
#[derive(Debug)]
pub struct RemoteVectorStore {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    collection: String,
    scope: TenantScope,
    dimensions: usize,
    poller: VersionPoller,
}

impl RemoteVectorStore {
    /// Create a handle bound to one tenant scope.
    ///
    /// `index_root` hosts the local version file; `base_url` points at the
    /// vector service.
    pub fn new(
        base_url: &str,
        token: Option<String>,
        scope: TenantScope,
        dimensions: usize,
        index_root: &Path,
    ) -> Result<Self> {
        scope
            .validate()
            .map_err(|e| Error::invalid_argument(format!("remote backend needs a full tenant scope: {e}")))?;

        Ok(Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            collection: format!("cs_{}", scope.org_id),
            scope,
            dimensions,
            poller: VersionPoller::new(index_root),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/collections/{}{path}", self.base_url, self.collection)
    }

    async fn request(&self, method: reqwest::Method, url: String, body: Option<Value>) -> Result<Value> {
        let mut request = self.http.request(method, url);
        if let Some(token) = &self.token {
            request = request.header("api-key", token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await.unwrap_or(Value::Null));
        }
        let text = response.text().await.unwrap_or_default();
        Err(match status.as_u16() {
            404 => Error::not_found(format!("collection {}", self.collection)),
            409 => Error::conflict(text),
            400..=499 => Error::vector_db(format!("{status}: {text}")),
            _ => Error::backend_unavailable(format!("{status}: {text}")),
        })
    }

    /// Deterministic point id from the row identity triple.
    fn point_id(file: &str, start_line: u32, end_line: u32) -> String {
        let digest = Sha256::digest(format!("{file}:{start_line}:{end_line}").as_bytes());
        let bytes: [u8; 16] = digest[..16].try_into().expect("digest length");
        Uuid::from_bytes(bytes).to_string()
    }

    fn scope_filter(&self) -> Value {
        json!({
            "must": [
                {"key": "org_id", "match": {"value": self.scope.org_id}},
                {"key": "repo_id", "match": {"value": self.scope.repo_id}},
                {"key": "branch", "match": {"value": self.scope.branch}},
                {"key": "commit_sha", "match": {"value": self.scope.commit_sha}},
            ]
        })
    }

    fn cross_scope_filter(&self, repo_ids: Option<&[String]>, branch: Option<&str>) -> Value {
        let mut must = vec![json!({"key": "org_id", "match": {"value": self.scope.org_id}})];
        if let Some(repo_ids) = repo_ids {
            must.push(json!({"key": "repo_id", "match": {"any": repo_ids}}));
        }
        if let Some(branch) = branch {
            must.push(json!({"key": "branch", "match": {"value": branch}}));
        }
        json!({"must": must})
    }

    fn file_filter(&self, file: &str) -> Value {
        let mut filter = self.scope_filter();
        filter["must"]
            .as_array_mut()
            .expect("must array")
            .push(json!({"key": "file", "match": {"value": file}}));
        filter
    }

    fn payload_for(metadata: &ChunkMetadata, content: &str) -> Value {
        json!({
            "org_id": metadata.scope.org_id,
            "repo_id": metadata.scope.repo_id,
            "branch": metadata.scope.branch,
            "commit_sha": metadata.scope.commit_sha,
            "file": metadata.file,
            "content": content,
            "metadata": metadata,
        })
    }

    fn row_from_payload(payload: &Value, vector: Option<&Value>) -> Option<(String, ChunkMetadata, Vec<f32>)> {
        let metadata: ChunkMetadata =
            serde_json::from_value(payload.get("metadata")?.clone()).ok()?;
        let content = payload.get("content")?.as_str()?.to_string();
        let vector = vector
            .and_then(|v| v.as_array())
            .map(|values| {
                values
                    .iter()
                    .filter_map(|x| x.as_f64().map(|f| f as f32))
                    .collect()
            })
            .unwrap_or_default();
        Some((content, metadata, vector))
    }

    async fn upsert_points(&self, points: Vec<Value>) -> Result<()> {
        for chunk in points.chunks(UPSERT_BATCH) {
            let body = json!({"points": chunk});
            with_retry("upsert", || {
                self.request(
                    reqwest::Method::PUT,
                    self.url("/points?wait=true"),
                    Some(body.clone()),
                )
            })
            .await?;
        }
        Ok(())
    }

    async fn scroll(&self, filter: Value, limit: usize) -> Result<Vec<VectorRow>> {
        let mut rows = Vec::new();
        let mut offset: Option<Value> = None;
        loop {
            let page = limit.saturating_sub(rows.len()).min(SCROLL_PAGE);
            if page == 0 {
                break;
            }
            let mut body = json!({
                "filter": filter,
                "limit": page,
                "with_payload": true,
                "with_vector": true,
            });
            if let Some(offset) = &offset {
                body["offset"] = offset.clone();
            }
            let response = with_retry("scroll", || {
                self.request(
                    reqwest::Method::POST,
                    self.url("/points/scroll"),
                    Some(body.clone()),
                )
            })
            .await?;

            let result = &response["result"];
            let Some(points) = result["points"].as_array() else {
                break;
            };
            for point in points {
                if let Some((content, metadata, vector)) =
                    Self::row_from_payload(&point["payload"], point.get("vector"))
                {
                    rows.push(VectorRow {
                        content,
                        metadata,
                        vector,
                    });
                }
            }
            match result.get("next_page_offset") {
                Some(next) if !next.is_null() => offset = Some(next.clone()),
                _ => break,
            }
        }
        Ok(rows)
    }

    async fn search_with_filter(
        &self,
        query: &[f32],
        limit: usize,
        filter: Value,
    ) -> Result<Vec<SearchResult>> {
        let body = json!({
            "vector": query,
            "limit": limit,
            "filter": filter,
            "with_payload": true,
        });
        let response = with_retry("search", || {
            self.request(
                reqwest::Method::POST,
                self.url("/points/search"),
                Some(body.clone()),
            )
        })
        .await?;

        let mut results = Vec::new();
        if let Some(hits) = response["result"].as_array() {
            for hit in hits {
                let score = hit["score"].as_f64().unwrap_or(0.0) as f32;
                if let Some((content, metadata, _)) = Self::row_from_payload(&hit["payload"], None)
                {
                    let score = score.clamp(0.0, 1.0);
                    results.push(SearchResult {
                        content,
                        metadata,
                        score,
                        relevance: RelevanceTag::from_score(score),
                    });
                }
            }
        }
        Ok(results)
    }
}

#[async_trait]
impl VectorStore for RemoteVectorStore {
    async fn initialize(&self) -> Result<()> {
        let exists = self
            .request(reqwest::Method::GET, self.url(""), None)
            .await;
        if exists.is_err() {
            let body = json!({
                "vectors": {"size": self.dimensions, "distance": "Cosine"}
            });
            with_retry("create-collection", || {
                self.request(reqwest::Method::PUT, self.url(""), Some(body.clone()))
            })
            .await?;
        }
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
        let points: Vec<Value> = vectors
            .into_iter()
            .zip(metadatas)
            .zip(contents)
            .map(|((vector, metadata), content)| {
                json!({
                    "id": Self::point_id(&metadata.file, metadata.start_line, metadata.end_line),
                    "vector": vector,
                    "payload": Self::payload_for(&metadata, &content),
                })
            })
            .collect();
        self.upsert_points(points).await
    }

    async fn search(&self, query: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        self.search_with_filter(query, limit, self.scope_filter()).await
    }

    async fn scan_with_filter(&self, filter: &ScanFilter) -> Result<Vec<VectorRow>> {
        let limit = filter.limit.unwrap_or(SCAN_ALL_LIMIT);
        let mut remote_filter = self.scope_filter();
        if let Some(file) = &filter.file {
            remote_filter["must"]
                .as_array_mut()
                .expect("must array")
                .push(json!({"key": "file", "match": {"value": file}}));
        }
        let rows = self.scroll(remote_filter, limit).await?;
        // Language and path-pattern clauses filter client-side; the service
        // only indexes the tenant keys.
        Ok(rows
            .into_iter()
            .filter(|row| filter.matches(&row.metadata))
            .collect())
    }

    async fn scan_all(&self, filter: &ScanFilter) -> Result<Vec<VectorRow>> {
        let widened = ScanFilter {
            limit: Some(filter.limit.unwrap_or(SCAN_ALL_LIMIT)),
            ..filter.clone()
        };
        self.scan_with_filter(&widened).await
    }

    async fn query_symbols(&self, filter: &SymbolFilter) -> Result<Vec<VectorRow>> {
        let limit = filter.limit.unwrap_or(SCAN_ALL_LIMIT);
        let rows = self.scroll(self.scope_filter(), SCAN_ALL_LIMIT).await?;
        Ok(rows
            .into_iter()
            .filter(|row| filter.matches(&row.metadata))
            .take(limit)
            .collect())
    }

    async fn delete_by_file(&self, file: &str) -> Result<()> {
        let body = json!({"filter": self.file_filter(file)});
        with_retry("delete-by-file", || {
            self.request(
                reqwest::Method::POST,
                self.url("/points/delete?wait=true"),
                Some(body.clone()),
            )
        })
        .await?;
        Ok(())
    }

    async fn update_file(
        &self,
        file: &str,
        vectors: Vec<Vec<f32>>,
        metadatas: Vec<ChunkMetadata>,
        contents: Vec<String>,
    ) -> Result<()> {
        // Deterministic ids make the upsert overwrite matching rows; the
        // delete clears rows whose line ranges vanished.
        self.delete_by_file(file).await?;
        self.insert_batch(vectors, metadatas, contents).await
    }

    async fn clear(&self) -> Result<()> {
        let body = json!({"filter": self.scope_filter()});
        with_retry("clear", || {
            self.request(
                reqwest::Method::POST,
                self.url("/points/delete?wait=true"),
                Some(body.clone()),
            )
        })
        .await?;
        Ok(())
    }

    async fn has_data(&self) -> Result<bool> {
        let body = json!({
            "filter": self.scope_filter(),
            "limit": 1,
            "with_payload": false,
            "with_vector": false,
        });
        let response = with_retry("has-data", || {
            self.request(
                reqwest::Method::POST,
                self.url("/points/scroll"),
                Some(body.clone()),
            )
        })
        .await?;
        Ok(response["result"]["points"]
            .as_array()
            .is_some_and(|points| !points.is_empty()))
    }

    async fn check_version(&self) -> Result<bool> {
        self.poller.check_changed().await
    }

    async fn reconnect(&self) -> Result<()> {
        // The HTTP connection is stateless; accepting the version counter
        // is all a refresh needs.
        self.poller.accept()
    }

    fn scope(&self) -> &TenantScope {
        &self.scope
    }

    fn backend_name(&self) -> &'static str {
        "remote"
    }
}

#[async_trait]
impl CrossScopeStore for RemoteVectorStore {
    async fn search_across_repos(
        &self,
        query: &[f32],
        limit: usize,
        repo_ids: Option<&[String]>,
        branch: Option<&str>,
    ) -> Result<Vec<SearchResult>> {
        self.search_with_filter(query, limit, self.cross_scope_filter(repo_ids, branch))
            .await
    }

    async fn scan_across_repos(
        &self,
        filter: &ScanFilter,
        repo_ids: Option<&[String]>,
        branch: Option<&str>,
    ) -> Result<Vec<VectorRow>> {
        let limit = filter.limit.unwrap_or(SCAN_ALL_LIMIT);
        let rows = self
            .scroll(self.cross_scope_filter(repo_ids, branch), limit)
            .await?;
        Ok(rows
            .into_iter()
            .filter(|row| filter.matches(&row.metadata))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn full_scope() -> TenantScope {
        TenantScope {
            org_id: "acme".into(),
            repo_id: "api".into(),
            branch: "main".into(),
            commit_sha: "abc123".into(),
        }
    }

    #[test]
    fn empty_branch_is_refused() {
        let dir = TempDir::new().unwrap();
        let mut scope = full_scope();
        scope.branch = String::new();
        let err = RemoteVectorStore::new("http://localhost:6333", None, scope, 384, dir.path())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[test]
    fn empty_commit_is_refused() {
        let dir = TempDir::new().unwrap();
        let mut scope = full_scope();
        scope.commit_sha = String::new();
        assert!(
            RemoteVectorStore::new("http://localhost:6333", None, scope, 384, dir.path()).is_err()
        );
    }

    #[test]
    fn point_ids_are_deterministic_digests() {
        let a = RemoteVectorStore::point_id("src/a.ts", 1, 10);
        let b = RemoteVectorStore::point_id("src/a.ts", 1, 10);
        let c = RemoteVectorStore::point_id("src/a.ts", 1, 11);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn scope_filter_carries_full_quadruple() {
        let dir = TempDir::new().unwrap();
        let store =
            RemoteVectorStore::new("http://localhost:6333", None, full_scope(), 384, dir.path())
                .unwrap();
        let filter = store.scope_filter();
        let keys: Vec<&str> = filter["must"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["key"].as_str().unwrap())
            .collect();
        assert_eq!(keys, vec!["org_id", "repo_id", "branch", "commit_sha"]);
    }

    #[test]
    fn cross_scope_filter_relaxes_to_org() {
        let dir = TempDir::new().unwrap();
        let store =
            RemoteVectorStore::new("http://localhost:6333", None, full_scope(), 384, dir.path())
                .unwrap();
        let filter = store.cross_scope_filter(None, None);
        assert_eq!(filter["must"].as_array().unwrap().len(), 1);

        let repos = vec!["api".to_string(), "web".to_string()];
        let filter = store.cross_scope_filter(Some(&repos), Some("main"));
        assert_eq!(filter["must"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn collection_is_org_scoped() {
        let dir = TempDir::new().unwrap();
        let store =
            RemoteVectorStore::new("http://localhost:6333/", None, full_scope(), 384, dir.path())
                .unwrap();
        assert_eq!(store.collection, "cs_acme");
        assert_eq!(store.url("/points"), "http://localhost:6333/collections/cs_acme/points");
    }
}
