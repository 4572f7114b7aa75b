//! Component wiring
//!
//! Builds the embedding provider, vector store, manifest and cache for a
//! project from the global configuration. This is the only place concrete
//! adapter types are chosen; everything downstream works through the port
//! traits.

use crate::adapters::embedding::HashEmbeddingProvider;
use crate::adapters::vector_store::{EmbeddedVectorStore, RemoteVectorStore};
use crate::domain::chunking::ChunkingOptions;
use crate::domain::error::{Error, Result};
use crate::domain::ports::{SharedEmbeddingProvider, SharedVectorStore};
use crate::domain::types::TenantScope;
use crate::infrastructure::config::{index_root_for, GlobalConfig};
use crate::infrastructure::embedding_cache::{EmbeddingCache, EmbeddingCacheConfig};
use crate::infrastructure::git::GitContext;
use crate::infrastructure::manifest::ManifestManager;
use crate::application::indexing::Indexer;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Everything wired for one project.
pub struct ProjectContext {
    /// Loaded configuration
    pub config: GlobalConfig,
    /// Project root
    pub project_root: PathBuf,
    /// Index root under the tool home
    pub index_root: PathBuf,
    /// Tenant scope stamped onto rows
    pub scope: TenantScope,
    /// Vector store handle
    pub store: SharedVectorStore,
    /// Embedding provider handle
    pub embedder: SharedEmbeddingProvider,
    /// Manifest manager
    pub manifest: Arc<ManifestManager>,
    /// Persistent embedding cache (optional by construction failure)
    pub cache: Option<Arc<EmbeddingCache>>,
}

impl ProjectContext {
    /// Wire all components for a project root.
    pub async fn build(config: GlobalConfig, project_root: &Path) -> Result<Self> {
        let index_root = index_root_for(project_root);
        std::fs::create_dir_all(&index_root)?;

        let scope = resolve_scope(&config, project_root).await;
        let embedder = build_embedder(&config)?;
        let store = build_store(&config, &index_root, scope.clone())?;
        let manifest = Arc::new(ManifestManager::new(&index_root));

        // The cache is an optimization; failure to open it degrades to
        // recomputed embeddings rather than failing the run.
        let cache = match EmbeddingCache::open(EmbeddingCacheConfig::at_index_root(
            &index_root,
            embedder.model_name(),
        )) {
            Ok(cache) => Some(Arc::new(cache)),
            Err(err) => {
                tracing::warn!(error = %err, "embedding cache unavailable, continuing without");
                None
            }
        };

        Ok(Self {
            config,
            project_root: project_root.to_path_buf(),
            index_root,
            scope,
            store,
            embedder,
            manifest,
            cache,
        })
    }

    /// Build the indexing orchestrator over this context.
    pub fn indexer(&self) -> Indexer {
        Indexer::new(
            self.store.clone(),
            self.embedder.clone(),
            self.cache.clone(),
            self.manifest.clone(),
            &self.index_root,
            self.scope.clone(),
            self.config.indexing.clone(),
            ChunkingOptions::default(),
        )
    }
}

/// Scope resolution: stable locals for the embedded backend; git-derived
/// identity (with non-empty local fallbacks) for the remote backend.
async fn resolve_scope(config: &GlobalConfig, project_root: &Path) -> TenantScope {
    let mut scope = TenantScope::local_for(project_root);
    if config.store.backend == "remote" {
        if let Some(org_id) = &config.store.org_id {
            if !org_id.is_empty() {
                scope.org_id = org_id.clone();
            }
        }
        let git = GitContext::new(project_root);
        if git.is_repo().await {
            if let (Ok(branch), Ok(commit)) = (git.branch().await, git.head_commit().await) {
                scope.branch = branch;
                scope.commit_sha = commit;
            }
        }
    }
    scope
}

fn build_embedder(config: &GlobalConfig) -> Result<SharedEmbeddingProvider> {
    match config.embedding.provider.as_str() {
        "hash" => Ok(Arc::new(HashEmbeddingProvider::new(
            config.embedding.dimensions,
        )?)),
        #[cfg(feature = "fastembed-provider")]
        "fastembed" => Ok(Arc::new(
            crate::adapters::embedding::FastEmbedProvider::new(
                &config.embedding.model,
                config.embedding.dimensions,
            )?,
        )),
        #[cfg(not(feature = "fastembed-provider"))]
        "fastembed" => Err(Error::config(
            "fastembed support not compiled in; set embedding.provider = \"hash\" or rebuild with the fastembed-provider feature",
        )),
        other => Err(Error::config(format!(
            "unknown embedding provider {other:?} (expected \"fastembed\" or \"hash\")"
        ))),
    }
}

fn build_store(
    config: &GlobalConfig,
    index_root: &Path,
    scope: TenantScope,
) -> Result<SharedVectorStore> {
    match config.store.backend.as_str() {
        "embedded" => Ok(Arc::new(EmbeddedVectorStore::new(
            index_root,
            scope,
            config.embedding.dimensions,
        ))),
        "remote" => {
            let url = config
                .store
                .remote_url
                .as_deref()
                .ok_or_else(|| Error::config("remote backend requires store.remote_url"))?;
            Ok(Arc::new(RemoteVectorStore::new(
                url,
                config.store.remote_token.clone(),
                scope,
                config.embedding.dimensions,
                index_root,
            )?))
        }
        other => Err(Error::config(format!(
            "unknown store backend {other:?} (expected \"embedded\" or \"remote\")"
        ))),
    }
}
