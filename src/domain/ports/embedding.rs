use crate::domain::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Shared handle to an embedding provider.
pub type SharedEmbeddingProvider = Arc<dyn EmbeddingProvider>;

/// Contract for providers that transform text into semantic embeddings.
///
/// Output vectors are L2-normalized so cosine similarity reduces to an inner
/// product. Within one `embed_batch` call the output order is the input
/// order; callers must not assume ordering across calls. Implementations are
/// thread-safe; expensive initialization is paid once per orchestration run
/// by the owner of the handle.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts, one unit-normalized vector per input.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Fixed output dimension (recognized values: 384, 768).
    fn dimensions(&self) -> usize;

    /// Model identifier used for cache keying.
    fn model_name(&self) -> &str;

    /// Health check for the provider (default implementation provided)
    async fn health_check(&self) -> Result<()> {
        self.embed_batch(&["health check".to_string()]).await?;
        Ok(())
    }
}
