//! FastEmbed local embedding provider
//!
//! Runs embedding models in-process via ONNX, so no external service is
//! required. Model initialization (download + session setup) is expensive
//! and happens once in `new`; the orchestrator owns the handle for the
//! whole run. Inference is CPU-bound and dispatched to the blocking pool.

use super::normalize;
use crate::domain::error::{Error, Result};
use crate::domain::ports::EmbeddingProvider;
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::Arc;

/// Local embedding provider backed by fastembed.
pub struct FastEmbedProvider {
    model: Arc<std::sync::Mutex<TextEmbedding>>,
    model_name: String,
    dimensions: usize,
}

impl FastEmbedProvider {
    /// Initialize the model named in the config. Recognized models map to
    /// the 384/768-dimension families; unknown names fall back to
    /// BGE-small (384).
    pub fn new(model_name: &str, dimensions: usize) -> Result<Self> {
        let model_kind = match (model_name, dimensions) {
            ("BAAI/bge-base-en-v1.5", _) | (_, 768) => EmbeddingModel::BGEBaseENV15,
            _ => EmbeddingModel::BGESmallENV15,
        };
        let dimensions = match model_kind {
            EmbeddingModel::BGEBaseENV15 => 768,
            _ => 384,
        };

        let model = TextEmbedding::try_new(
            InitOptions::new(model_kind).with_show_download_progress(false),
        )
        .map_err(|e| Error::embedding(format!("fastembed init failed: {e}")))?;

        Ok(Self {
            model: Arc::new(std::sync::Mutex::new(model)),
            model_name: model_name.to_string(),
            dimensions,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let model = self.model.clone();
        let inputs: Vec<String> = texts.to_vec();
        let mut vectors = tokio::task::spawn_blocking(move || {
            let mut model = model.lock().expect("embedding model lock");
            model.embed(inputs, None)
        })
        .await
        .map_err(|e| Error::embedding(format!("embedding task failed: {e}")))?
        .map_err(|e| Error::embedding(format!("fastembed inference failed: {e}")))?;

        for vector in &mut vectors {
            normalize(vector);
        }
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
