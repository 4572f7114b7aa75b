//! Deterministic hash-projection embedding provider
//!
//! Produces stable bag-of-tokens embeddings with no model runtime: each
//! token hashes to a dimension and a signed weight. Used in tests and in
//! offline runs where semantic quality does not matter but the pipeline
//! contracts (unit norm, determinism, fixed dimension) do.

use super::normalize;
use crate::domain::error::{Error, Result};
use crate::domain::ports::EmbeddingProvider;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

/// Deterministic embedding provider backed by token hashing.
pub struct HashEmbeddingProvider {
    dimensions: usize,
    model_name: String,
}

impl HashEmbeddingProvider {
    /// Create a provider with the given output dimension (384 or 768).
    pub fn new(dimensions: usize) -> Result<Self> {
        if !crate::infrastructure::config::SUPPORTED_DIMENSIONS.contains(&dimensions) {
            return Err(Error::embedding(format!(
                "unsupported dimension {dimensions}"
            )));
        }
        Ok(Self {
            dimensions,
            model_name: format!("hash-bag-{dimensions}"),
        })
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        let tokens: Vec<&str> = text
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|t| !t.is_empty())
            .collect();

        // Unigrams plus adjacent bigrams give crude locality: files sharing
        // token sequences land near each other.
        for window in tokens.windows(1).chain(tokens.windows(2)) {
            let joined = window.join(" ");
            let digest = Sha256::digest(joined.as_bytes());
            let seed = u64::from_le_bytes(digest[..8].try_into().expect("digest length"));
            let index = (seed % self.dimensions as u64) as usize;
            let sign = if (seed >> 63) == 0 { 1.0 } else { -1.0 };
            vector[index] += sign;
        }

        normalize(&mut vector);
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    #[tokio::test]
    async fn vectors_are_unit_normalized() {
        let provider = HashEmbeddingProvider::new(384).unwrap();
        let vectors = provider
            .embed_batch(&["fn add(a, b) { a + b }".to_string(), "".to_string()])
            .await
            .unwrap();
        for vector in &vectors {
            assert_eq!(vector.len(), 384);
            let n = norm(vector);
            assert!((0.99..=1.01).contains(&n), "norm {n} out of contract");
        }
    }

    #[tokio::test]
    async fn identical_text_gives_identical_vectors() {
        let provider = HashEmbeddingProvider::new(384).unwrap();
        let a = provider.embed_batch(&["same text".to_string()]).await.unwrap();
        let b = provider.embed_batch(&["same text".to_string()]).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn different_text_differs() {
        let provider = HashEmbeddingProvider::new(384).unwrap();
        let out = provider
            .embed_batch(&["alpha beta gamma".to_string(), "delta epsilon zeta".to_string()])
            .await
            .unwrap();
        let dot: f32 = out[0].iter().zip(&out[1]).map(|(a, b)| a * b).sum();
        assert!(dot < 0.9, "unrelated texts should not be near-identical: {dot}");
    }

    #[test]
    fn unsupported_dimension_rejected() {
        assert!(HashEmbeddingProvider::new(100).is_err());
        assert!(HashEmbeddingProvider::new(768).is_ok());
    }
}
