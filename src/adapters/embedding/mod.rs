//! Embedding provider implementations

#[cfg(feature = "fastembed-provider")]
pub mod fastembed;
pub mod null;

#[cfg(feature = "fastembed-provider")]
pub use fastembed::FastEmbedProvider;
pub use null::HashEmbeddingProvider;

/// Normalize a vector to unit L2 length in place. Zero vectors become a
/// unit basis vector so the normalization contract holds for empty input.
pub(crate) fn normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    } else if let Some(first) = vector.first_mut() {
        *first = 1.0;
    }
}
