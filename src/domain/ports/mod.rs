//! Domain Port Interfaces
//!
//! Boundary contracts between the domain and external layers. Ports are
//! trait-based abstractions so implementations can be swapped at runtime.
//!
//! - **embedding.rs** - Text embedding providers
//! - **vector_store.rs** - Vector storage backends and scan filters

/// AI embedding provider interfaces
pub mod embedding;
/// Vector storage backend interfaces
pub mod vector_store;

pub use embedding::{EmbeddingProvider, SharedEmbeddingProvider};
pub use vector_store::{
    CrossScopeStore, ScanFilter, SharedVectorStore, SymbolFilter, VectorStore,
};
