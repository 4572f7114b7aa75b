//! Adapters layer: concrete implementations of the domain ports.

pub mod embedding;
pub mod vector_store;
