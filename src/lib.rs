//! Codescope - semantic code indexing and analysis engine
//!
//! Codescope indexes a source repository into a queryable vector store and
//! exposes derived analyses on top of it: incremental indexing with change
//! detection, complexity and duplicate analysis, and dependency graph
//! construction.
//!
//! ## Layers
//!
//! | Layer | Contents |
//! |-------|----------|
//! | [`domain`] | Core types, errors, ports (traits), AST chunking |
//! | [`adapters`] | Concrete embedding and vector store providers |
//! | [`infrastructure`] | Manifest, version file, git, watcher, caches |
//! | [`application`] | Indexing orchestration and read-only analyzers |

pub mod adapters;
pub mod application;
pub mod cli;
pub mod domain;
pub mod factory;
pub mod infrastructure;

// Re-export core types for public API
pub use domain::error::{Error, Result};
pub use domain::types::*;

// Re-export main entry points
pub use application::indexing::{Indexer, IndexingOptions};
