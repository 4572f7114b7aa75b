//! Progress events emitted by the orchestrator.

use std::sync::Arc;

/// Pipeline phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Store and embedder setup
    Initializing,
    /// Repository scan and change detection
    Scanning,
    /// Embedding computation
    Embedding,
    /// Store writes
    Indexing,
    /// Manifest and version commit
    Saving,
    /// Run finished
    Complete,
}

/// One progress report.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ProgressEvent {
    /// Current phase
    pub phase: Phase,
    /// Human-readable status line
    pub message: String,
    /// Total files in the work set, when known
    pub files_total: Option<u32>,
    /// Files completed so far
    pub files_processed: Option<u32>,
    /// Chunks written so far
    pub chunks_processed: Option<u32>,
}

impl ProgressEvent {
    /// Phase-only event with a message.
    pub fn phase(phase: Phase, message: impl Into<String>) -> Self {
        Self {
            phase,
            message: message.into(),
            files_total: None,
            files_processed: None,
            chunks_processed: None,
        }
    }
}

/// Progress callback handed to the orchestrator.
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;
