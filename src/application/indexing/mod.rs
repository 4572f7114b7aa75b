//! Indexing pipeline: discovery, change detection, orchestration.

pub mod change_detection;
pub mod discovery;
pub mod orchestrator;
pub mod progress;
pub mod watch_service;

pub use change_detection::{ChangeDetector, ChangeReason, ChangeSet};
pub use discovery::{Scanner, ScannerOptions};
pub use orchestrator::{Indexer, IndexingOptions};
pub use progress::{Phase, ProgressCallback, ProgressEvent};
pub use watch_service::WatchService;
