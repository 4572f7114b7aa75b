//! Filesystem watcher with adaptive batching
//!
//! Subscribes to file events under the project root, coalesces rapid event
//! streams per path (latest event wins, so an editor's atomic-save
//! `unlink -> add` surfaces as `add`), and emits batches to an async
//! handler:
//!
//! - the first event opens a batch window;
//! - each later event re-arms the window timer up to `batch_window_ms`
//!   after the last event, but never past `max_batch_wait_ms` from the
//!   first;
//! - while the handler runs, new events accumulate without arming a new
//!   timer; the next window starts when the handler returns.
//!
//! Git watching is an opt-in overlay: changes under `.git` (`HEAD`,
//! `index`, `refs/**`, merge/rebase heads) are routed to a separate
//! debounced callback and never appear in file batches. Internal errors go
//! to stderr via `tracing` (stdout may be a protocol channel) and the
//! watcher keeps running.

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Duration, Instant};

use crate::domain::error::{Error, Result};

/// Watcher tuning knobs.
#[derive(Debug, Clone)]
pub struct WatcherOptions {
    /// Quiet period after the last event before a flush
    pub batch_window_ms: u64,
    /// Hard cap from the first event of a batch to its flush
    pub max_batch_wait_ms: u64,
    /// Debounce for the git overlay callback
    pub git_debounce_ms: u64,
    /// Whether `.git` changes are observed at all
    pub watch_git: bool,
}

impl Default for WatcherOptions {
    fn default() -> Self {
        Self {
            batch_window_ms: 500,
            max_batch_wait_ms: 5000,
            git_debounce_ms: 1000,
            watch_git: false,
        }
    }
}

/// Coalesced event type per path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    /// File created
    Add,
    /// File content changed
    Change,
    /// File removed
    Unlink,
}

/// One flushed batch of coalesced changes (absolute paths).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchBatch {
    /// Created files
    pub added: Vec<PathBuf>,
    /// Modified files
    pub modified: Vec<PathBuf>,
    /// Removed files
    pub deleted: Vec<PathBuf>,
}

impl WatchBatch {
    /// True when nothing was collected.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }
}

/// Async batch handler.
pub type BatchHandler =
    Arc<dyn Fn(WatchBatch) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Debounced git-change callback.
pub type GitHandler = Arc<dyn Fn() + Send + Sync>;

/// Path filter; return false to drop an event.
pub type PathFilter = Arc<dyn Fn(&Path) -> bool + Send + Sync>;

/// Relevant paths inside `.git` for the overlay.
fn is_git_signal(relative: &Path) -> bool {
    let mut components = relative.components().map(|c| c.as_os_str().to_string_lossy());
    match components.next().as_deref() {
        Some("HEAD") | Some("index") | Some("MERGE_HEAD") | Some("REBASE_HEAD")
        | Some("CHERRY_PICK_HEAD") | Some("ORIG_HEAD") => true,
        Some("refs") => true,
        _ => false,
    }
}

enum LoopMessage {
    File(PathBuf, WatchEventKind),
    Git,
}

/// Filesystem watcher feeding incremental re-index.
pub struct FileWatcher {
    root: PathBuf,
    options: WatcherOptions,
    filter: Option<PathFilter>,
    watcher: Option<RecommendedWatcher>,
    task: Option<JoinHandle<()>>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl FileWatcher {
    /// Create a watcher for a project root. Events not passing `filter`
    /// are dropped at intake.
    pub fn new(root: &Path, options: WatcherOptions, filter: Option<PathFilter>) -> Self {
        Self {
            root: root.to_path_buf(),
            options,
            filter,
            watcher: None,
            task: None,
            shutdown: None,
        }
    }

    /// Start observing. Panics if called twice without `stop()`.
    pub fn start(&mut self, handler: BatchHandler, git_handler: Option<GitHandler>) -> Result<()> {
        assert!(self.task.is_none(), "watcher already started");

        let (tx, rx) = mpsc::unbounded_channel::<LoopMessage>();
        let root = self.root.clone();
        let options = self.options.clone();
        let filter = self.filter.clone();

        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            let event = match result {
                Ok(event) => event,
                Err(err) => {
                    tracing::error!(error = %err, "watch backend error");
                    return;
                }
            };
            for path in &event.paths {
                if let Some(message) = classify(&root, &options, filter.as_ref(), path, &event.kind)
                {
                    let _ = tx.send(message);
                }
            }
        })
        .map_err(|e| Error::watcher(format!("create watcher: {e}")))?;

        watcher
            .watch(&self.root, RecursiveMode::Recursive)
            .map_err(|e| Error::watcher(format!("watch {}: {e}", self.root.display())))?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let options = self.options.clone();
        let task = tokio::spawn(batch_loop(rx, shutdown_rx, options, handler, git_handler));

        self.watcher = Some(watcher);
        self.task = Some(task);
        self.shutdown = Some(shutdown_tx);
        Ok(())
    }

    /// Stop observing: close intake, await the in-progress batch, flush any
    /// pending events exactly once.
    pub async fn stop(&mut self) {
        // Dropping the notify watcher closes the event source, so nothing
        // new can be queued while we drain.
        self.watcher.take();
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                tracing::error!(error = %err, "watch loop join failed");
            }
        }
    }
}

fn classify(
    root: &Path,
    options: &WatcherOptions,
    filter: Option<&PathFilter>,
    path: &Path,
    kind: &EventKind,
) -> Option<LoopMessage> {
    let relative = path.strip_prefix(root).unwrap_or(path);

    // Git overlay: `.git` paths never enter file batches.
    if let Ok(inside_git) = relative.strip_prefix(".git") {
        if options.watch_git && is_git_signal(inside_git) {
            return Some(LoopMessage::Git);
        }
        return None;
    }

    if path.is_dir() {
        return None;
    }
    if let Some(filter) = filter {
        if !filter(path) {
            return None;
        }
    }

    let event_kind = match kind {
        EventKind::Create(_) => WatchEventKind::Add,
        EventKind::Modify(notify::event::ModifyKind::Name(_)) => {
            // Rename arm: the surviving side exists, the old side doesn't.
            if path.exists() {
                WatchEventKind::Add
            } else {
                WatchEventKind::Unlink
            }
        }
        EventKind::Modify(_) => WatchEventKind::Change,
        EventKind::Remove(_) => WatchEventKind::Unlink,
        _ => return None,
    };
    Some(LoopMessage::File(path.to_path_buf(), event_kind))
}

struct WindowState {
    first_event: Instant,
    last_event: Instant,
}

async fn batch_loop(
    mut rx: mpsc::UnboundedReceiver<LoopMessage>,
    mut shutdown: oneshot::Receiver<()>,
    options: WatcherOptions,
    handler: BatchHandler,
    git_handler: Option<GitHandler>,
) {
    let window = Duration::from_millis(options.batch_window_ms);
    let max_wait = Duration::from_millis(options.max_batch_wait_ms);
    let git_debounce = Duration::from_millis(options.git_debounce_ms);

    let mut pending: HashMap<PathBuf, WatchEventKind> = HashMap::new();
    let mut state: Option<WindowState> = None;
    let mut git_deadline: Option<Instant> = None;

    loop {
        let batch_deadline = state
            .as_ref()
            .map(|s| (s.last_event + window).min(s.first_event + max_wait));
        let deadline = match (batch_deadline, git_deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        };

        tokio::select! {
            _ = &mut shutdown => {
                drain(&mut rx, &mut pending);
                flush(&handler, &mut pending).await;
                return;
            }
            message = rx.recv() => {
                match message {
                    Some(LoopMessage::File(path, kind)) => {
                        let now = Instant::now();
                        pending.insert(path, kind);
                        match &mut state {
                            Some(s) => s.last_event = now,
                            None => state = Some(WindowState { first_event: now, last_event: now }),
                        }
                    }
                    Some(LoopMessage::Git) => {
                        git_deadline = Some(Instant::now() + git_debounce);
                    }
                    None => {
                        flush(&handler, &mut pending).await;
                        return;
                    }
                }
            }
            _ = async { sleep_until(deadline.expect("guarded")).await }, if deadline.is_some() => {
                let now = Instant::now();
                if git_deadline.is_some_and(|d| d <= now) {
                    git_deadline = None;
                    if let Some(git_handler) = &git_handler {
                        git_handler();
                    }
                }
                if batch_deadline.is_some_and(|d| d <= now) {
                    state = None;
                    flush(&handler, &mut pending).await;
                    // Events that arrived during the handler run open the
                    // next window only once the handler has returned.
                    if drain(&mut rx, &mut pending) {
                        let now = Instant::now();
                        state = Some(WindowState { first_event: now, last_event: now });
                    }
                }
            }
        }
    }
}

/// Non-blocking drain of queued messages into the pending map.
fn drain(rx: &mut mpsc::UnboundedReceiver<LoopMessage>, pending: &mut HashMap<PathBuf, WatchEventKind>) -> bool {
    let mut any = false;
    while let Ok(message) = rx.try_recv() {
        if let LoopMessage::File(path, kind) = message {
            pending.insert(path, kind);
            any = true;
        }
    }
    any
}

async fn flush(handler: &BatchHandler, pending: &mut HashMap<PathBuf, WatchEventKind>) {
    if pending.is_empty() {
        return;
    }
    let mut batch = WatchBatch::default();
    for (path, kind) in pending.drain() {
        match kind {
            WatchEventKind::Add => batch.added.push(path),
            WatchEventKind::Change => batch.modified.push(path),
            WatchEventKind::Unlink => batch.deleted.push(path),
        }
    }
    batch.added.sort();
    batch.modified.sort();
    batch.deleted.sort();
    handler(batch).await;
}
