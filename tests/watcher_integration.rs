//! File watcher integration: real notify events through the batching loop.
//!
//! Timing-tolerant: batches are awaited with generous polling deadlines so
//! slow CI filesystems do not flake.

use codescope::infrastructure::watcher::{
    BatchHandler, FileWatcher, WatchBatch, WatcherOptions,
};
use serial_test::serial;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

fn collecting_handler() -> (BatchHandler, Arc<Mutex<Vec<WatchBatch>>>) {
    let seen: Arc<Mutex<Vec<WatchBatch>>> = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    let handler: BatchHandler = Arc::new(move |batch| {
        let seen = seen_clone.clone();
        Box::pin(async move {
            seen.lock().unwrap().push(batch);
        })
    });
    (handler, seen)
}

async fn wait_for<F: Fn() -> bool>(what: &str, condition: F) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("timed out waiting for {what}");
}

fn options() -> WatcherOptions {
    WatcherOptions {
        batch_window_ms: 200,
        max_batch_wait_ms: 2000,
        git_debounce_ms: 200,
        watch_git: false,
    }
}

#[tokio::test]
#[serial]
async fn created_files_arrive_in_one_batch() {
    let dir = TempDir::new().unwrap();
    let (handler, seen) = collecting_handler();

    let mut watcher = FileWatcher::new(dir.path(), options(), None);
    watcher.start(handler, None).unwrap();
    // Give the backend a beat to arm.
    tokio::time::sleep(Duration::from_millis(300)).await;

    std::fs::write(dir.path().join("one.ts"), "export const one = 1;").unwrap();
    std::fs::write(dir.path().join("two.ts"), "export const two = 2;").unwrap();

    wait_for("creation batch", || !seen.lock().unwrap().is_empty()).await;
    watcher.stop().await;

    let batches = seen.lock().unwrap();
    let mut touched: Vec<String> = batches
        .iter()
        .flat_map(|b| b.added.iter().chain(b.modified.iter()))
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
        .collect();
    touched.sort();
    touched.dedup();
    assert!(touched.contains(&"one.ts".to_string()), "saw {touched:?}");
    assert!(touched.contains(&"two.ts".to_string()), "saw {touched:?}");
    // Paths are absolute.
    for batch in batches.iter() {
        for path in batch.added.iter().chain(batch.modified.iter()) {
            assert!(path.is_absolute());
        }
    }
}

#[tokio::test]
#[serial]
async fn deletions_are_reported_as_deleted() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("gone.ts");
    std::fs::write(&target, "export const x = 1;").unwrap();

    let (handler, seen) = collecting_handler();
    let mut watcher = FileWatcher::new(dir.path(), options(), None);
    watcher.start(handler, None).unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    std::fs::remove_file(&target).unwrap();

    wait_for("deletion batch", || {
        seen.lock()
            .unwrap()
            .iter()
            .any(|b| b.deleted.iter().any(|p| p.ends_with("gone.ts")))
    })
    .await;
    watcher.stop().await;
}

#[tokio::test]
#[serial]
async fn filter_drops_uninteresting_paths() {
    let dir = TempDir::new().unwrap();
    let (handler, seen) = collecting_handler();

    let filter = Arc::new(|path: &Path| {
        path.extension().and_then(|e| e.to_str()) == Some("ts")
    });
    let mut watcher = FileWatcher::new(dir.path(), options(), Some(filter));
    watcher.start(handler, None).unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    std::fs::write(dir.path().join("keep.ts"), "export const k = 1;").unwrap();
    std::fs::write(dir.path().join("skip.log"), "noise").unwrap();

    wait_for("filtered batch", || !seen.lock().unwrap().is_empty()).await;
    // Allow any trailing events to land before asserting absence.
    tokio::time::sleep(Duration::from_millis(500)).await;
    watcher.stop().await;

    let batches = seen.lock().unwrap();
    let names: Vec<String> = batches
        .iter()
        .flat_map(|b| b.added.iter().chain(b.modified.iter()))
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
        .collect();
    assert!(names.contains(&"keep.ts".to_string()));
    assert!(!names.contains(&"skip.log".to_string()), "saw {names:?}");
}

#[tokio::test]
#[serial]
async fn stop_flushes_pending_events_exactly_once() {
    let dir = TempDir::new().unwrap();
    let (handler, seen) = collecting_handler();

    // A very long window: the only way the event gets out is the stop flush.
    let mut watcher = FileWatcher::new(
        dir.path(),
        WatcherOptions {
            batch_window_ms: 60_000,
            max_batch_wait_ms: 120_000,
            ..options()
        },
        None,
    );
    watcher.start(handler, None).unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    std::fs::write(dir.path().join("pending.ts"), "export const p = 1;").unwrap();
    // Wait for the event to reach the loop's pending map.
    tokio::time::sleep(Duration::from_millis(800)).await;

    watcher.stop().await;
    let batches = seen.lock().unwrap();
    let count = batches
        .iter()
        .flat_map(|b| b.added.iter().chain(b.modified.iter()))
        .filter(|p| p.ends_with("pending.ts"))
        .count();
    assert_eq!(count, 1, "pending event must flush exactly once: {batches:?}");
}
