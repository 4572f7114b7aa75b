//! Monotonic version file
//!
//! A single small file at the index root containing a strictly monotonic
//! integer. The orchestrator bumps it after each successful index commit;
//! hot consumers cache the last-seen value and poll to detect "the store
//! has changed since I loaded it". Writes go through a sibling-then-rename
//! so readers never observe a half-written integer.

use crate::domain::error::{Error, Result};
use crate::infrastructure::manifest::now_millis;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

/// Name of the version file inside the index root.
pub const VERSION_FILE: &str = "version";

/// Minimum interval between real reads when polling.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Writer/reader for the version counter.
#[derive(Debug, Clone)]
pub struct VersionFile {
    path: PathBuf,
}

impl VersionFile {
    /// Bind to the version file inside `index_root`.
    pub fn new(index_root: &Path) -> Self {
        Self {
            path: index_root.join(VERSION_FILE),
        }
    }

    /// Current counter value; 0 when the file does not exist yet.
    pub fn read(&self) -> Result<u64> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => text
                .trim()
                .parse::<u64>()
                .map_err(|e| Error::internal(format!("malformed version file: {e}"))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(err) => Err(err.into()),
        }
    }

    /// Advance the counter and persist it atomically.
    ///
    /// Wall-clock millis are used when they move the counter forward,
    /// otherwise `previous + 1`, so the value is strictly monotonic even
    /// under clock skew.
    pub fn bump(&self) -> Result<u64> {
        let previous = self.read().unwrap_or(0);
        let next = now_millis().max(previous + 1);
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, next.to_string())?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(next)
    }
}

/// Cached reader with a 1 Hz rate limit on real file reads.
#[derive(Debug)]
pub struct VersionPoller {
    file: VersionFile,
    cached: AtomicU64,
    last_read: Mutex<Option<Instant>>,
}

impl VersionPoller {
    /// Bind a poller to the version file inside `index_root`.
    pub fn new(index_root: &Path) -> Self {
        Self {
            file: VersionFile::new(index_root),
            cached: AtomicU64::new(0),
            last_read: Mutex::new(None),
        }
    }

    /// Remember the current on-disk value as the baseline.
    pub fn prime(&self) -> Result<()> {
        let value = self.file.read()?;
        self.cached.store(value, Ordering::SeqCst);
        Ok(())
    }

    /// True when the on-disk counter advanced past the cached value.
    ///
    /// Real reads happen at most once per [`POLL_INTERVAL`]; calls inside
    /// the window report "unchanged" from cache.
    pub async fn check_changed(&self) -> Result<bool> {
        {
            let mut last = self.last_read.lock().await;
            match *last {
                Some(at) if at.elapsed() < POLL_INTERVAL => return Ok(false),
                _ => *last = Some(Instant::now()),
            }
        }
        let on_disk = self.file.read()?;
        let cached = self.cached.load(Ordering::SeqCst);
        Ok(on_disk > cached)
    }

    /// Accept the current on-disk value (after a reload).
    pub fn accept(&self) -> Result<()> {
        self.prime()
    }

    /// Last value this poller accepted.
    pub fn cached(&self) -> u64 {
        self.cached.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_reads_zero() {
        let dir = TempDir::new().unwrap();
        assert_eq!(VersionFile::new(dir.path()).read().unwrap(), 0);
    }

    #[test]
    fn bump_is_strictly_monotonic() {
        let dir = TempDir::new().unwrap();
        let file = VersionFile::new(dir.path());
        let mut previous = 0;
        for _ in 0..5 {
            let next = file.bump().unwrap();
            assert!(next > previous, "{next} must exceed {previous}");
            previous = next;
        }
        assert_eq!(file.read().unwrap(), previous);
    }

    #[test]
    fn bump_survives_clock_going_backwards() {
        let dir = TempDir::new().unwrap();
        let file = VersionFile::new(dir.path());
        // Seed a counter far in the future; the next bump must still advance.
        std::fs::write(dir.path().join(VERSION_FILE), u64::MAX.saturating_sub(10).to_string())
            .unwrap();
        let next = file.bump().unwrap();
        assert_eq!(next, u64::MAX - 9);
    }

    #[tokio::test]
    async fn poller_detects_change_after_interval() {
        let dir = TempDir::new().unwrap();
        let file = VersionFile::new(dir.path());
        file.bump().unwrap();

        let poller = VersionPoller::new(dir.path());
        poller.prime().unwrap();
        file.bump().unwrap();

        // First call performs a real read.
        assert!(poller.check_changed().await.unwrap());
        // Second call inside the rate window reads from cache.
        assert!(!poller.check_changed().await.unwrap());

        poller.accept().unwrap();
        assert!(poller.cached() > 0);
    }
}
