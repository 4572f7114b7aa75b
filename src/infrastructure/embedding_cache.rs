//! Persistent embedding cache
//!
//! Memoizes `(model_name, content_hash) -> vector` across runs so unchanged
//! chunks never hit the embedding model again. Entries live in hex-sharded
//! JSON files under the cache directory; eviction is approximate LRU by
//! entry count. The cache is optional: the orchestrator works without it at
//! the cost of recomputed embeddings.

use crate::domain::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use walkdir::WalkDir;

/// Directory name inside the index root.
pub const CACHE_DIR: &str = "embedding-cache";

/// Default entry cap.
pub const DEFAULT_MAX_ENTRIES: usize = 50_000;

/// Fraction of entries dropped per eviction pass.
const EVICTION_FRACTION: usize = 10;

/// Cache configuration.
#[derive(Debug, Clone)]
pub struct EmbeddingCacheConfig {
    /// Directory holding the shard files
    pub cache_path: PathBuf,
    /// Approximate LRU cap by entry count
    pub max_entries: usize,
    /// Model the cached vectors belong to
    pub model_name: String,
}

impl EmbeddingCacheConfig {
    /// Conventional cache location inside an index root.
    pub fn at_index_root(index_root: &Path, model_name: &str) -> Self {
        Self {
            cache_path: index_root.join(CACHE_DIR),
            max_entries: DEFAULT_MAX_ENTRIES,
            model_name: model_name.to_string(),
        }
    }
}

/// Hit/miss telemetry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from cache
    pub hits: u64,
    /// Lookups that fell through to the model
    pub misses: u64,
    /// Entries currently held
    pub entries: usize,
}

#[derive(Serialize, Deserialize)]
struct StoredEntry {
    vector: Vec<f32>,
    last_used: u64,
}

struct CacheInner {
    entries: HashMap<String, StoredEntry>,
    tick: u64,
    dirty_shards: std::collections::HashSet<String>,
}

/// Persistent `(model, content_hash) -> vector` cache.
pub struct EmbeddingCache {
    config: EmbeddingCacheConfig,
    inner: Mutex<CacheInner>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl EmbeddingCache {
    /// Open (or create) a cache directory and load existing shards.
    pub fn open(config: EmbeddingCacheConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.cache_path)
            .map_err(|e| Error::cache(format!("create cache dir: {e}")))?;

        let mut entries = HashMap::new();
        let mut tick = 0u64;
        for entry in WalkDir::new(&config.cache_path)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if entry.path().extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Ok(bytes) = std::fs::read(entry.path()) else {
                continue;
            };
            match serde_json::from_slice::<HashMap<String, StoredEntry>>(&bytes) {
                Ok(shard) => {
                    for (key, stored) in shard {
                        tick = tick.max(stored.last_used);
                        entries.insert(key, stored);
                    }
                }
                Err(err) => {
                    tracing::warn!(shard = %entry.path().display(), error = %err, "dropping corrupt cache shard");
                    let _ = std::fs::remove_file(entry.path());
                }
            }
        }

        Ok(Self {
            config,
            inner: Mutex::new(CacheInner {
                entries,
                tick,
                dirty_shards: Default::default(),
            }),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// Look up a vector for a content hash under the configured model.
    pub fn get(&self, content_hash: &str) -> Option<Vec<f32>> {
        let key = self.key(content_hash);
        let mut inner = self.inner.lock().expect("cache lock");
        inner.tick += 1;
        let tick = inner.tick;
        match inner.entries.get_mut(&key) {
            Some(stored) => {
                stored.last_used = tick;
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(stored.vector.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a vector for a content hash, evicting oldest entries past the
    /// configured cap.
    pub fn put(&self, content_hash: &str, vector: Vec<f32>) {
        let key = self.key(content_hash);
        let shard = shard_of(&key);
        let mut inner = self.inner.lock().expect("cache lock");
        inner.tick += 1;
        let tick = inner.tick;
        inner.entries.insert(
            key,
            StoredEntry {
                vector,
                last_used: tick,
            },
        );
        inner.dirty_shards.insert(shard);

        if inner.entries.len() > self.config.max_entries {
            let excess = inner.entries.len() - self.config.max_entries
                + self.config.max_entries / EVICTION_FRACTION;
            let mut by_age: Vec<(String, u64)> = inner
                .entries
                .iter()
                .map(|(k, v)| (k.clone(), v.last_used))
                .collect();
            by_age.sort_by_key(|(_, used)| *used);
            for (key, _) in by_age.into_iter().take(excess) {
                let shard = shard_of(&key);
                inner.entries.remove(&key);
                inner.dirty_shards.insert(shard);
            }
        }
    }

    /// Persist dirty shards atomically.
    pub fn flush(&self) -> Result<()> {
        let mut inner = self.inner.lock().expect("cache lock");
        let dirty: Vec<String> = inner.dirty_shards.drain().collect();
        for shard in dirty {
            let shard_entries: HashMap<&String, &StoredEntry> = inner
                .entries
                .iter()
                .filter(|(k, _)| shard_of(k) == shard)
                .collect();
            let path = self.config.cache_path.join(format!("{shard}.json"));
            let tmp = path.with_extension("json.tmp");
            let json = serde_json::to_vec(&shard_entries)?;
            std::fs::write(&tmp, json)
                .and_then(|()| std::fs::rename(&tmp, &path))
                .map_err(|e| Error::cache(format!("flush shard {shard}: {e}")))?;
        }
        Ok(())
    }

    /// Telemetry snapshot.
    pub fn stats(&self) -> CacheStats {
        let entries = self.inner.lock().expect("cache lock").entries.len();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries,
        }
    }

    fn key(&self, content_hash: &str) -> String {
        format!("{}:{}", self.config.model_name, content_hash)
    }
}

fn shard_of(key: &str) -> String {
    // Shard on the first two hash chars after the model prefix.
    let hash = key.rsplit(':').next().unwrap_or("00");
    let mut chars = hash.chars();
    let a = chars.next().unwrap_or('0');
    let b = chars.next().unwrap_or('0');
    format!("{a}{b}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(dir: &TempDir, max_entries: usize) -> EmbeddingCacheConfig {
        EmbeddingCacheConfig {
            cache_path: dir.path().join(CACHE_DIR),
            max_entries,
            model_name: "test-model".to_string(),
        }
    }

    #[test]
    fn put_get_roundtrip_and_stats() {
        let dir = TempDir::new().unwrap();
        let cache = EmbeddingCache::open(config(&dir, 100)).unwrap();

        assert!(cache.get("abcd1234").is_none());
        cache.put("abcd1234", vec![0.1, 0.2]);
        assert_eq!(cache.get("abcd1234"), Some(vec![0.1, 0.2]));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn entries_survive_reopen_after_flush() {
        let dir = TempDir::new().unwrap();
        {
            let cache = EmbeddingCache::open(config(&dir, 100)).unwrap();
            cache.put("deadbeef00000000", vec![1.0, 2.0, 3.0]);
            cache.flush().unwrap();
        }
        let cache = EmbeddingCache::open(config(&dir, 100)).unwrap();
        assert_eq!(cache.get("deadbeef00000000"), Some(vec![1.0, 2.0, 3.0]));
    }

    #[test]
    fn model_name_partitions_keys() {
        let dir = TempDir::new().unwrap();
        {
            let cache = EmbeddingCache::open(config(&dir, 100)).unwrap();
            cache.put("cafe000000000000", vec![1.0]);
            cache.flush().unwrap();
        }
        let mut other = config(&dir, 100);
        other.model_name = "other-model".to_string();
        let cache = EmbeddingCache::open(other).unwrap();
        assert!(cache.get("cafe000000000000").is_none());
    }

    #[test]
    fn eviction_keeps_recent_entries() {
        let dir = TempDir::new().unwrap();
        let cache = EmbeddingCache::open(config(&dir, 10)).unwrap();
        for i in 0..30 {
            cache.put(&format!("{i:016x}"), vec![i as f32]);
        }
        let stats = cache.stats();
        assert!(stats.entries <= 10, "cap must hold, got {}", stats.entries);
        // The most recent insert always survives.
        assert!(cache.get(&format!("{:016x}", 29)).is_some());
    }

    #[test]
    fn corrupt_shard_is_dropped_not_fatal() {
        let dir = TempDir::new().unwrap();
        let cache_dir = dir.path().join(CACHE_DIR);
        std::fs::create_dir_all(&cache_dir).unwrap();
        std::fs::write(cache_dir.join("zz.json"), b"garbage").unwrap();
        let cache = EmbeddingCache::open(config(&dir, 100)).unwrap();
        assert_eq!(cache.stats().entries, 0);
    }
}
