//! Content hashing for change detection
//!
//! Fingerprints are the first 16 hex characters of a SHA-256 digest over the
//! file bytes. The algorithm tag is recorded in the manifest so a future
//! migration can be detected.

use sha2::{Digest, Sha256};
use std::path::Path;

/// Algorithm tag written into the manifest.
pub const HASH_ALGORITHM: &str = "sha256-16";

/// Number of hex characters kept from the digest.
const DIGEST_HEX_LEN: usize = 16;

/// Stable content fingerprinting.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentHasher;

impl ContentHasher {
    /// Create a new hasher.
    pub fn new() -> Self {
        Self
    }

    /// Hash a file's bytes. Returns `None` on I/O error; callers treat
    /// `None` as "unknown, force reindex".
    pub fn hash_file(&self, path: &Path) -> Option<String> {
        match std::fs::read(path) {
            Ok(bytes) => Some(self.hash_bytes(&bytes)),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "content hash failed");
                None
            }
        }
    }

    /// Hash raw bytes.
    pub fn hash_bytes(&self, bytes: &[u8]) -> String {
        let digest = Sha256::digest(bytes);
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        hex[..DIGEST_HEX_LEN].to_string()
    }

    /// Hash a UTF-8 string.
    pub fn hash_content(&self, content: &str) -> String {
        self.hash_bytes(content.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_16_hex_chars() {
        let hash = ContentHasher::new().hash_content("hello world");
        assert_eq!(hash.len(), 16);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        // SHA-256("hello world") prefix
        assert_eq!(hash, "b94d27b9934d3e08");
    }

    #[test]
    fn hash_is_deterministic() {
        let hasher = ContentHasher::new();
        assert_eq!(hasher.hash_content("test content"), hasher.hash_content("test content"));
        assert_ne!(hasher.hash_content("content a"), hasher.hash_content("content b"));
    }

    #[test]
    fn missing_file_returns_none() {
        let hasher = ContentHasher::new();
        assert!(hasher.hash_file(Path::new("/definitely/not/here.txt")).is_none());
    }
}
