//! Global configuration
//!
//! Loaded from `~/.codescope/config.toml` when present, with environment
//! overrides for the remote vector store credentials. Malformed
//! configuration is a fatal `ConfigValidation` error with a human-readable
//! message; a missing file simply yields defaults (embedded backend, local
//! embeddings).

use crate::domain::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use validator::Validate;

/// Home directory override for tests and sandboxes.
pub const HOME_ENV: &str = "CODESCOPE_HOME";
/// Remote store URL override.
pub const REMOTE_URL_ENV: &str = "CODESCOPE_REMOTE_URL";
/// Remote store token override.
pub const REMOTE_TOKEN_ENV: &str = "CODESCOPE_REMOTE_TOKEN";

/// Tool directory name under the user's home.
pub const TOOL_DIR: &str = ".codescope";

/// Recognized embedding dimensions.
pub const SUPPORTED_DIMENSIONS: &[usize] = &[384, 768];

/// Embedding provider settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Provider name: `fastembed` or `hash`
    #[validate(length(min = 1))]
    pub provider: String,
    /// Model identifier (cache key component)
    #[validate(length(min = 1))]
    pub model: String,
    /// Output dimension; must be one of [`SUPPORTED_DIMENSIONS`]
    pub dimensions: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "fastembed".to_string(),
            model: "BAAI/bge-small-en-v1.5".to_string(),
            dimensions: 384,
        }
    }
}

/// Vector store backend settings.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct StoreSettings {
    /// Backend name: `embedded` or `remote`
    #[validate(length(min = 1))]
    pub backend: String,
    /// Remote service base URL (required for `remote`)
    pub remote_url: Option<String>,
    /// Remote service token
    pub remote_token: Option<String>,
    /// Organization id for the remote backend
    pub org_id: Option<String>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: "embedded".to_string(),
            remote_url: None,
            remote_token: None,
            org_id: None,
        }
    }
}

/// Indexing pipeline tuning.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct IndexingSettings {
    /// Worker pool size for per-file chunk+hash work
    #[validate(range(min = 1, max = 64))]
    pub concurrency: usize,
    /// Texts per embedding call
    #[validate(range(min = 1, max = 512))]
    pub embedding_batch_size: usize,
    /// Accumulated chunks per `insert_batch` flush
    #[validate(range(min = 1, max = 4096))]
    pub chunk_batch_size: usize,
    /// Files above this size are skipped with a warning
    pub max_file_size_bytes: u64,
}

impl Default for IndexingSettings {
    fn default() -> Self {
        Self {
            concurrency: 4,
            embedding_batch_size: 50,
            chunk_batch_size: 100,
            max_file_size_bytes: 1024 * 1024,
        }
    }
}

/// Root configuration object.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct GlobalConfig {
    /// Embedding provider settings
    #[validate(nested)]
    pub embedding: EmbeddingSettings,
    /// Vector store settings
    #[validate(nested)]
    pub store: StoreSettings,
    /// Indexing pipeline settings
    #[validate(nested)]
    pub indexing: IndexingSettings,
}

impl GlobalConfig {
    /// Load from the conventional path, apply env overrides, validate.
    pub fn load() -> Result<Self> {
        let path = config_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| Error::config(format!("read {}: {e}", path.display())))?;
            toml::from_str::<GlobalConfig>(&text)
                .map_err(|e| Error::config(format!("parse {}: {e}", path.display())))?
        } else {
            GlobalConfig::default()
        };

        if let Ok(url) = std::env::var(REMOTE_URL_ENV) {
            if !url.is_empty() {
                config.store.backend = "remote".to_string();
                config.store.remote_url = Some(url);
            }
        }
        if let Ok(token) = std::env::var(REMOTE_TOKEN_ENV) {
            if !token.is_empty() {
                config.store.remote_token = Some(token);
            }
        }

        config.validated()
    }

    /// Validate invariants the derive cannot express.
    pub fn validated(self) -> Result<Self> {
        self.validate()?;
        if !SUPPORTED_DIMENSIONS.contains(&self.embedding.dimensions) {
            return Err(Error::config(format!(
                "embedding.dimensions must be one of {SUPPORTED_DIMENSIONS:?}, got {}",
                self.embedding.dimensions
            )));
        }
        match self.store.backend.as_str() {
            "embedded" => {}
            "remote" => {
                if self.store.remote_url.as_deref().unwrap_or("").is_empty() {
                    return Err(Error::config(
                        "store.backend = \"remote\" requires store.remote_url (or CODESCOPE_REMOTE_URL)",
                    ));
                }
            }
            other => {
                return Err(Error::config(format!(
                    "store.backend must be \"embedded\" or \"remote\", got {other:?}"
                )));
            }
        }
        Ok(self)
    }

    /// Serialize to TOML for `codescope init`.
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}

/// Home of all codescope state (`~/.codescope`, overridable via
/// `CODESCOPE_HOME`).
pub fn tool_home() -> PathBuf {
    if let Ok(home) = std::env::var(HOME_ENV) {
        if !home.is_empty() {
            return PathBuf::from(shellexpand::tilde(&home).into_owned());
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(TOOL_DIR)
}

/// Path of the global config file.
pub fn config_path() -> PathBuf {
    tool_home().join("config.toml")
}

/// Per-project index root: `<home>/indices/<projectName>-<8hexPathHash>/`.
pub fn index_root_for(project_root: &Path) -> PathBuf {
    let canonical = project_root
        .canonicalize()
        .unwrap_or_else(|_| project_root.to_path_buf());
    let hash = seahash::hash(canonical.to_string_lossy().as_bytes());
    let name = canonical
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "project".to_string());
    tool_home()
        .join("indices")
        .join(format!("{}-{:08x}", sanitize(&name), (hash >> 32) as u32))
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        GlobalConfig::default().validated().unwrap();
    }

    #[test]
    fn unsupported_dimension_is_rejected() {
        let mut config = GlobalConfig::default();
        config.embedding.dimensions = 512;
        let err = config.validated().unwrap_err();
        assert!(err.to_string().contains("dimensions"));
    }

    #[test]
    fn remote_backend_requires_url() {
        let mut config = GlobalConfig::default();
        config.store.backend = "remote".to_string();
        assert!(config.clone().validated().is_err());
        config.store.remote_url = Some("http://localhost:6333".to_string());
        assert!(config.validated().is_ok());
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let mut config = GlobalConfig::default();
        config.store.backend = "mystery".to_string();
        assert!(config.validated().is_err());
    }

    #[test]
    fn toml_roundtrip() {
        let config = GlobalConfig::default();
        let text = config.to_toml();
        let back: GlobalConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.embedding.dimensions, 384);
        assert_eq!(back.indexing.concurrency, 4);
    }

    #[test]
    fn index_root_is_deterministic_and_namespaced() {
        let dir = std::env::temp_dir();
        let a = index_root_for(&dir);
        let b = index_root_for(&dir);
        assert_eq!(a, b);
        let name = a.file_name().unwrap().to_string_lossy().to_string();
        let suffix = name.rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), 8, "8-hex path hash suffix: {name}");
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
