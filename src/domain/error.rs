//! Error handling types

use thiserror::Error;

/// Result type alias for operations that can fail
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for codescope
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error
        #[from]
        source: std::io::Error,
    },

    /// JSON parsing or serialization error
    #[error("JSON error: {source}")]
    Json {
        /// The underlying JSON error
        #[from]
        source: serde_json::Error,
    },

    /// Configuration-related error (fatal)
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error
        message: String,
    },

    /// Directory or file could not be scanned
    #[error("Scan error: {message}")]
    Scan {
        /// Description of the scan error
        message: String,
    },

    /// AST parsing failed for a file
    #[error("Parse failure in {file}: {message}")]
    Parse {
        /// The file that failed to parse
        file: String,
        /// Description of the parse failure
        message: String,
    },

    /// Embedding provider operation error
    #[error("Embedding provider error: {message}")]
    Embedding {
        /// Description of the embedding error
        message: String,
    },

    /// Vector store operation error (permanent)
    #[error("Vector store error: {message}")]
    VectorDb {
        /// Description of the vector store error
        message: String,
    },

    /// Store used before `initialize()` completed
    #[error("Vector store not initialized")]
    NotInitialized,

    /// `insert_batch` called with mismatched column lengths
    #[error("Batch length mismatch: {vectors} vectors, {metadatas} metadatas, {contents} contents")]
    BatchLengthMismatch {
        /// Number of vectors in the batch
        vectors: usize,
        /// Number of metadata payloads in the batch
        metadatas: usize,
        /// Number of content strings in the batch
        contents: usize,
    },

    /// Store backend unreachable (transient, retried with backoff)
    #[error("Vector store backend unavailable: {message}")]
    BackendUnavailable {
        /// Description of the availability failure
        message: String,
    },

    /// Resource not found
    #[error("Not found: {resource}")]
    NotFound {
        /// The resource that was not found
        resource: String,
    },

    /// Conflicting state in the store (e.g. dimension mismatch)
    #[error("Conflict: {message}")]
    Conflict {
        /// Description of the conflict
        message: String,
    },

    /// Manifest could not be read or written
    #[error("Manifest error: {message}")]
    Manifest {
        /// Description of the manifest error
        message: String,
    },

    /// Git invocation failed
    #[error("Git error: {message}")]
    Git {
        /// Description of the git failure
        message: String,
    },

    /// File watcher internal error
    #[error("Watcher error: {message}")]
    Watcher {
        /// Description of the watcher error
        message: String,
    },

    /// Cache operation error
    #[error("Cache error: {message}")]
    Cache {
        /// Description of the cache error
        message: String,
    },

    /// Invalid argument provided to a function
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument
        message: String,
    },

    /// Run cancelled cooperatively; not a failure
    #[error("Cancelled")]
    Cancelled,

    /// Internal invariant violation
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error
        message: String,
    },
}

impl Error {
    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a scan error
    pub fn scan<S: Into<String>>(message: S) -> Self {
        Self::Scan {
            message: message.into(),
        }
    }

    /// Create a parse failure
    pub fn parse<F: Into<String>, S: Into<String>>(file: F, message: S) -> Self {
        Self::Parse {
            file: file.into(),
            message: message.into(),
        }
    }

    /// Create an embedding provider error
    pub fn embedding<S: Into<String>>(message: S) -> Self {
        Self::Embedding {
            message: message.into(),
        }
    }

    /// Create a vector store error
    pub fn vector_db<S: Into<String>>(message: S) -> Self {
        Self::VectorDb {
            message: message.into(),
        }
    }

    /// Create a transient backend availability error
    pub fn backend_unavailable<S: Into<String>>(message: S) -> Self {
        Self::BackendUnavailable {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create a conflict error
    pub fn conflict<S: Into<String>>(message: S) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Create a manifest error
    pub fn manifest<S: Into<String>>(message: S) -> Self {
        Self::Manifest {
            message: message.into(),
        }
    }

    /// Create a git error
    pub fn git<S: Into<String>>(message: S) -> Self {
        Self::Git {
            message: message.into(),
        }
    }

    /// Create a watcher error
    pub fn watcher<S: Into<String>>(message: S) -> Self {
        Self::Watcher {
            message: message.into(),
        }
    }

    /// Create a cache error
    pub fn cache<S: Into<String>>(message: S) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether a retry with backoff may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::BackendUnavailable { .. })
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Self::Internal { message: s }
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Self::Internal {
            message: s.to_string(),
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Config {
            message: err.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Config {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::BackendUnavailable {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(Error::backend_unavailable("connection refused").is_transient());
        assert!(!Error::vector_db("schema mismatch").is_transient());
        assert!(!Error::NotInitialized.is_transient());
    }

    #[test]
    fn batch_mismatch_message_names_all_columns() {
        let err = Error::BatchLengthMismatch {
            vectors: 3,
            metadatas: 2,
            contents: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("3 vectors"));
        assert!(msg.contains("2 metadatas"));
    }
}
