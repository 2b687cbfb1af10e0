use std::path::PathBuf;

/// Errors from blob store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested blob was not found.
    #[error("blob not found: {0}")]
    NotFound(String),

    /// Content hash mismatch on read (data corruption).
    #[error("hash mismatch for blob {expected}: content hashes to {computed}")]
    HashMismatch { expected: String, computed: String },

    /// The key is not a well-formed SHA-256 hex digest.
    #[error("invalid blob hash: {0}")]
    InvalidHash(#[from] codex_types::TypeError),

    /// I/O error from the underlying storage backend, with the path involved.
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
