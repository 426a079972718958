//! Search and index error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building, persisting or querying an index.
#[derive(Debug, Error)]
pub enum SearchError {
    /// No usable index at the configured path.
    #[error("index not available at {}: {reason}", path.display())]
    IndexNotAvailable { path: PathBuf, reason: String },

    /// A vector or query does not have the index dimension.
    #[error("dimension mismatch: index expects {expected} values, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// IVF training had fewer vectors than partitions.
    #[error("IVF training needs at least {required} vectors, got {available}")]
    TrainingFailed { required: usize, available: usize },

    /// Vectors were added to an IVF index before training.
    #[error("IVF index must be trained before vectors are added")]
    NotTrained,

    #[error("top_k must be at least 1")]
    InvalidTopK,

    #[error("invalid index parameters: {0}")]
    InvalidParameters(String),

    /// The index blob could not be decoded.
    #[error("corrupt index file: {0}")]
    Corrupt(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SearchError {
    /// Returns `true` when the error means no index could be loaded.
    pub fn is_index_missing(&self) -> bool {
        matches!(self, Self::IndexNotAvailable { .. })
    }
}

/// Convenience alias for search results.
pub type SearchResult<T> = std::result::Result<T, SearchError>;
