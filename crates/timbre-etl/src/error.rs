//! Pipeline error types.

use std::path::PathBuf;
use thiserror::Error;
use timbre_core::model::IndexType;
use timbre_search::SearchError;

/// Errors that can occur while loading embeddings, building or querying.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The configuration cannot describe a valid build or query.
    #[error("configuration error: {0}")]
    Config(String),

    /// The configured combined dimension differs from the persisted index.
    #[error(
        "configured dimension {configured} does not match the index dimension {indexed}; rebuild the index"
    )]
    ConfigDimensionDrift { configured: usize, indexed: usize },

    /// The configured index type differs from the persisted index.
    #[error("configured index type {configured} does not match the persisted {indexed} index")]
    IndexTypeDrift {
        configured: IndexType,
        indexed: IndexType,
    },

    /// A `.npy` file could not be parsed.
    #[error("invalid npy file {}: {message}", path.display())]
    Npy { path: PathBuf, message: String },

    /// An error propagated from the index layer.
    #[error("index error: {0}")]
    Search(#[from] SearchError),

    /// An error propagated from the metadata store.
    #[error("database error: {0}")]
    Store(#[from] timbre_core::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub(crate) fn npy(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Npy {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns `true` when no index has been built yet.
    pub fn is_index_missing(&self) -> bool {
        matches!(self, Self::Search(e) if e.is_index_missing())
    }
}

/// Convenience alias for pipeline results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
