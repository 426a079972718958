//! Query a persisted index.

use std::path::{Path, PathBuf};

use timbre_core::model::IndexType;

use crate::error::{SearchError, SearchResult};
use crate::index::{Neighbor, VectorIndex};
use crate::persist::load_index;

/// A loaded index ready for queries.
#[derive(Debug)]
pub struct SimilaritySearch {
    path: PathBuf,
    index: VectorIndex,
}

impl SimilaritySearch {
    /// Load the index at `path`.
    ///
    /// A missing, unreadable or undecodable file is reported as
    /// [`SearchError::IndexNotAvailable`].
    pub fn open(path: &Path) -> SearchResult<Self> {
        let index = load_index(path).map_err(|e| {
            log::error!("Cannot load index {}: {e}", path.display());
            SearchError::IndexNotAvailable {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        })?;
        log::debug!(
            "Loaded {} index with {} vectors of dimension {}",
            index.index_type(),
            index.len(),
            index.dimension()
        );
        Ok(Self {
            path: path.to_path_buf(),
            index,
        })
    }

    /// Wrap an index that is already in memory.
    #[must_use]
    pub fn from_index(path: impl Into<PathBuf>, index: VectorIndex) -> Self {
        Self {
            path: path.into(),
            index,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    #[must_use]
    pub fn index_type(&self) -> IndexType {
        self.index.index_type()
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Nearest neighbors of a single query vector.
    pub fn search(&self, query: &[f32], top_k: usize) -> SearchResult<Vec<Neighbor>> {
        let mut rows = self.search_batch(&[query.to_vec()], top_k)?;
        Ok(rows.pop().unwrap_or_default())
    }

    /// Nearest neighbors of each row, computed independently.
    pub fn search_batch(
        &self,
        queries: &[Vec<f32>],
        top_k: usize,
    ) -> SearchResult<Vec<Vec<Neighbor>>> {
        let rows = self.index.search_batch(queries, top_k)?;
        log::debug!(
            "Searched {} queries against {}",
            rows.len(),
            self.path.display()
        );
        Ok(rows)
    }
}
