//! The index type shared by the builder, persistence and the engine.

use std::cmp::Ordering;

use timbre_core::model::{IndexType, VectorId};

use crate::distance::normalized;
use crate::error::{SearchError, SearchResult};
use crate::flat::FlatIndex;
use crate::ivf::IvfIndex;

/// How candidate scores are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// Squared Euclidean distance; smaller is closer.
    L2,
    /// Inner product; larger is closer.
    InnerProduct,
}

/// One search hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub vector_id: VectorId,
    /// Squared L2 distance, or similarity for `Cosine` indices.
    pub distance: f32,
}

impl Neighbor {
    #[must_use]
    pub const fn new(vector_id: VectorId, distance: f32) -> Self {
        Self {
            vector_id,
            distance,
        }
    }
}

/// Keep the `k` best candidates, ordered nearest first.
///
/// Ties are broken by vector id so results are deterministic.
pub(crate) fn select_top_k(mut candidates: Vec<Neighbor>, k: usize, metric: Metric) -> Vec<Neighbor> {
    let compare = |a: &Neighbor, b: &Neighbor| -> Ordering {
        let by_score = match metric {
            Metric::L2 => a.distance.total_cmp(&b.distance),
            Metric::InnerProduct => b.distance.total_cmp(&a.distance),
        };
        by_score.then(a.vector_id.cmp(&b.vector_id))
    };

    if candidates.len() > k {
        candidates.select_nth_unstable_by(k, compare);
        candidates.truncate(k);
    }
    candidates.sort_unstable_by(compare);
    candidates
}

/// Parameters of the inverted-file index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IvfParams {
    /// Number of k-means partitions.
    pub nlist: usize,
    /// Partitions scanned per query.
    pub nprobe: usize,
    /// Maximum k-means iterations during training.
    pub iterations: usize,
}

impl Default for IvfParams {
    fn default() -> Self {
        Self {
            nlist: 100,
            nprobe: 1,
            iterations: 25,
        }
    }
}

/// A built nearest-neighbor index.
///
/// Vector ids are assigned densely in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub enum VectorIndex {
    FlatL2(FlatIndex),
    IvfFlat(IvfIndex),
    /// Inner product over L2-normalized vectors.
    Cosine(FlatIndex),
}

impl VectorIndex {
    /// Create an empty index. `params` is only used by `IVFFlat`.
    pub fn new(index_type: IndexType, dimension: usize, params: IvfParams) -> SearchResult<Self> {
        if dimension == 0 {
            return Err(SearchError::InvalidParameters(
                "dimension must be at least 1".to_string(),
            ));
        }
        Ok(match index_type {
            IndexType::FlatL2 => Self::FlatL2(FlatIndex::new(Metric::L2, dimension)),
            IndexType::IvfFlat => Self::IvfFlat(IvfIndex::new(dimension, params)?),
            IndexType::Cosine => Self::Cosine(FlatIndex::new(Metric::InnerProduct, dimension)),
        })
    }

    #[must_use]
    pub const fn index_type(&self) -> IndexType {
        match self {
            Self::FlatL2(_) => IndexType::FlatL2,
            Self::IvfFlat(_) => IndexType::IvfFlat,
            Self::Cosine(_) => IndexType::Cosine,
        }
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        match self {
            Self::FlatL2(index) | Self::Cosine(index) => index.dimension(),
            Self::IvfFlat(index) => index.dimension(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::FlatL2(index) | Self::Cosine(index) => index.len(),
            Self::IvfFlat(index) => index.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether vectors can be added. Only `IVFFlat` needs training.
    #[must_use]
    pub fn is_trained(&self) -> bool {
        match self {
            Self::FlatL2(_) | Self::Cosine(_) => true,
            Self::IvfFlat(index) => index.is_trained(),
        }
    }

    /// Train the coarse quantizer on row-major `data`. No-op for flat indices.
    pub fn train(&mut self, data: &[f32]) -> SearchResult<()> {
        match self {
            Self::FlatL2(_) | Self::Cosine(_) => Ok(()),
            Self::IvfFlat(index) => index.train(data),
        }
    }

    /// Append one vector and return its id. `Cosine` indices store a
    /// normalized copy.
    pub fn add(&mut self, vector: &[f32]) -> SearchResult<VectorId> {
        match self {
            Self::FlatL2(index) => index.add(vector),
            Self::Cosine(index) => index.add(&normalized(vector)),
            Self::IvfFlat(index) => index.add(vector),
        }
    }

    /// The `top_k` nearest vectors to `query`, nearest first.
    ///
    /// Returns fewer than `top_k` hits when the index holds fewer vectors.
    /// Queries against a `Cosine` index are normalized here.
    pub fn search(&self, query: &[f32], top_k: usize) -> SearchResult<Vec<Neighbor>> {
        if top_k == 0 {
            return Err(SearchError::InvalidTopK);
        }
        if query.len() != self.dimension() {
            return Err(SearchError::DimensionMismatch {
                expected: self.dimension(),
                actual: query.len(),
            });
        }

        Ok(match self {
            Self::FlatL2(index) => index.search(query, top_k),
            Self::Cosine(index) => index.search(&normalized(query), top_k),
            Self::IvfFlat(index) => index.search(query, top_k),
        })
    }

    /// Search several queries independently.
    pub fn search_batch(
        &self,
        queries: &[Vec<f32>],
        top_k: usize,
    ) -> SearchResult<Vec<Vec<Neighbor>>> {
        queries
            .iter()
            .map(|query| self.search(query, top_k))
            .collect()
    }
}
