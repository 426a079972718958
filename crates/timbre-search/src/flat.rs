//! Brute-force index: every query is compared with every stored vector.

use timbre_core::model::VectorId;

use crate::distance::{inner_product, squared_l2};
use crate::error::{SearchError, SearchResult};
use crate::index::{select_top_k, Metric, Neighbor};

/// Vectors stored contiguously in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    metric: Metric,
    dimension: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    #[must_use]
    pub fn new(metric: Metric, dimension: usize) -> Self {
        Self {
            metric,
            dimension,
            data: Vec::new(),
        }
    }

    /// Rebuild an index from its stored vectors (used when loading).
    pub(crate) fn from_parts(metric: Metric, dimension: usize, data: Vec<f32>) -> SearchResult<Self> {
        if dimension == 0 || data.len() % dimension != 0 {
            return Err(SearchError::Corrupt(format!(
                "{} values do not form vectors of dimension {dimension}",
                data.len()
            )));
        }
        Ok(Self {
            metric,
            dimension,
            data,
        })
    }

    #[must_use]
    pub const fn metric(&self) -> Metric {
        self.metric
    }

    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len() / self.dimension
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Stored vectors, row-major.
    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    #[must_use]
    pub fn vector(&self, id: VectorId) -> Option<&[f32]> {
        let start = id.get().checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }

    pub fn add(&mut self, vector: &[f32]) -> SearchResult<VectorId> {
        if vector.len() != self.dimension {
            return Err(SearchError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        let id = VectorId::new(self.len());
        self.data.extend_from_slice(vector);
        Ok(id)
    }

    /// Scan every vector. `query` must already have the index dimension.
    #[must_use]
    pub fn search(&self, query: &[f32], top_k: usize) -> Vec<Neighbor> {
        let candidates = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(position, vector)| {
                let score = match self.metric {
                    Metric::L2 => squared_l2(query, vector),
                    Metric::InnerProduct => inner_product(query, vector),
                };
                Neighbor::new(VectorId::new(position), score)
            })
            .collect();
        select_top_k(candidates, top_k, self.metric)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_assigns_sequential_ids() {
        let mut index = FlatIndex::new(Metric::L2, 2);
        assert_eq!(index.add(&[0.0, 0.0]).unwrap(), VectorId::new(0));
        assert_eq!(index.add(&[1.0, 1.0]).unwrap(), VectorId::new(1));
        assert_eq!(index.len(), 2);
        assert_eq!(index.vector(VectorId::new(1)), Some(&[1.0, 1.0][..]));
        assert_eq!(index.vector(VectorId::new(2)), None);
    }

    #[test]
    fn test_add_rejects_wrong_dimension() {
        let mut index = FlatIndex::new(Metric::L2, 3);
        assert!(matches!(
            index.add(&[1.0]),
            Err(SearchError::DimensionMismatch {
                expected: 3,
                actual: 1
            })
        ));
        assert!(index.is_empty());
    }

    #[test]
    fn test_exact_match_has_zero_distance() {
        let mut index = FlatIndex::new(Metric::L2, 4);
        index.add(&[1.0, 0.0, 0.0, 1.0]).unwrap();
        index.add(&[0.0, 1.0, 1.0, 0.0]).unwrap();

        let hits = index.search(&[1.0, 0.0, 0.0, 1.0], 1);
        assert_eq!(hits, vec![Neighbor::new(VectorId::new(0), 0.0)]);
    }

    #[test]
    fn test_top_k_larger_than_index_truncates() {
        let mut index = FlatIndex::new(Metric::L2, 1);
        for v in [3.0, 1.0, 2.0] {
            index.add(&[v]).unwrap();
        }
        let hits = index.search(&[0.0], 10);
        let ids: Vec<usize> = hits.iter().map(|h| h.vector_id.get()).collect();
        assert_eq!(ids, vec![1, 2, 0]);
    }

    #[test]
    fn test_from_parts_rejects_ragged_data() {
        assert!(FlatIndex::from_parts(Metric::L2, 3, vec![0.0; 4]).is_err());
        assert!(FlatIndex::from_parts(Metric::L2, 2, vec![0.0; 4]).is_ok());
    }
}
