//! Build an index from combined vectors.

use timbre_core::model::{CombinedVector, IndexType};

use crate::error::{SearchError, SearchResult};
use crate::index::{IvfParams, VectorIndex};

/// Builds a [`VectorIndex`] in one pass over an ordered vector list.
///
/// The position of a vector in the list becomes its vector id.
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    index_type: IndexType,
    dimension: usize,
    ivf: IvfParams,
}

impl IndexBuilder {
    /// `dimension` is the declared length of every combined vector.
    #[must_use]
    pub fn new(index_type: IndexType, dimension: usize) -> Self {
        Self {
            index_type,
            dimension,
            ivf: IvfParams::default(),
        }
    }

    #[must_use]
    pub fn ivf_params(mut self, params: IvfParams) -> Self {
        self.ivf = params;
        self
    }

    /// Build the index.
    ///
    /// Returns `Ok(None)` when there is nothing to index. Any vector whose
    /// length differs from the declared dimension fails the whole build.
    pub fn build(&self, vectors: &[CombinedVector]) -> SearchResult<Option<VectorIndex>> {
        if vectors.is_empty() {
            log::warn!("No vectors to index, skipping {} build", self.index_type);
            return Ok(None);
        }

        if let Some(bad) = vectors.iter().find(|v| v.dimension() != self.dimension) {
            log::error!(
                "Track {} has a {}-value vector, expected {}",
                bad.track_id,
                bad.dimension(),
                self.dimension
            );
            return Err(SearchError::DimensionMismatch {
                expected: self.dimension,
                actual: bad.dimension(),
            });
        }

        let mut index = VectorIndex::new(self.index_type, self.dimension, self.ivf)?;
        log::info!("Index type set to: {}", self.index_type);
        log::info!("Dimensions of the vectors: {}", self.dimension);

        if !index.is_trained() {
            let training: Vec<f32> = vectors
                .iter()
                .flat_map(|v| v.values.iter().copied())
                .collect();
            index.train(&training)?;
        }

        for vector in vectors {
            index.add(&vector.values)?;
        }

        log::info!(
            "Index created and embeddings added. Total embeddings: {}",
            index.len()
        );
        Ok(Some(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use timbre_core::model::{TrackId, VectorId};

    fn vector(track: i64, values: &[f32]) -> CombinedVector {
        CombinedVector::new(TrackId::new(track), values.to_vec())
    }

    #[test]
    fn test_empty_input_skips_build() {
        let built = IndexBuilder::new(IndexType::FlatL2, 4).build(&[]).unwrap();
        assert!(built.is_none());
    }

    #[test]
    fn test_dimension_mismatch_is_fatal() {
        let vectors = vec![vector(1, &[0.0, 1.0]), vector(2, &[0.0, 1.0, 2.0])];
        let err = IndexBuilder::new(IndexType::FlatL2, 2)
            .build(&vectors)
            .unwrap_err();
        assert!(matches!(
            err,
            SearchError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_vector_ids_follow_input_order() {
        let vectors = vec![
            vector(30, &[3.0, 0.0]),
            vector(10, &[1.0, 0.0]),
            vector(20, &[2.0, 0.0]),
        ];
        let index = IndexBuilder::new(IndexType::FlatL2, 2)
            .build(&vectors)
            .unwrap()
            .unwrap();

        assert_eq!(index.len(), 3);
        for (position, v) in vectors.iter().enumerate() {
            let hits = index.search(&v.values, 1).unwrap();
            assert_eq!(hits[0].vector_id, VectorId::new(position));
        }
    }

    #[test]
    fn test_ivf_build_trains_first() {
        let vectors: Vec<CombinedVector> = (0..20)
            .map(|i| vector(i, &[i as f32, (i % 3) as f32]))
            .collect();
        let index = IndexBuilder::new(IndexType::IvfFlat, 2)
            .ivf_params(IvfParams {
                nlist: 4,
                nprobe: 4,
                iterations: 10,
            })
            .build(&vectors)
            .unwrap()
            .unwrap();
        assert_eq!(index.index_type(), IndexType::IvfFlat);
        assert_eq!(index.len(), 20);
    }

    #[test]
    fn test_ivf_build_with_too_few_vectors_fails() {
        let vectors = vec![vector(1, &[0.0, 1.0]), vector(2, &[1.0, 0.0])];
        let err = IndexBuilder::new(IndexType::IvfFlat, 2).build(&vectors).unwrap_err();
        assert!(matches!(err, SearchError::TrainingFailed { .. }));
    }
}
