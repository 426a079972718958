//! Inverted-file index with flat (uncompressed) storage.
//!
//! A k-means coarse quantizer splits the space into `nlist` partitions.
//! Each vector is stored once and listed under its nearest centroid; a
//! query scans only the `nprobe` partitions whose centroids are closest.

use timbre_core::model::VectorId;

use crate::distance::squared_l2;
use crate::error::{SearchError, SearchResult};
use crate::index::{select_top_k, IvfParams, Metric, Neighbor};
use crate::kmeans;

#[derive(Debug, Clone, PartialEq)]
pub struct IvfIndex {
    dimension: usize,
    params: IvfParams,
    /// `nlist * dimension` values once trained, empty before.
    centroids: Vec<f32>,
    /// Partition of every stored vector, by vector id.
    assignments: Vec<u32>,
    /// Vector ids per partition, in insertion order.
    lists: Vec<Vec<usize>>,
    data: Vec<f32>,
}

impl IvfIndex {
    pub fn new(dimension: usize, params: IvfParams) -> SearchResult<Self> {
        if params.nlist == 0 {
            return Err(SearchError::InvalidParameters(
                "nlist must be at least 1".to_string(),
            ));
        }
        if params.nprobe == 0 {
            return Err(SearchError::InvalidParameters(
                "nprobe must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            dimension,
            params,
            centroids: Vec::new(),
            assignments: Vec::new(),
            lists: Vec::new(),
            data: Vec::new(),
        })
    }

    /// Rebuild a trained index from persisted parts.
    pub(crate) fn from_parts(
        dimension: usize,
        params: IvfParams,
        centroids: Vec<f32>,
        assignments: Vec<u32>,
        data: Vec<f32>,
    ) -> SearchResult<Self> {
        let mut index = Self::new(dimension, params)?;
        if centroids.len() != params.nlist * dimension {
            return Err(SearchError::Corrupt(format!(
                "expected {} centroid values, found {}",
                params.nlist * dimension,
                centroids.len()
            )));
        }
        if data.len() != assignments.len() * dimension {
            return Err(SearchError::Corrupt(format!(
                "{} assignments do not match {} stored values",
                assignments.len(),
                data.len()
            )));
        }

        index.lists = vec![Vec::new(); params.nlist];
        for (id, &list) in assignments.iter().enumerate() {
            let slot = index.lists.get_mut(list as usize).ok_or_else(|| {
                SearchError::Corrupt(format!("vector {id} assigned to missing list {list}"))
            })?;
            slot.push(id);
        }
        index.centroids = centroids;
        index.assignments = assignments;
        index.data = data;
        Ok(index)
    }

    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    #[must_use]
    pub const fn params(&self) -> IvfParams {
        self.params
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    #[must_use]
    pub fn is_trained(&self) -> bool {
        !self.centroids.is_empty()
    }

    #[must_use]
    pub fn centroids(&self) -> &[f32] {
        &self.centroids
    }

    #[must_use]
    pub fn assignments(&self) -> &[u32] {
        &self.assignments
    }

    /// Stored vectors, row-major.
    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Train the coarse quantizer on row-major `data`.
    ///
    /// Fails when there are fewer training vectors than partitions.
    pub fn train(&mut self, data: &[f32]) -> SearchResult<()> {
        if !self.is_empty() {
            return Err(SearchError::InvalidParameters(
                "cannot retrain an index that already holds vectors".to_string(),
            ));
        }
        if data.len() % self.dimension != 0 {
            return Err(SearchError::InvalidParameters(format!(
                "{} training values do not form vectors of dimension {}",
                data.len(),
                self.dimension
            )));
        }
        let available = data.len() / self.dimension;
        if available < self.params.nlist {
            return Err(SearchError::TrainingFailed {
                required: self.params.nlist,
                available,
            });
        }

        log::info!(
            "Training IVF quantizer: {} vectors into {} partitions",
            available,
            self.params.nlist
        );
        self.centroids = kmeans::train(
            data,
            self.dimension,
            self.params.nlist,
            self.params.iterations,
        );
        self.lists = vec![Vec::new(); self.params.nlist];
        Ok(())
    }

    pub fn add(&mut self, vector: &[f32]) -> SearchResult<VectorId> {
        if !self.is_trained() {
            return Err(SearchError::NotTrained);
        }
        if vector.len() != self.dimension {
            return Err(SearchError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        let id = self.len();
        let list = kmeans::nearest_centroid(&self.centroids, self.dimension, vector);
        self.lists[list].push(id);
        self.assignments.push(list as u32);
        self.data.extend_from_slice(vector);
        Ok(VectorId::new(id))
    }

    /// Scan the `nprobe` nearest partitions.
    #[must_use]
    pub fn search(&self, query: &[f32], top_k: usize) -> Vec<Neighbor> {
        if !self.is_trained() {
            return Vec::new();
        }

        let probes: Vec<Neighbor> = self
            .centroids
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(list, centroid)| Neighbor::new(VectorId::new(list), squared_l2(query, centroid)))
            .collect();
        let probes = select_top_k(probes, self.params.nprobe, Metric::L2);

        let mut candidates = Vec::new();
        for probe in probes {
            for &id in &self.lists[probe.vector_id.get()] {
                let vector = &self.data[id * self.dimension..(id + 1) * self.dimension];
                candidates.push(Neighbor::new(VectorId::new(id), squared_l2(query, vector)));
            }
        }
        select_top_k(candidates, top_k, Metric::L2)
    }
}
