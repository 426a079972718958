use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::model::embedding::CombinedVector;
use crate::model::ids::{TrackId, VectorId};

/// Nearest-neighbor index strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum IndexType {
    /// Exact brute-force Euclidean search.
    #[default]
    FlatL2,
    /// Inverted-file approximate Euclidean search.
    #[serde(rename = "IVFFlat")]
    IvfFlat,
    /// Inner product over L2-normalized vectors.
    Cosine,
}

impl IndexType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FlatL2 => "FlatL2",
            Self::IvfFlat => "IVFFlat",
            Self::Cosine => "Cosine",
        }
    }

    /// Whether larger scores mean closer neighbors.
    #[must_use]
    pub const fn is_similarity(self) -> bool {
        matches!(self, Self::Cosine)
    }
}

impl fmt::Display for IndexType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndexType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FlatL2" => Ok(Self::FlatL2),
            "IVFFlat" => Ok(Self::IvfFlat),
            "Cosine" => Ok(Self::Cosine),
            other => Err(Error::InvalidData(format!(
                "unknown index type '{other}' (expected FlatL2, IVFFlat or Cosine)"
            ))),
        }
    }
}

/// One row of the `vector_metadata` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorMetadataRow {
    pub vector_id: VectorId,
    pub track_id: TrackId,
    pub vector_dimensions: usize,
    pub index_type: IndexType,
}

impl VectorMetadataRow {
    /// One row per vector, with `vector_id` equal to the vector's position
    /// in `vectors`.
    #[must_use]
    pub fn for_vectors(vectors: &[CombinedVector], index_type: IndexType) -> Vec<Self> {
        vectors
            .iter()
            .enumerate()
            .map(|(position, vector)| Self {
                vector_id: VectorId::new(position),
                track_id: vector.track_id,
                vector_dimensions: vector.dimension(),
                index_type,
            })
            .collect()
    }
}

/// A search hit joined with its catalog metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackDetail {
    pub vector_id: VectorId,
    pub track_id: TrackId,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    /// Release year derived from the track's creation date.
    pub released: Option<i32>,
    pub genre: Option<String>,
}

/// A record of one completed index build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexBuild {
    pub built_at: DateTime<Utc>,
    pub index_type: IndexType,
    pub vector_dimensions: usize,
    pub vector_count: usize,
    pub categories: Vec<String>,
    /// Embedding files skipped while loading (bad shape, id or content).
    pub skipped_files: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_type_names_round_trip() {
        for kind in [IndexType::FlatL2, IndexType::IvfFlat, IndexType::Cosine] {
            assert_eq!(kind.as_str().parse::<IndexType>().unwrap(), kind);
        }
        assert!("HNSW".parse::<IndexType>().is_err());
    }

    #[test]
    fn test_index_type_serde_names() {
        let json = serde_json::to_string(&IndexType::IvfFlat).unwrap();
        assert_eq!(json, "\"IVFFlat\"");
        let parsed: IndexType = serde_json::from_str("\"Cosine\"").unwrap();
        assert_eq!(parsed, IndexType::Cosine);
    }

    #[test]
    fn test_rows_are_aligned_with_vector_positions() {
        let vectors = vec![
            CombinedVector::new(TrackId::new(10), vec![0.0; 4]),
            CombinedVector::new(TrackId::new(3), vec![1.0; 4]),
            CombinedVector::new(TrackId::new(99), vec![2.0; 4]),
        ];
        let rows = VectorMetadataRow::for_vectors(&vectors, IndexType::Cosine);

        assert_eq!(rows.len(), vectors.len());
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.vector_id, VectorId::new(i));
            assert_eq!(row.track_id, vectors[i].track_id);
            assert_eq!(row.vector_dimensions, 4);
            assert_eq!(row.index_type, IndexType::Cosine);
        }
    }
}
