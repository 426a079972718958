//! Find tracks similar to a query embedding.

use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use timbre_core::model::{IndexType, TrackDetail, TrackId, VectorId};
use timbre_core::schema::Database;
use timbre_search::SimilaritySearch;

use crate::config::Config;
use crate::error::{PipelineError, PipelineResult};

/// One ranked result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarTrack {
    /// 1-based position in the result list.
    pub rank: usize,
    /// Squared L2 distance, or cosine similarity for `Cosine` indices.
    pub distance: f32,
    #[serde(flatten)]
    pub detail: TrackDetail,
}

/// Answers similarity queries against the configured index.
#[derive(Debug, Clone)]
pub struct SimilarTracks {
    index_path: PathBuf,
    index_type: IndexType,
    dimension: usize,
}

impl SimilarTracks {
    /// `dimension` is the combined vector length the caller expects the
    /// index to have.
    #[must_use]
    pub fn new(index_path: impl Into<PathBuf>, index_type: IndexType, dimension: usize) -> Self {
        Self {
            index_path: index_path.into(),
            index_type,
            dimension,
        }
    }

    pub fn from_config(config: &Config) -> PipelineResult<Self> {
        Ok(Self::new(
            &config.paths.index_path,
            config.faiss.index_type,
            config.effective_dimension()?,
        ))
    }

    /// Open the index and check it still matches the configuration.
    pub fn open_index(&self) -> PipelineResult<SimilaritySearch> {
        let engine = SimilaritySearch::open(&self.index_path)?;
        if engine.dimension() != self.dimension {
            return Err(PipelineError::ConfigDimensionDrift {
                configured: self.dimension,
                indexed: engine.dimension(),
            });
        }
        if engine.index_type() != self.index_type {
            return Err(PipelineError::IndexTypeDrift {
                configured: self.index_type,
                indexed: engine.index_type(),
            });
        }
        Ok(engine)
    }

    /// The `top_k` tracks nearest to `query`, nearest first.
    ///
    /// When `exclude_track` is set, that track is removed from the results
    /// and one extra neighbor is fetched to make up for it. Hits without
    /// catalog metadata are dropped.
    pub fn find(
        &self,
        db: &Database,
        query: &[f32],
        top_k: usize,
        exclude_track: Option<TrackId>,
    ) -> PipelineResult<Vec<SimilarTrack>> {
        let mut rows = self.find_batch(db, &[query.to_vec()], top_k, exclude_track)?;
        Ok(rows.pop().unwrap_or_default())
    }

    /// [`find`](Self::find) for several queries against one opened index.
    /// Each row gets its own ranked list.
    pub fn find_batch(
        &self,
        db: &Database,
        queries: &[Vec<f32>],
        top_k: usize,
        exclude_track: Option<TrackId>,
    ) -> PipelineResult<Vec<Vec<SimilarTrack>>> {
        let engine = self.open_index()?;
        let fetch = if exclude_track.is_some() && top_k > 0 {
            top_k.saturating_add(1)
        } else {
            top_k
        };
        let rows = engine.search_batch(queries, fetch)?;

        let ids: Vec<VectorId> = rows.iter().flatten().map(|h| h.vector_id).collect();
        let details: HashMap<VectorId, TrackDetail> = db
            .resolve_track_details(&ids)?
            .into_iter()
            .map(|d| (d.vector_id, d))
            .collect();

        let results: Vec<Vec<SimilarTrack>> = rows
            .iter()
            .map(|hits| {
                hits.iter()
                    .filter_map(|hit| Some((hit.distance, details.get(&hit.vector_id)?)))
                    .filter(|(_, detail)| Some(detail.track_id) != exclude_track)
                    .take(top_k)
                    .enumerate()
                    .map(|(i, (distance, detail))| SimilarTrack {
                        rank: i + 1,
                        distance,
                        detail: detail.clone(),
                    })
                    .collect()
            })
            .collect();

        log::info!(
            "Found {} similar tracks for {} queries ({} neighbors searched)",
            results.iter().map(Vec::len).sum::<usize>(),
            queries.len(),
            ids.len()
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use timbre_core::model::{CombinedVector, VectorMetadataRow};
    use timbre_search::persist::save_index;
    use timbre_search::IndexBuilder;

    fn seed(db: &Database, vectors: &[CombinedVector], index_type: IndexType) {
        db.replace_vector_metadata(&VectorMetadataRow::for_vectors(vectors, index_type))
            .unwrap();
        for v in vectors {
            let id = v.track_id.get();
            db.conn()
                .execute(
                    "INSERT INTO tracks (track_id, title, date_created, genre_top)
                     VALUES (?1, ?2, '2008-11-26 01:48:12', 'Rock')",
                    (id, format!("Track {id}")),
                )
                .unwrap();
            db.conn()
                .execute(
                    "INSERT INTO artists (track_id, name) VALUES (?1, ?2)",
                    (id, "Artist"),
                )
                .unwrap();
            db.conn()
                .execute(
                    "INSERT INTO albums (track_id, title) VALUES (?1, ?2)",
                    (id, "Album"),
                )
                .unwrap();
        }
    }

    fn setup(temp_dir: &TempDir, index_type: IndexType) -> (Database, SimilarTracks) {
        let vectors = vec![
            CombinedVector::new(TrackId::new(1), vec![1.0, 0.0, 0.0, 1.0]),
            CombinedVector::new(TrackId::new(2), vec![0.0, 1.0, 1.0, 0.0]),
            CombinedVector::new(TrackId::new(3), vec![0.9, 0.1, 0.0, 1.0]),
        ];
        let index = IndexBuilder::new(index_type, 4)
            .build(&vectors)
            .unwrap()
            .unwrap();
        let path = temp_dir.path().join("tracks.index");
        save_index(&index, &path).unwrap();

        let db = Database::open_in_memory().unwrap();
        seed(&db, &vectors, index_type);
        (db, SimilarTracks::new(path, index_type, 4))
    }

    #[test]
    fn test_find_ranks_and_resolves() {
        let temp_dir = TempDir::new().unwrap();
        let (db, similar) = setup(&temp_dir, IndexType::FlatL2);

        let results = similar.find(&db, &[1.0, 0.0, 0.0, 1.0], 2, None).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].rank, 1);
        assert_eq!(results[0].detail.track_id, TrackId::new(1));
        assert_eq!(results[0].distance, 0.0);
        assert_eq!(results[0].detail.released, Some(2008));
        assert_eq!(results[1].detail.track_id, TrackId::new(3));
    }

    #[test]
    fn test_exclude_track_keeps_top_k() {
        let temp_dir = TempDir::new().unwrap();
        let (db, similar) = setup(&temp_dir, IndexType::FlatL2);

        let results = similar
            .find(&db, &[1.0, 0.0, 0.0, 1.0], 2, Some(TrackId::new(1)))
            .unwrap();
        let ids: Vec<i64> = results.iter().map(|r| r.detail.track_id.get()).collect();
        assert_eq!(ids, vec![3, 2]);
        assert_eq!(results[0].rank, 1);
    }

    #[test]
    fn test_exclude_track_with_unbounded_top_k() {
        let temp_dir = TempDir::new().unwrap();
        let (db, similar) = setup(&temp_dir, IndexType::FlatL2);

        let results = similar
            .find(&db, &[1.0, 0.0, 0.0, 1.0], usize::MAX, Some(TrackId::new(1)))
            .unwrap();
        let ids: Vec<i64> = results.iter().map(|r| r.detail.track_id.get()).collect();
        assert_eq!(ids, vec![3, 2]);

        let all = similar
            .find(&db, &[1.0, 0.0, 0.0, 1.0], usize::MAX, Some(TrackId::new(9)))
            .unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_find_batch_ranks_each_row() {
        let temp_dir = TempDir::new().unwrap();
        let (db, similar) = setup(&temp_dir, IndexType::FlatL2);

        let queries = vec![vec![1.0, 0.0, 0.0, 1.0], vec![0.0, 1.0, 1.0, 0.0]];
        let rows = similar.find_batch(&db, &queries, 1, None).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0].detail.track_id, TrackId::new(1));
        assert_eq!(rows[1][0].detail.track_id, TrackId::new(2));
        assert_eq!(rows[1][0].rank, 1);
    }

    #[test]
    fn test_dimension_drift_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let (db, _) = setup(&temp_dir, IndexType::FlatL2);
        let drifted = SimilarTracks::new(temp_dir.path().join("tracks.index"), IndexType::FlatL2, 8);

        let err = drifted.find(&db, &[0.0; 8], 1, None).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ConfigDimensionDrift {
                configured: 8,
                indexed: 4
            }
        ));
    }

    #[test]
    fn test_index_type_drift_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let (db, _) = setup(&temp_dir, IndexType::Cosine);
        let drifted = SimilarTracks::new(temp_dir.path().join("tracks.index"), IndexType::FlatL2, 4);
        assert!(matches!(
            drifted.find(&db, &[1.0; 4], 1, None),
            Err(PipelineError::IndexTypeDrift { .. })
        ));
    }

    #[test]
    fn test_missing_index() {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::open_in_memory().unwrap();
        let similar = SimilarTracks::new(temp_dir.path().join("none.index"), IndexType::FlatL2, 4);
        let err = similar.find(&db, &[0.0; 4], 1, None).unwrap_err();
        assert!(err.is_index_missing());
    }
}
