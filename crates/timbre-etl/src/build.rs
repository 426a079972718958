//! The index build pipeline: load, combine, build, persist, record.

use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use timbre_core::model::{CategorySet, IndexBuild, IndexType, VectorMetadataRow};
use timbre_core::schema::Database;
use timbre_search::persist::save_index;
use timbre_search::{IndexBuilder, IvfParams};

use crate::combinator::combine;
use crate::config::Config;
use crate::error::PipelineResult;
use crate::loader::{load_embeddings, LoadReport};

/// Outcome of one build run.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    /// `false` when there was nothing to index.
    pub built: bool,
    pub index_type: IndexType,
    pub dimension: usize,
    pub categories: Vec<String>,
    /// Distinct tracks with at least one embedding.
    pub tracks_seen: usize,
    /// Tracks dropped for lacking an enabled category.
    pub incomplete_tracks: usize,
    /// Vectors in the index, equal to the metadata rows written.
    pub vector_count: usize,
    pub index_path: PathBuf,
    pub load: LoadReport,
}

/// Rebuilds the index file and its metadata table from embedding folders.
#[derive(Debug, Clone)]
pub struct IndexBuildPipeline {
    categories: CategorySet,
    index_type: IndexType,
    ivf_params: IvfParams,
    index_path: PathBuf,
}

impl IndexBuildPipeline {
    #[must_use]
    pub fn new(categories: CategorySet, index_type: IndexType, index_path: impl Into<PathBuf>) -> Self {
        Self {
            categories,
            index_type,
            ivf_params: IvfParams::default(),
            index_path: index_path.into(),
        }
    }

    pub fn from_config(config: &Config) -> PipelineResult<Self> {
        Ok(Self::new(
            config.enabled_categories()?,
            config.faiss.index_type,
            &config.paths.index_path,
        )
        .ivf_params(config.ivf_params()))
    }

    #[must_use]
    pub fn ivf_params(mut self, params: IvfParams) -> Self {
        self.ivf_params = params;
        self
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Run the whole build.
    ///
    /// With no complete tracks the run is skipped: the existing index file
    /// and metadata are left untouched and `built` is `false`.
    pub fn run(&self, db: &Database) -> PipelineResult<BuildReport> {
        let dimension = self.categories.effective_dimension();
        log::info!(
            "Building {} index over [{}] ({} dimensions)",
            self.index_type,
            self.categories.names().join(", "),
            dimension
        );

        let (set, load) = load_embeddings(&self.categories);
        let vectors = combine(&set, &self.categories);

        let mut report = BuildReport {
            built: false,
            index_type: self.index_type,
            dimension,
            categories: self.categories.names().iter().map(|s| s.to_string()).collect(),
            tracks_seen: set.len(),
            incomplete_tracks: set.len() - vectors.len(),
            vector_count: 0,
            index_path: self.index_path.clone(),
            load,
        };

        let Some(index) = IndexBuilder::new(self.index_type, dimension)
            .ivf_params(self.ivf_params)
            .build(&vectors)?
        else {
            return Ok(report);
        };

        save_index(&index, &self.index_path)?;

        let rows = VectorMetadataRow::for_vectors(&vectors, self.index_type);
        let written = db.replace_vector_metadata(&rows)?;
        log::info!("Wrote {} vector metadata rows", written);

        db.record_index_build(&IndexBuild {
            built_at: Utc::now(),
            index_type: self.index_type,
            vector_dimensions: dimension,
            vector_count: index.len(),
            categories: report.categories.clone(),
            skipped_files: report.load.skipped(),
        })?;

        report.built = true;
        report.vector_count = index.len();
        Ok(report)
    }
}
