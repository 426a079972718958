//! Embedding pipelines for timbre.
//!
//! Loads per-category track embeddings, combines them into one vector per
//! track, builds and persists the similarity index with its metadata, and
//! answers similar-track queries against it.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod build;
pub mod combinator;
pub mod config;
pub mod error;
pub mod loader;
pub mod npy;
pub mod query;
pub mod segments;

pub use build::{BuildReport, IndexBuildPipeline};
pub use combinator::combine;
pub use config::Config;
pub use error::{PipelineError, PipelineResult};
pub use loader::{load_category, load_embeddings, LoadReport};
pub use query::{SimilarTrack, SimilarTracks};
pub use segments::{concatenate_segmented_embeddings, SegmentReport};
