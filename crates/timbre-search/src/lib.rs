//! Vector search for timbre.
//!
//! Builds, persists and queries nearest-neighbor indices over combined
//! track embeddings. Three strategies are supported: exact Euclidean
//! (`FlatL2`), inverted-file approximate Euclidean (`IVFFlat`) and cosine
//! similarity over normalized vectors (`Cosine`).

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod builder;
pub mod distance;
pub mod engine;
pub mod error;
pub mod flat;
pub mod index;
pub mod ivf;
pub mod kmeans;
pub mod persist;

pub use builder::IndexBuilder;
pub use engine::SimilaritySearch;
pub use error::{SearchError, SearchResult};
pub use index::{IvfParams, Neighbor, VectorIndex};
