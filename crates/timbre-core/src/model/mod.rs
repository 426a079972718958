pub mod category;
pub mod embedding;
pub mod ids;
pub mod metadata;

pub use category::{Category, CategorySet, DEFAULT_CATEGORY_ORDER};
pub use embedding::{CombinedVector, EmbeddingSet, TrackEmbedding};
pub use ids::{TrackId, VectorId};
pub use metadata::{IndexBuild, IndexType, TrackDetail, VectorMetadataRow};
