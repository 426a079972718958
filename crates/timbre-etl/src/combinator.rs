//! Concatenate per-category embeddings into one vector per track.

use timbre_core::model::{CategorySet, CombinedVector, EmbeddingSet};

/// Combine each track's embeddings in category order.
///
/// A track is kept only if it has an embedding for every enabled category;
/// nothing is zero-filled. Output order is the set's first-seen track order,
/// and each vector carries its own track id so the two can never drift
/// apart.
pub fn combine(set: &EmbeddingSet, categories: &CategorySet) -> Vec<CombinedVector> {
    let dimension = categories.effective_dimension();
    let mut vectors = Vec::with_capacity(set.len());
    let mut incomplete = 0usize;

    for track in set.iter() {
        let mut values = Vec::with_capacity(dimension);
        let complete = categories.iter().all(|category| match track.get(&category.name) {
            Some(embedding) => {
                values.extend_from_slice(embedding);
                true
            }
            None => false,
        });

        if complete {
            vectors.push(CombinedVector::new(track.track_id, values));
        } else {
            log::debug!("Track {} lacks an enabled category, skipped", track.track_id);
            incomplete += 1;
        }
    }

    log::info!(
        "Embeddings concatenated for categories [{}]: {} vectors, {} incomplete tracks",
        categories.names().join(", "),
        vectors.len(),
        incomplete
    );
    vectors
}

#[cfg(test)]
mod tests {
    use super::*;
    use timbre_core::model::{Category, TrackId};

    fn categories(names: &[(&str, usize)]) -> CategorySet {
        CategorySet::new(
            names
                .iter()
                .map(|(name, dim)| Category::new(*name, *dim, format!("/e/{name}")))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_concatenates_in_category_order() {
        let mut set = EmbeddingSet::new();
        set.insert(TrackId::new(7), "emotion", vec![9.0]);
        set.insert(TrackId::new(7), "genre", vec![1.0, 2.0]);

        let vectors = combine(&set, &categories(&[("genre", 2), ("emotion", 1)]));
        assert_eq!(vectors, vec![CombinedVector::new(TrackId::new(7), vec![1.0, 2.0, 9.0])]);
    }

    #[test]
    fn test_incomplete_tracks_are_excluded() {
        let mut set = EmbeddingSet::new();
        set.insert(TrackId::new(1), "genre", vec![1.0]);
        set.insert(TrackId::new(1), "instrument", vec![1.5]);
        set.insert(TrackId::new(2), "genre", vec![2.0]);
        set.insert(TrackId::new(3), "genre", vec![3.0]);
        set.insert(TrackId::new(3), "instrument", vec![3.5]);

        let vectors = combine(&set, &categories(&[("genre", 1), ("instrument", 1)]));
        let ids: Vec<i64> = vectors.iter().map(|v| v.track_id.get()).collect();
        assert_eq!(ids, vec![1, 3]);
        assert!(vectors.iter().all(|v| v.dimension() == 2));
    }

    #[test]
    fn test_disabled_categories_are_ignored() {
        let mut set = EmbeddingSet::new();
        set.insert(TrackId::new(4), "genre", vec![4.0, 4.0]);
        set.insert(TrackId::new(4), "emotion", vec![0.4]);

        let vectors = combine(&set, &categories(&[("genre", 2)]));
        assert_eq!(vectors[0].values, vec![4.0, 4.0]);
    }
}
