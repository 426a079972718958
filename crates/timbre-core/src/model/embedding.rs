use std::collections::{BTreeMap, HashMap};

use crate::model::ids::TrackId;

/// The per-category embeddings loaded for one track.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackEmbedding {
    pub track_id: TrackId,

    /// Category name to embedding values.
    pub embeddings: BTreeMap<String, Vec<f32>>,
}

impl TrackEmbedding {
    #[must_use]
    pub fn new(track_id: TrackId) -> Self {
        Self {
            track_id,
            embeddings: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn get(&self, category: &str) -> Option<&[f32]> {
        self.embeddings.get(category).map(Vec::as_slice)
    }

    #[must_use]
    pub fn has(&self, category: &str) -> bool {
        self.embeddings.contains_key(category)
    }
}

/// Every track embedding loaded for a build, kept in first-seen order.
///
/// First-seen order drives vector id assignment, so it must be stable
/// for the same input folders.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingSet {
    order: Vec<TrackId>,
    tracks: HashMap<TrackId, TrackEmbedding>,
}

impl EmbeddingSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an embedding for a track. A second embedding for the same
    /// track and category replaces the first.
    pub fn insert(&mut self, track_id: TrackId, category: impl Into<String>, values: Vec<f32>) {
        let entry = self.tracks.entry(track_id).or_insert_with(|| {
            self.order.push(track_id);
            TrackEmbedding::new(track_id)
        });
        entry.embeddings.insert(category.into(), values);
    }

    #[must_use]
    pub fn get(&self, track_id: TrackId) -> Option<&TrackEmbedding> {
        self.tracks.get(&track_id)
    }

    /// Tracks in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = &TrackEmbedding> {
        self.order.iter().filter_map(|id| self.tracks.get(id))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// The concatenation of a track's enabled-category embeddings.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedVector {
    pub track_id: TrackId,
    pub values: Vec<f32>,
}

impl CombinedVector {
    #[must_use]
    pub fn new(track_id: TrackId, values: Vec<f32>) -> Self {
        Self { track_id, values }
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.values.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_keeps_first_seen_order() {
        let mut set = EmbeddingSet::new();
        set.insert(TrackId::new(7), "genre", vec![1.0]);
        set.insert(TrackId::new(3), "genre", vec![2.0]);
        set.insert(TrackId::new(7), "instrument", vec![3.0]);

        let order: Vec<i64> = set.iter().map(|t| t.track_id.get()).collect();
        assert_eq!(order, vec![7, 3]);
        assert_eq!(set.len(), 2);

        let seven = set.get(TrackId::new(7)).unwrap();
        assert!(seven.has("genre"));
        assert_eq!(seven.get("instrument"), Some(&[3.0][..]));
    }

    #[test]
    fn test_insert_replaces_same_category() {
        let mut set = EmbeddingSet::new();
        set.insert(TrackId::new(1), "genre", vec![1.0, 1.0]);
        set.insert(TrackId::new(1), "genre", vec![2.0, 2.0]);
        assert_eq!(
            set.get(TrackId::new(1)).unwrap().get("genre"),
            Some(&[2.0, 2.0][..])
        );
    }
}
