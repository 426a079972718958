use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Category names produced by the upstream classifiers, in their
/// conventional concatenation order.
pub const DEFAULT_CATEGORY_ORDER: &[&str] = &["genre", "instrument", "emotion"];

/// An embedding category: one classifier's output for every track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Category name, e.g. `genre`.
    pub name: String,

    /// Expected length of every embedding in this category.
    pub dimension: usize,

    /// Folder holding one embedding file per track.
    pub folder: PathBuf,
}

impl Category {
    #[must_use]
    pub fn new(name: impl Into<String>, dimension: usize, folder: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            dimension,
            folder: folder.into(),
        }
    }
}

/// The ordered set of enabled categories for one index build.
///
/// Order is the concatenation order of combined vectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySet {
    categories: Vec<Category>,
}

impl CategorySet {
    /// Build a category set, rejecting empty sets, duplicate names and
    /// zero dimensions.
    pub fn new(categories: Vec<Category>) -> Result<Self> {
        if categories.is_empty() {
            return Err(Error::InvalidData(
                "no embedding categories are enabled".to_string(),
            ));
        }
        for (i, category) in categories.iter().enumerate() {
            if category.dimension == 0 {
                return Err(Error::InvalidData(format!(
                    "category '{}' has dimension 0",
                    category.name
                )));
            }
            if categories[..i].iter().any(|c| c.name == category.name) {
                return Err(Error::InvalidData(format!(
                    "category '{}' is listed twice",
                    category.name
                )));
            }
        }
        Ok(Self { categories })
    }

    #[must_use]
    pub fn iter(&self) -> std::slice::Iter<'_, Category> {
        self.categories.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.name == name)
    }

    /// Category names in concatenation order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.categories.iter().map(|c| c.name.as_str()).collect()
    }

    /// Length of a combined vector: the sum of the enabled category
    /// dimensions.
    #[must_use]
    pub fn effective_dimension(&self) -> usize {
        self.categories.iter().map(|c| c.dimension).sum()
    }
}

impl<'a> IntoIterator for &'a CategorySet {
    type Item = &'a Category;
    type IntoIter = std::slice::Iter<'a, Category>;

    fn into_iter(self) -> Self::IntoIter {
        self.categories.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(name: &str, dimension: usize) -> Category {
        Category::new(name, dimension, format!("/embeddings/{name}"))
    }

    #[test]
    fn test_effective_dimension_all_three() {
        let set = CategorySet::new(vec![
            category("genre", 32),
            category("instrument", 32),
            category("emotion", 32),
        ])
        .unwrap();
        assert_eq!(set.effective_dimension(), 96);
        assert_eq!(set.names(), vec!["genre", "instrument", "emotion"]);
    }

    #[test]
    fn test_effective_dimension_single_non_genre_category() {
        let instrument_only = CategorySet::new(vec![category("instrument", 32)]).unwrap();
        assert_eq!(instrument_only.effective_dimension(), 32);

        let emotion_only = CategorySet::new(vec![category("emotion", 16)]).unwrap();
        assert_eq!(emotion_only.effective_dimension(), 16);
    }

    #[test]
    fn test_effective_dimension_mixed_dimensions() {
        let set = CategorySet::new(vec![category("genre", 8), category("emotion", 4)]).unwrap();
        assert_eq!(set.effective_dimension(), 12);
    }

    #[test]
    fn test_empty_set_rejected() {
        assert!(matches!(
            CategorySet::new(Vec::new()),
            Err(Error::InvalidData(_))
        ));
    }

    #[test]
    fn test_duplicate_and_zero_dimension_rejected() {
        assert!(CategorySet::new(vec![category("genre", 8), category("genre", 8)]).is_err());
        assert!(CategorySet::new(vec![category("genre", 0)]).is_err());
    }

    #[test]
    fn test_get_by_name() {
        let set = CategorySet::new(vec![category("genre", 8)]).unwrap();
        assert_eq!(set.get("genre").map(|c| c.dimension), Some(8));
        assert!(set.get("emotion").is_none());
    }
}
