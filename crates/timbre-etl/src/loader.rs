//! Load per-category embedding files from disk.

use serde::Serialize;
use std::collections::HashSet;
use std::ops::AddAssign;
use std::path::Path;
use timbre_core::model::{Category, CategorySet, EmbeddingSet, TrackId};
use walkdir::WalkDir;

use crate::npy;

/// What happened to the files seen during a load.
///
/// Skips are not errors, but they are counted so data loss is visible.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Embeddings accepted.
    pub loaded: usize,
    /// Files whose element count differs from the category dimension.
    pub skipped_shape: usize,
    /// Files that could not be read or parsed.
    pub skipped_unreadable: usize,
    /// Files whose name is not a decimal track id.
    pub skipped_bad_id: usize,
    /// Files naming a track already loaded for the same category
    /// (`1.npy` after `001.npy`).
    pub skipped_duplicate: usize,
    /// Category folders that do not exist.
    pub missing_folders: Vec<String>,
}

impl LoadReport {
    /// Total number of files that were dropped.
    pub fn skipped(&self) -> usize {
        self.skipped_shape + self.skipped_unreadable + self.skipped_bad_id + self.skipped_duplicate
    }
}

impl AddAssign for LoadReport {
    fn add_assign(&mut self, other: Self) {
        self.loaded += other.loaded;
        self.skipped_shape += other.skipped_shape;
        self.skipped_unreadable += other.skipped_unreadable;
        self.skipped_bad_id += other.skipped_bad_id;
        self.skipped_duplicate += other.skipped_duplicate;
        self.missing_folders.extend(other.missing_folders);
    }
}

fn is_npy_file(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case("npy"))
}

/// Load every embedding of one category.
///
/// Files are visited in name order so repeated loads of the same folder
/// yield the same sequence. When several files name the same track, the
/// first one accepted wins. A missing folder is logged and yields nothing.
pub fn load_category(category: &Category) -> (Vec<(TrackId, Vec<f32>)>, LoadReport) {
    let mut report = LoadReport::default();
    let mut records = Vec::new();
    let mut seen: HashSet<TrackId> = HashSet::new();

    if !category.folder.is_dir() {
        log::error!(
            "Error: Folder {} not found for category '{}'",
            category.folder.display(),
            category.name
        );
        report.missing_folders.push(category.name.clone());
        return (records, report);
    }

    for entry in WalkDir::new(&category.folder)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Skipping entry in {}: {}", category.folder.display(), e);
                report.skipped_unreadable += 1;
                continue;
            }
        };
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let Some(track_id) = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(TrackId::from_file_stem)
            .filter(|_| is_npy_file(path))
        else {
            log::warn!("Skipping {}: name is not a track id", path.display());
            report.skipped_bad_id += 1;
            continue;
        };

        let values = match npy::read_f32(path) {
            Ok(values) => values,
            Err(e) => {
                log::warn!("Skipping {}: {}", path.display(), e);
                report.skipped_unreadable += 1;
                continue;
            }
        };

        if values.len() != category.dimension {
            log::debug!(
                "Skipping {}: {} values, expected {}",
                path.display(),
                values.len(),
                category.dimension
            );
            report.skipped_shape += 1;
            continue;
        }

        if !seen.insert(track_id) {
            log::warn!(
                "Skipping {}: track {} already loaded for '{}'",
                path.display(),
                track_id,
                category.name
            );
            report.skipped_duplicate += 1;
            continue;
        }

        records.push((track_id, values));
        report.loaded += 1;
    }

    log::info!(
        "Loaded {} '{}' embeddings ({} skipped)",
        report.loaded,
        category.name,
        report.skipped()
    );
    (records, report)
}

/// Load every enabled category into one set keyed by track.
///
/// Tracks keep the order in which they were first seen, category by
/// category.
pub fn load_embeddings(categories: &CategorySet) -> (EmbeddingSet, LoadReport) {
    let mut set = EmbeddingSet::new();
    let mut report = LoadReport::default();

    for category in categories {
        let (records, category_report) = load_category(category);
        for (track_id, values) in records {
            set.insert(track_id, category.name.as_str(), values);
        }
        report += category_report;
    }

    (set, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, values: &[f32]) {
        npy::write_f32(&dir.join(name), values).unwrap();
    }

    #[test]
    fn test_missing_folder_yields_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let category = Category::new("genre", 4, temp_dir.path().join("absent"));
        let (records, report) = load_category(&category);

        assert!(records.is_empty());
        assert_eq!(report.missing_folders, vec!["genre".to_string()]);
    }

    #[test]
    fn test_skips_are_counted() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        write(dir, "2.npy", &[0.0, 1.0, 0.0, 1.0]);
        write(dir, "001.npy", &[1.0, 0.0, 0.0, 1.0]);
        write(dir, "3.npy", &[1.0, 2.0]);
        write(dir, "track.npy", &[1.0, 2.0, 3.0, 4.0]);
        fs::write(dir.join("4.npy"), b"broken").unwrap();

        let category = Category::new("genre", 4, dir);
        let (records, report) = load_category(&category);

        let ids: Vec<i64> = records.iter().map(|(id, _)| id.get()).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(report.loaded, 2);
        assert_eq!(report.skipped_shape, 1);
        assert_eq!(report.skipped_unreadable, 1);
        assert_eq!(report.skipped_bad_id, 1);
        assert_eq!(report.skipped(), 3);
    }

    #[test]
    fn test_padded_names_for_one_track_keep_the_first() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        write(dir, "001.npy", &[9.0, 9.0]);
        write(dir, "1.npy", &[1.0, 1.0]);
        write(dir, "2.npy", &[2.0, 2.0]);

        let category = Category::new("genre", 2, dir);
        let (records, report) = load_category(&category);

        assert_eq!(
            records,
            vec![
                (TrackId::new(1), vec![9.0, 9.0]),
                (TrackId::new(2), vec![2.0, 2.0]),
            ]
        );
        assert_eq!(report.loaded, 2);
        assert_eq!(report.skipped_duplicate, 1);
        assert_eq!(report.skipped(), 1);
    }

    #[test]
    fn test_unreadable_first_copy_does_not_shadow_a_good_one() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        fs::write(dir.join("001.npy"), b"broken").unwrap();
        write(dir, "1.npy", &[1.0, 1.0]);

        let category = Category::new("genre", 2, dir);
        let (records, report) = load_category(&category);

        assert_eq!(records, vec![(TrackId::new(1), vec![1.0, 1.0])]);
        assert_eq!(report.skipped_unreadable, 1);
        assert_eq!(report.skipped_duplicate, 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_broken_entries_are_counted() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        write(dir, "1.npy", &[1.0, 1.0]);
        std::os::unix::fs::symlink(dir.join("gone.npy"), dir.join("2.npy")).unwrap();

        let category = Category::new("genre", 2, dir);
        let (records, report) = load_category(&category);

        assert_eq!(records.len(), 1);
        assert_eq!(report.skipped_unreadable, 1);
    }

    #[test]
    fn test_load_embeddings_groups_by_track() {
        let temp_dir = TempDir::new().unwrap();
        let genre = temp_dir.path().join("genre");
        let mood = temp_dir.path().join("mood");
        fs::create_dir_all(&genre).unwrap();
        fs::create_dir_all(&mood).unwrap();
        write(&genre, "1.npy", &[1.0, 1.0]);
        write(&genre, "2.npy", &[2.0, 2.0]);
        write(&mood, "2.npy", &[0.2]);
        write(&mood, "5.npy", &[0.5]);

        let categories = CategorySet::new(vec![
            Category::new("genre", 2, &genre),
            Category::new("mood", 1, &mood),
        ])
        .unwrap();
        let (set, report) = load_embeddings(&categories);

        assert_eq!(report.loaded, 4);
        let ids: Vec<i64> = set.iter().map(|t| t.track_id.get()).collect();
        assert_eq!(ids, vec![1, 2, 5]);
        let two = set.get(TrackId::new(2)).unwrap();
        assert_eq!(two.get("genre"), Some(&[2.0, 2.0][..]));
        assert_eq!(two.get("mood"), Some(&[0.2][..]));
    }
}
