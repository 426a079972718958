//! Join per-segment embeddings into one file per track.
//!
//! Embedding extraction can emit one `.npy` per audio segment, grouped in a
//! subfolder per track. This flattens each subfolder into `<track>.npy`.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::PipelineResult;
use crate::npy;

/// Files written and folders skipped by [`concatenate_segmented_embeddings`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SegmentReport {
    pub written: Vec<PathBuf>,
    /// Subfolders with no readable segment.
    pub empty_folders: Vec<PathBuf>,
    /// Segment files that could not be read.
    pub unreadable_segments: usize,
}

/// Concatenate the segments in each subfolder of `source` into
/// `destination/<subfolder>.npy`.
///
/// Segments are joined in file name order. `destination` is created when
/// missing. Unreadable segments are logged and left out.
pub fn concatenate_segmented_embeddings(
    source: &Path,
    destination: &Path,
) -> PipelineResult<SegmentReport> {
    fs::create_dir_all(destination)?;
    let mut report = SegmentReport::default();

    for entry in WalkDir::new(source)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let folder = entry.path();

        let mut joined: Vec<f32> = Vec::new();
        let mut segments = 0usize;
        for segment in WalkDir::new(folder)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name()
        {
            let segment = match segment {
                Ok(segment) => segment,
                Err(e) => {
                    log::warn!("Skipping entry in {}: {}", folder.display(), e);
                    report.unreadable_segments += 1;
                    continue;
                }
            };
            if !segment.file_type().is_file() {
                continue;
            }
            match npy::read_f32(segment.path()) {
                Ok(values) => {
                    joined.extend(values);
                    segments += 1;
                }
                Err(e) => {
                    log::warn!("Failed to load {}: {}", segment.path().display(), e);
                    report.unreadable_segments += 1;
                }
            }
        }

        if segments == 0 {
            log::warn!("No embeddings files found in {}", folder.display());
            report.empty_folders.push(folder.to_path_buf());
            continue;
        }

        let output = destination.join(format!("{}.npy", entry.file_name().to_string_lossy()));
        npy::write_f32(&output, &joined)?;
        log::info!(
            "Saved {} concatenated segments to {}",
            segments,
            output.display()
        );
        report.written.push(output);
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_concatenates_in_name_order() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("segments");
        let track = source.join("000123");
        fs::create_dir_all(&track).unwrap();
        npy::write_f32(&track.join("seg_1.npy"), &[3.0, 4.0]).unwrap();
        npy::write_f32(&track.join("seg_0.npy"), &[1.0, 2.0]).unwrap();
        fs::write(track.join("seg_2.npy"), b"junk").unwrap();
        fs::create_dir_all(source.join("empty")).unwrap();
        fs::write(source.join("stray.txt"), b"ignored").unwrap();

        let destination = temp_dir.path().join("out");
        let report = concatenate_segmented_embeddings(&source, &destination).unwrap();

        let output = destination.join("000123.npy");
        assert_eq!(report.written, vec![output.clone()]);
        assert_eq!(report.empty_folders, vec![source.join("empty")]);
        assert_eq!(report.unreadable_segments, 1);
        assert_eq!(npy::read_f32(&output).unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[cfg(unix)]
    #[test]
    fn test_broken_segment_entries_are_counted() {
        let temp_dir = TempDir::new().unwrap();
        let track = temp_dir.path().join("segments").join("7");
        fs::create_dir_all(&track).unwrap();
        npy::write_f32(&track.join("seg_0.npy"), &[1.0]).unwrap();
        std::os::unix::fs::symlink(track.join("gone.npy"), track.join("seg_1.npy")).unwrap();

        let destination = temp_dir.path().join("out");
        let report =
            concatenate_segmented_embeddings(&temp_dir.path().join("segments"), &destination)
                .unwrap();

        assert_eq!(report.unreadable_segments, 1);
        assert_eq!(npy::read_f32(&destination.join("7.npy")).unwrap(), vec![1.0]);
    }

    #[test]
    fn test_missing_source_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let result =
            concatenate_segmented_embeddings(&temp_dir.path().join("absent"), temp_dir.path());
        assert!(result.is_err());
    }
}
