use anyhow::{Context, Result};
use std::path::Path;
use timbre_core::model::TrackId;
use timbre_etl::{npy, Config, SimilarTrack, SimilarTracks};

use super::open_database;

pub fn run_search(
    config: &Config,
    query_path: &Path,
    top_k: Option<usize>,
    exclude_track: Option<i64>,
    json: bool,
) -> Result<()> {
    let array = npy::read_array(query_path)?;
    let shape = array.shape.clone();
    let queries = array.into_rows().with_context(|| {
        format!(
            "Query {} has shape {:?}; expected one vector or a (rows, dimension) matrix",
            query_path.display(),
            shape
        )
    })?;
    let top_k = top_k.unwrap_or(config.search.top_k);

    let similar = SimilarTracks::from_config(config)?;
    let db = open_database(config)?;

    let rows = match similar.find_batch(&db, &queries, top_k, exclude_track.map(TrackId::new)) {
        Ok(rows) => rows,
        Err(e) if e.is_index_missing() => {
            anyhow::bail!("{e}\n\nRun 'timbre build' to create the index.");
        }
        Err(e) => return Err(e.into()),
    };

    // A 1-D query prints a single result list; a matrix prints one per row.
    let batch = shape.len() > 1;
    if json {
        let text = match rows.as_slice() {
            [single] if !batch => serde_json::to_string_pretty(single)?,
            _ => serde_json::to_string_pretty(&rows)?,
        };
        println!("{text}");
        return Ok(());
    }

    for (row, results) in rows.iter().enumerate() {
        if batch {
            println!("\nQuery row {}", row);
        }
        print_results(query_path, results);
    }

    Ok(())
}

fn print_results(query_path: &Path, results: &[SimilarTrack]) {
    if results.is_empty() {
        println!("No similar tracks found");
        return;
    }

    println!("\nSimilar tracks to {}\n", query_path.display());
    for result in results {
        let detail = &result.detail;
        println!(
            "  {:>2}. {} - {} [{}] (track {}, distance {:.4})",
            result.rank,
            detail.artist.as_deref().unwrap_or("<unknown artist>"),
            detail.title.as_deref().unwrap_or("<untitled>"),
            detail.album.as_deref().unwrap_or("<no album>"),
            detail.track_id,
            result.distance
        );
        let released = detail
            .released
            .map_or_else(|| "?".to_string(), |y| y.to_string());
        println!(
            "      released {}, genre {}",
            released,
            detail.genre.as_deref().unwrap_or("?")
        );
    }
}
