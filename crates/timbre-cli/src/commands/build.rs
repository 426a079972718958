use anyhow::Result;
use timbre_etl::{Config, IndexBuildPipeline};

use super::open_database;

pub fn run_build(config: &Config) -> Result<()> {
    log::info!("Starting index build");

    let pipeline = IndexBuildPipeline::from_config(config)?;
    let db = open_database(config)?;

    let report = pipeline.run(&db)?;

    println!("\nEmbeddings");
    println!("  Categories: {}", report.categories.join(", "));
    println!("  Loaded files: {}", report.load.loaded);
    println!("  Skipped (wrong length): {}", report.load.skipped_shape);
    println!("  Skipped (unreadable): {}", report.load.skipped_unreadable);
    println!("  Skipped (bad track id): {}", report.load.skipped_bad_id);
    println!("  Skipped (duplicate track): {}", report.load.skipped_duplicate);
    for name in &report.load.missing_folders {
        println!("  ✗ Missing folder for '{name}'");
    }
    println!("  Tracks seen: {}", report.tracks_seen);
    println!("  Incomplete tracks: {}", report.incomplete_tracks);

    if report.built {
        println!(
            "\n✓ Built {} index: {} vectors of dimension {}",
            report.index_type, report.vector_count, report.dimension
        );
        println!("  Index: {}", report.index_path.display());
    } else {
        println!("\nNo complete tracks found; index not built");
    }

    Ok(())
}
