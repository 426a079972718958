use anyhow::Result;
use timbre_etl::{Config, SimilarTracks};

use super::open_database;

pub fn show_status(config: &Config) -> Result<()> {
    let db = open_database(config)?;

    println!("\n📊 Timbre Status\n");
    println!("  Database: {}", config.database.path.display());
    println!("  Vector metadata rows: {}", db.count_vector_metadata()?);

    match config.enabled_categories() {
        Ok(categories) => println!(
            "  Configured: {} over [{}], {} dimensions",
            config.faiss.index_type,
            categories.names().join(", "),
            categories.effective_dimension()
        ),
        Err(e) => println!("  Configured: {e}"),
    }

    println!("  Index: {}", config.paths.index_path.display());
    match SimilarTracks::from_config(config).and_then(|s| s.open_index()) {
        Ok(engine) => println!(
            "    {} index with {} vectors of dimension {}",
            engine.index_type(),
            engine.len(),
            engine.dimension()
        ),
        Err(e) if e.is_index_missing() => {
            println!("    not built");
            println!("\n  Run `timbre build` to create the index");
        }
        Err(e) => println!("    ✗ {e}"),
    }

    if let Some(build) = db.latest_index_build()? {
        println!(
            "  Last build: {} ({} vectors, {} skipped files)",
            build.built_at.format("%Y-%m-%d %H:%M:%S UTC"),
            build.vector_count,
            build.skipped_files
        );
    }

    Ok(())
}
