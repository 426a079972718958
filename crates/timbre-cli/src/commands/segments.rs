use anyhow::Result;
use std::path::Path;
use timbre_etl::concatenate_segmented_embeddings;

pub fn run_concat(source: &Path, destination: &Path) -> Result<()> {
    log::info!("Concatenating segments from {}", source.display());

    let report = concatenate_segmented_embeddings(source, destination)?;

    println!(
        "✓ Wrote {} track embeddings to {}",
        report.written.len(),
        destination.display()
    );
    if !report.empty_folders.is_empty() {
        println!("  {} folders had no readable segments", report.empty_folders.len());
    }
    if report.unreadable_segments > 0 {
        println!("  {} segment files could not be read", report.unreadable_segments);
    }

    Ok(())
}
