use anyhow::{Context, Result};
use timbre_core::schema::Database;
use timbre_etl::Config;

pub mod build;
pub mod config;
pub mod search;
pub mod segments;
pub mod status;

/// Open the configured database, creating its directory if needed.
pub fn open_database(config: &Config) -> Result<Database> {
    let db_path = &config.database.path;
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Database::open_with_timeout(db_path, config.database.busy_timeout())
        .with_context(|| format!("Failed to open database {}", db_path.display()))
}
