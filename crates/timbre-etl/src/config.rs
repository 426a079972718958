use anyhow::{Context, Result};
use confyg::{env, Confygery};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use timbre_core::model::{Category, CategorySet, IndexType, DEFAULT_CATEGORY_ORDER};
use timbre_search::IvfParams;

use crate::error::{PipelineError, PipelineResult};

/// Configuration for timbre.
///
/// Configuration is loaded from multiple sources with the following priority:
/// 1. CLI arguments (highest priority)
/// 2. Environment variables (TIMBRE_* prefix)
/// 3. Config file (~/.config/timbre/config.toml)
/// 4. Built-in defaults (lowest priority)
///
/// It is read once per process and not modified during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Index parameters. The section keeps its historical name.
    #[serde(default)]
    pub faiss: IndexConfig,

    /// Which embedding categories are concatenated into the index.
    #[serde(default = "default_combinator")]
    pub combinator: BTreeMap<String, bool>,

    /// Concatenation order. Enabled categories missing from this list are
    /// appended in name order.
    #[serde(default)]
    pub category_order: Option<Vec<String>>,

    /// Per-category dimension overrides of `faiss.dimension`.
    #[serde(default)]
    pub dimensions: BTreeMap<String, usize>,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            faiss: IndexConfig::default(),
            combinator: default_combinator(),
            category_order: None,
            dimensions: BTreeMap::new(),
            paths: PathsConfig::default(),
            database: DatabaseConfig::default(),
            search: SearchConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Length of each category's embedding.
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    #[serde(default)]
    pub index_type: IndexType,

    /// IVF partitions.
    #[serde(default = "default_nlist")]
    pub nlist: usize,

    /// IVF partitions scanned per query.
    #[serde(default = "default_nprobe")]
    pub nprobe: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dimension: default_dimension(),
            index_type: IndexType::default(),
            nlist: default_nlist(),
            nprobe: default_nprobe(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Where the built index is stored.
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,

    /// Category name to the folder of its `.npy` files.
    #[serde(default)]
    pub embeddings: BTreeMap<String, PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            index_path: default_index_path(),
            embeddings: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database.
    ///
    /// Can be set via:
    /// - CLI: --db /path/to/db
    /// - ENV: TIMBRE_DATABASE_PATH
    /// - Default: ~/.local/share/timbre/timbre.db
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_busy_timeout_secs")]
    pub busy_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_secs: default_busy_timeout_secs(),
        }
    }
}

impl DatabaseConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_secs(self.busy_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_coloured")]
    pub coloured: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            coloured: default_coloured(),
        }
    }
}

impl Config {
    /// Load configuration from the default file and environment variables.
    ///
    /// Searches for config file at: ~/.config/timbre/config.toml
    /// Reads environment variables with TIMBRE_ prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from `path` (if it exists) and the environment.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let mut builder = Confygery::new().context("Failed to create config builder")?;

        if config_path.exists() {
            let path_str = config_path
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("Config path contains invalid UTF-8"))?;
            builder
                .add_file(path_str)
                .context("Failed to load config file")?;
        }

        let env_opts = env::Options::with_top_level("timbre");
        builder
            .add_env(env_opts)
            .context("Failed to load environment variables")?;

        let config: Self = builder.build().context("Failed to build configuration")?;
        Ok(config)
    }

    /// Parse configuration from TOML text, without the environment.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("Failed to parse configuration")
    }

    /// Load configuration with a custom database path.
    ///
    /// This is used when the --db CLI flag is provided.
    pub fn with_db_path(mut self, db_path: PathBuf) -> Self {
        self.database.path = db_path;
        self
    }

    /// The enabled categories in concatenation order.
    ///
    /// Fails when nothing is enabled.
    pub fn enabled_categories(&self) -> PipelineResult<CategorySet> {
        let enabled = |name: &str| self.combinator.get(name).copied().unwrap_or(false);

        let mut names: Vec<String> = match &self.category_order {
            Some(order) => order.clone(),
            None => DEFAULT_CATEGORY_ORDER.iter().map(|s| s.to_string()).collect(),
        };
        names.retain(|name| enabled(name));
        for (name, &on) in &self.combinator {
            if on && !names.contains(name) {
                names.push(name.clone());
            }
        }

        let categories = names
            .into_iter()
            .map(|name| {
                let dimension = self
                    .dimensions
                    .get(&name)
                    .copied()
                    .unwrap_or(self.faiss.dimension);
                let folder = self
                    .paths
                    .embeddings
                    .get(&name)
                    .cloned()
                    .unwrap_or_else(|| default_embeddings_dir().join(&name));
                Category::new(name, dimension, folder)
            })
            .collect();

        CategorySet::new(categories).map_err(|e| PipelineError::Config(e.to_string()))
    }

    /// Length of a combined vector under this configuration.
    pub fn effective_dimension(&self) -> PipelineResult<usize> {
        Ok(self.enabled_categories()?.effective_dimension())
    }

    pub fn ivf_params(&self) -> IvfParams {
        IvfParams {
            nlist: self.faiss.nlist,
            nprobe: self.faiss.nprobe,
            ..IvfParams::default()
        }
    }
}

fn default_combinator() -> BTreeMap<String, bool> {
    DEFAULT_CATEGORY_ORDER
        .iter()
        .map(|name| (name.to_string(), *name == "genre"))
        .collect()
}

fn default_dimension() -> usize {
    32
}

fn default_nlist() -> usize {
    IvfParams::default().nlist
}

fn default_nprobe() -> usize {
    IvfParams::default().nprobe
}

fn default_top_k() -> usize {
    5
}

fn default_busy_timeout_secs() -> u64 {
    timbre_core::schema::db::DEFAULT_BUSY_TIMEOUT.as_secs()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_coloured() -> bool {
    true
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("timbre")
}

/// Get the default database path.
///
/// Returns: ~/.local/share/timbre/timbre.db (or platform equivalent)
fn default_db_path() -> PathBuf {
    data_dir().join("timbre.db")
}

fn default_index_path() -> PathBuf {
    data_dir().join("tracks.index")
}

fn default_embeddings_dir() -> PathBuf {
    data_dir().join("embeddings")
}

/// Get the config file path.
///
/// Returns:
/// - Linux: ~/.config/timbre/config.toml
/// - macOS: ~/Library/Application Support/timbre/config.toml
/// - Windows: %APPDATA%\timbre\config.toml
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("timbre")
        .join("config.toml")
}

/// Get the example config file content.
pub fn example_config() -> &'static str {
    r#"# Timbre Configuration File
#
# Configuration is loaded from multiple sources with the following priority:
# 1. CLI arguments (highest priority)
# 2. Environment variables (TIMBRE_* prefix)
# 3. This config file
# 4. Built-in defaults (lowest priority)

[faiss]
# Length of each category's embedding vector
dimension = 32
# FlatL2 (exact), IVFFlat (approximate) or Cosine (similarity)
index_type = "FlatL2"
# IVFFlat only: number of partitions and partitions searched per query
nlist = 100
nprobe = 1

# Categories concatenated into each track's vector. A track is indexed only
# when it has an embedding for every enabled category.
[combinator]
genre = true
instrument = false
emotion = false

# Optional concatenation order and per-category dimensions
#category_order = ["genre", "instrument", "emotion"]
#[dimensions]
#emotion = 16

[paths]
#index_path = "/path/to/tracks.index"

[paths.embeddings]
#genre = "/path/to/embeddings/genre"
#instrument = "/path/to/embeddings/instrument"
#emotion = "/path/to/embeddings/emotion"

[database]
# Can also be set via:
# - CLI: timbre --db /custom/path.db build
# - Environment: TIMBRE_DATABASE_PATH=/custom/path.db
#path = "/path/to/custom/timbre.db"
busy_timeout_secs = 5

[search]
top_k = 5

[logging]
level = "info"
coloured = true
"#
}

/// Create the config file at `config_path` with the example contents if it
/// doesn't exist.
///
/// Returns true if a new file was created, false if it already existed.
pub fn ensure_config_file_at(config_path: &Path) -> Result<bool> {
    if config_path.exists() {
        return Ok(false);
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    std::fs::write(config_path, example_config()).context("Failed to write config file")?;

    Ok(true)
}
