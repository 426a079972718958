use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use timbre_etl::Config;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "timbre", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the database (default: ~/.local/share/timbre/timbre.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Path to the config file (default: ~/.config/timbre/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Build the similarity index from embedding folders
    ///
    /// Loads one `.npy` embedding per track for every category enabled in
    /// the [combinator] section, concatenates them per track, and builds
    /// the index selected by faiss.index_type:
    ///
    /// - FlatL2: exact Euclidean search
    /// - IVFFlat: approximate Euclidean search over nlist partitions
    /// - Cosine: cosine similarity over normalized vectors
    ///
    /// Tracks missing any enabled category are left out. Files with the
    /// wrong length or a non-numeric name are skipped and counted.
    ///
    /// The index file is replaced atomically and the vector_metadata table
    /// is rewritten so every vector id maps back to its track.
    Build,
    /// Find tracks similar to a query embedding
    Search {
        /// `.npy` file holding the combined query embedding, or a
        /// (rows, dimension) matrix searched one row at a time
        query: PathBuf,

        /// Number of results (default: search.top_k)
        #[arg(long, short = 'k')]
        top_k: Option<usize>,

        /// Leave this track out of the results (e.g. the query track itself)
        #[arg(long)]
        exclude_track: Option<i64>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Concatenate per-segment embeddings into one file per track
    ConcatSegments {
        /// Folder with one subfolder of segment files per track
        source: PathBuf,

        /// Folder to write `<track>.npy` files into
        destination: PathBuf,
    },
    /// Show index and database status
    Status,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, clap::Subcommand)]
enum ConfigAction {
    /// Show the current effective configuration
    Show,
    /// Get a config value by dotted key (or print the whole file)
    Get {
        /// Key such as `faiss.index_type` or `combinator.emotion`
        key: Option<String>,
    },
    /// Set a config value in the config file
    Set {
        /// Key such as `faiss.index_type` or `combinator.emotion`
        key: String,
        value: String,
    },
    /// Show the config file path
    Path,
    /// Print an example config file
    Example,
    /// Create the config file with defaults
    Init,
}

fn init_logging(config: &Config) -> Result<()> {
    let level = match config.logging.level.to_ascii_lowercase().as_str() {
        "trace" => twyg::LogLevel::Trace,
        "debug" => twyg::LogLevel::Debug,
        "warn" | "warning" => twyg::LogLevel::Warn,
        "error" => twyg::LogLevel::Error,
        _ => twyg::LogLevel::Info,
    };
    let opts = twyg::OptsBuilder::new()
        .coloured(config.logging.coloured)
        .level(level)
        .build()
        .map_err(|e| anyhow::anyhow!("Invalid logging options: {e:?}"))?;
    twyg::setup(opts).map_err(|e| anyhow::anyhow!("Could not set up logging: {e:?}"))?;
    Ok(())
}

fn run_config(config_path: &Path, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => commands::config::show_config(config_path),
        ConfigAction::Get { key } => commands::config::get_config(config_path, key),
        ConfigAction::Set { key, value } => commands::config::set_config(config_path, &key, &value),
        ConfigAction::Path => commands::config::show_path(config_path),
        ConfigAction::Example => commands::config::show_example(),
        ConfigAction::Init => commands::config::init_config(config_path),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .unwrap_or_else(timbre_etl::config::config_file_path);

    // Config commands read and edit the file directly, without loading it.
    let command = match cli.command {
        Commands::Config { action } => return run_config(&config_path, action),
        command => command,
    };

    let mut config = Config::load_from(&config_path)?;
    if let Some(db) = cli.db {
        config = config.with_db_path(db);
    }
    init_logging(&config)?;

    match command {
        Commands::Build => commands::build::run_build(&config)?,
        Commands::Search {
            query,
            top_k,
            exclude_track,
            json,
        } => commands::search::run_search(&config, &query, top_k, exclude_track, json)?,
        Commands::ConcatSegments {
            source,
            destination,
        } => commands::segments::run_concat(&source, &destination)?,
        Commands::Status => commands::status::show_status(&config)?,
        Commands::Config { .. } => {}
    }

    Ok(())
}
