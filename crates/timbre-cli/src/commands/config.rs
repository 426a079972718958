use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use timbre_etl::{config, Config};
use toml_edit::{DocumentMut, Item, Table};

/// Top-level keys accepted by `config set`.
const SECTIONS: &[&str] = &[
    "faiss",
    "combinator",
    "category_order",
    "dimensions",
    "paths",
    "database",
    "search",
    "logging",
];

/// Flatten the effective configuration into dotted keys.
fn flatten(config: &Config) -> Result<BTreeMap<String, String>> {
    fn walk(prefix: &str, value: &Value, out: &mut BTreeMap<String, String>) {
        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    let path = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{prefix}.{key}")
                    };
                    walk(&path, child, out);
                }
            }
            Value::String(s) => {
                out.insert(prefix.to_string(), s.clone());
            }
            Value::Null => {
                out.insert(prefix.to_string(), "<not set>".to_string());
            }
            other => {
                out.insert(prefix.to_string(), other.to_string());
            }
        }
    }

    let value = serde_json::to_value(config).context("Failed to serialize configuration")?;
    let mut out = BTreeMap::new();
    walk("", &value, &mut out);
    Ok(out)
}

/// Show the current effective configuration.
pub fn show_config(config_path: &Path) -> Result<()> {
    let config = Config::load_from(config_path)?;

    println!("Current Configuration");
    println!("=====================\n");

    println!("Config file: {}", config_path.display());
    let exists = config_path.exists();
    println!("File exists: {}\n", if exists { "yes" } else { "no (using defaults)" });

    println!("Settings:");
    for (key, value) in flatten(&config)? {
        println!("  {key}: {value}");
    }

    match config.enabled_categories() {
        Ok(categories) => println!(
            "\nEnabled categories: {} ({} dimensions)",
            categories.names().join(", "),
            categories.effective_dimension()
        ),
        Err(e) => println!("\nEnabled categories: {e}"),
    }

    println!("\nPriority: CLI args > ENV vars (TIMBRE_*) > Config file > Defaults");

    Ok(())
}

/// Get a specific config value.
pub fn get_config(config_path: &Path, key: Option<String>) -> Result<()> {
    if let Some(key) = key {
        let config = Config::load_from(config_path)?;
        let values = flatten(&config)?;

        if let Some(value) = values.get(&key) {
            println!("{value}");
        } else {
            let valid: Vec<&str> = values.keys().map(String::as_str).collect();
            anyhow::bail!(
                "Unknown config key: {}\n\nValid keys: {}",
                key,
                valid.join(", ")
            );
        }
    } else if config_path.exists() {
        let contents =
            std::fs::read_to_string(config_path).context("Failed to read config file")?;
        print!("{}", contents);
    } else {
        println!("Config file does not exist: {}", config_path.display());
        println!("\nRun 'timbre config init' to create it.");
    }

    Ok(())
}

/// Parse a command-line value into the most specific TOML type.
fn parse_value(raw: &str) -> toml_edit::Value {
    if let Ok(b) = raw.parse::<bool>() {
        return b.into();
    }
    if let Ok(i) = raw.parse::<i64>() {
        return i.into();
    }
    if let Ok(f) = raw.parse::<f64>() {
        return f.into();
    }
    if raw.starts_with('[') {
        if let Ok(array) = raw.parse::<toml_edit::Value>() {
            return array;
        }
    }
    raw.into()
}

/// Set `key` to `value` in a TOML document, creating tables as needed.
fn set_in_document(doc: &mut DocumentMut, key: &str, raw: &str) -> Result<()> {
    let parts: Vec<&str> = key.split('.').collect();
    if parts.iter().any(|p| p.is_empty()) {
        anyhow::bail!("Invalid config key: {}", key);
    }
    if !SECTIONS.contains(&parts[0]) {
        anyhow::bail!(
            "Unknown config key: {}\n\nValid sections: {}",
            key,
            SECTIONS.join(", ")
        );
    }

    let (last, tables) = parts
        .split_last()
        .ok_or_else(|| anyhow::anyhow!("Invalid config key: {}", key))?;
    let mut table: &mut Table = doc.as_table_mut();
    for name in tables {
        let item = table
            .entry(name)
            .or_insert_with(|| Item::Table(Table::new()));
        table = item
            .as_table_mut()
            .ok_or_else(|| anyhow::anyhow!("'{}' in {} is not a table", name, key))?;
    }
    table[*last] = Item::Value(parse_value(raw));
    Ok(())
}

/// Set a config value.
pub fn set_config(config_path: &Path, key: &str, value: &str) -> Result<()> {
    config::ensure_config_file_at(config_path)?;

    let contents = std::fs::read_to_string(config_path).context("Failed to read config file")?;
    let mut doc: DocumentMut = contents.parse().context("Failed to parse config file")?;

    set_in_document(&mut doc, key, value)?;

    let updated = doc.to_string();
    Config::from_toml_str(&updated)
        .with_context(|| format!("Invalid value for {}: {}", key, value))?;

    std::fs::write(config_path, updated).context("Failed to write config file")?;

    println!("✓ Updated {} = {}", key, value);
    println!("  in {}", config_path.display());

    Ok(())
}

/// Show the config file path.
pub fn show_path(config_path: &Path) -> Result<()> {
    println!("{}", config_path.display());
    Ok(())
}

/// Show example configuration.
pub fn show_example() -> Result<()> {
    print!("{}", config::example_config());
    Ok(())
}

/// Initialize config file with defaults.
pub fn init_config(config_path: &Path) -> Result<()> {
    let created = config::ensure_config_file_at(config_path)?;

    if created {
        println!("✓ Created config file: {}", config_path.display());
        println!("\nEdit this file to configure timbre.");
    } else {
        println!("Config file already exists: {}", config_path.display());
    }

    Ok(())
}
