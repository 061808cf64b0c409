//! Application configuration.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::{
    aggregator::Aggregator,
    provider::{DirectoryProvider, LibraryProvider, DEFAULT_SCAN_DEPTH},
    stats::default_stats_path,
};

/// Directory under the user's config dir holding `config.toml`.
pub const DEFAULT_CONFIG_DIR: &str = "gamedeck";

const ENV_PREFIX: &str = "GAMEDECK";

const DEFAULT_CONFIG: &str = r#"# gamedeck configuration

# Directories containing a collections.txt (and optionally metadata.txt).
game_dirs = []

# JSON library files.
library_files = []

# UI language.
language = "en"

# How deep below each game directory files are searched.
scan_depth = 4
"#;

/// User configuration, read from `config.toml` and `GAMEDECK_*` variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directories scanned by the directory provider.
    pub game_dirs: Vec<PathBuf>,
    /// JSON files read by the library provider.
    pub library_files: Vec<PathBuf>,
    /// UI language.
    pub language: String,
    /// Search depth below each game directory.
    pub scan_depth: usize,
    /// Where play statistics are stored.
    pub stats_path: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            game_dirs: Vec::new(),
            library_files: Vec::new(),
            language: "en".to_string(),
            scan_depth: DEFAULT_SCAN_DEPTH,
            stats_path: default_stats_path(),
        }
    }
}

impl AppConfig {
    /// Default config directory.
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DEFAULT_CONFIG_DIR)
    }

    /// Default config file path.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load from the default config file.
    pub fn load() -> Result<Self> {
        Self::load_from(Self::config_path())
    }

    /// Load from `path` (optional) with environment overrides on top.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("game_dirs")
                    .with_list_parse_key("library_files"),
            )
            .build()
            .with_context(|| format!("failed to read config {}", path.display()))?
            .try_deserialize()
            .with_context(|| format!("invalid config {}", path.display()))
    }

    /// Providers described by this configuration.
    pub fn aggregator(&self) -> Aggregator {
        let mut aggregator = Aggregator::new();
        if !self.game_dirs.is_empty() {
            aggregator = aggregator.with_provider(
                DirectoryProvider::new(self.game_dirs.iter().cloned())
                    .with_max_depth(self.scan_depth),
            );
        }
        if !self.library_files.is_empty() {
            aggregator = aggregator.with_provider(LibraryProvider::new(self.library_files.iter().cloned()));
        }
        aggregator
    }
}

/// Write a commented default config when none exists. Returns its path.
pub fn ensure_default_config() -> Result<PathBuf> {
    write_default_config(AppConfig::config_path())
}

fn write_default_config(path: PathBuf) -> Result<PathBuf> {
    if path.exists() {
        return Ok(path);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {}", parent.display()))?;
    }
    fs::write(&path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write default config {}", path.display()))?;
    Ok(path)
}
