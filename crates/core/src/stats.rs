//! Play statistics stored alongside the configuration.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Directory under the user's data dir holding gamedeck state.
pub const DEFAULT_DATA_DIR: &str = "gamedeck";

/// How often and when a game was last played.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayRecord {
    /// Number of finished play sessions.
    pub play_count: u32,
    /// End of the most recent session.
    pub last_played: Option<DateTime<Utc>>,
}

/// Play records keyed by game key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayStats {
    #[serde(default)]
    games: BTreeMap<String, PlayRecord>,
}

impl PlayStats {
    /// Load stats from the given path, returning `None` if it does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read play stats {}", path.display()))?;
        let stats = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse play stats {}", path.display()))?;
        Ok(Some(stats))
    }

    /// Persist stats to the given file, creating parent directories if needed.
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create stats directory {}", parent.display())
            })?;
        }

        let serialized =
            serde_json::to_string_pretty(self).context("failed to serialize play stats")?;
        fs::write(path, serialized)
            .with_context(|| format!("failed to write play stats {}", path.display()))
    }

    /// Count one finished session of `key`.
    pub fn record(&mut self, key: &str, finished_at: DateTime<Utc>) -> &PlayRecord {
        let record = self.games.entry(key.to_string()).or_default();
        record.play_count += 1;
        record.last_played = Some(finished_at);
        record
    }

    /// Record for `key`, if it was ever played.
    pub fn get(&self, key: &str) -> Option<&PlayRecord> {
        self.games.get(key)
    }

    /// Number of games with a record.
    pub fn len(&self) -> usize {
        self.games.len()
    }

    /// Whether nothing was recorded yet.
    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }
}

/// Default location of the stats file.
pub fn default_stats_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_DATA_DIR)
        .join("stats.json")
}
