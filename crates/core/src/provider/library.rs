use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use super::{file_key, Provider};
use crate::{
    diagnostics::Diagnostics,
    models::{CollectionMap, GameMap, GameMetadata},
};

/// Reads games and collections from JSON library files.
///
/// ```json
/// {
///   "collections": [{ "shortname": "arcade", "name": "Arcade", "games": ["pac-man"] }],
///   "games": [{ "id": "pac-man", "file": "roms/pacman.zip", "title": "Pac-Man" }]
/// }
/// ```
///
/// A game is keyed by the canonical path of `file` when present, so entries
/// merge with games found by directory scans, and by `id` otherwise.
/// Relative paths are resolved against the library file's directory.
#[derive(Debug, Clone)]
pub struct LibraryProvider {
    files: Vec<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct LibraryFile {
    #[serde(default)]
    collections: Vec<LibraryCollection>,
    #[serde(default)]
    games: Vec<LibraryGame>,
}

#[derive(Debug, Deserialize)]
struct LibraryCollection {
    #[serde(alias = "short_name")]
    shortname: String,
    name: Option<String>,
    launch: Option<String>,
    #[serde(default)]
    games: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct LibraryGame {
    id: Option<String>,
    file: Option<PathBuf>,
    #[serde(flatten)]
    metadata: GameMetadata,
}

impl LibraryGame {
    fn key(&self, base: &Path) -> Option<String> {
        match (&self.file, &self.id) {
            (Some(file), _) => Some(file_key(&base.join(file)).1),
            (None, Some(id)) if !id.trim().is_empty() => Some(id.trim().to_string()),
            _ => None,
        }
    }

    fn resolved_metadata(&self, base: &Path) -> GameMetadata {
        let mut metadata = self.metadata.clone();
        metadata.workdir = metadata.workdir.map(|dir| base.join(dir));
        let assets = &mut metadata.assets;
        assets.box_front = assets.box_front.take().map(|path| base.join(path));
        assets.logo = assets.logo.take().map(|path| base.join(path));
        for shot in assets.screenshots.iter_mut() {
            *shot = base.join(&*shot);
        }
        metadata
    }
}

impl LibraryProvider {
    /// Diagnostics source name.
    pub const NAME: &'static str = "library";

    /// Create a provider over the given JSON files.
    pub fn new<I, P>(files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            files: files.into_iter().map(Into::into).collect(),
        }
    }

    fn find_in_file(
        path: &Path,
        games: &mut GameMap,
        collections: &mut CollectionMap,
        diagnostics: &mut Diagnostics,
    ) -> Result<()> {
        let library = load_library(path)?;
        let base = base_dir(path);

        let mut keys_by_id: HashMap<&str, String> = HashMap::new();
        for (idx, entry) in library.games.iter().enumerate() {
            let Some(key) = entry.key(&base) else {
                diagnostics.report(
                    Self::NAME,
                    format!("{}: game #{idx} has neither `id` nor `file`", path.display()),
                );
                continue;
            };
            let game = games.add_or_get(key.clone());
            if let Some(file) = &entry.file {
                game.add_file(file_key(&base.join(file)).0);
            }
            if let Some(id) = entry.id.as_deref() {
                keys_by_id.insert(id.trim(), key);
            }
        }

        for entry in &library.collections {
            if entry.shortname.trim().is_empty() {
                diagnostics.report(
                    Self::NAME,
                    format!("{}: collection without a shortname", path.display()),
                );
                continue;
            }
            let collection = collections.add_or_get(&entry.shortname);
            collection.fill_details(entry.name.clone(), entry.launch.clone());
            for reference in &entry.games {
                let key = keys_by_id
                    .get(reference.trim())
                    .cloned()
                    .unwrap_or_else(|| reference.trim().to_string());
                collection.add_game(key);
            }
        }

        debug!(
            file = %path.display(),
            games = library.games.len(),
            collections = library.collections.len(),
            "read library file"
        );
        Ok(())
    }

    fn enhance_from_file(path: &Path, games: &mut GameMap) -> Result<()> {
        let library = load_library(path)?;
        let base = base_dir(path);
        for entry in &library.games {
            let Some(key) = entry.key(&base) else {
                continue;
            };
            if let Some(game) = games.get_mut(&key) {
                game.metadata.merge(entry.resolved_metadata(&base));
            }
        }
        Ok(())
    }
}

impl Provider for LibraryProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn find(
        &self,
        games: &mut GameMap,
        collections: &mut CollectionMap,
        diagnostics: &mut Diagnostics,
    ) -> Result<()> {
        for path in &self.files {
            if let Err(err) = Self::find_in_file(path, games, collections, diagnostics) {
                diagnostics.report_error(Self::NAME, &err);
            }
        }
        Ok(())
    }

    fn enhance(
        &self,
        games: &mut GameMap,
        _collections: &mut CollectionMap,
        diagnostics: &mut Diagnostics,
    ) -> Result<()> {
        for path in &self.files {
            if let Err(err) = Self::enhance_from_file(path, games) {
                diagnostics.report_error(Self::NAME, &err);
            }
        }
        Ok(())
    }
}

fn load_library(path: &Path) -> Result<LibraryFile> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read library {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse library {}", path.display()))
}

fn base_dir(path: &Path) -> PathBuf {
    path.parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    #[test]
    fn reads_games_and_collections() -> Result<()> {
        let temp = tempdir()?;
        let path = temp.path().join("library.json");
        fs::write(
            &path,
            r#"{
  "collections": [
    { "shortname": "Arcade", "name": "Arcade", "launch": "mame {file.basename}", "games": ["pac-man", "dig-dug"] }
  ],
  "games": [
    { "id": "pac-man", "title": "Pac-Man", "rating": 0.8, "release": "1980-05-22",
      "assets": { "box_front": "art/pacman.png" } },
    { "title": "Nameless" }
  ]
}"#,
        )?;

        let provider = LibraryProvider::new([&path]);
        let mut games = GameMap::new();
        let mut collections = CollectionMap::new();
        let mut diagnostics = Diagnostics::new();
        provider.find(&mut games, &mut collections, &mut diagnostics)?;
        provider.enhance(&mut games, &mut collections, &mut diagnostics)?;

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(games.len(), 1);
        let pacman = games.get("pac-man").expect("pac-man");
        assert_eq!(pacman.title(), "Pac-Man");
        assert_eq!(pacman.metadata.release, NaiveDate::from_ymd_opt(1980, 5, 22));
        assert_eq!(
            pacman.metadata.assets.box_front,
            Some(temp.path().join("art/pacman.png"))
        );

        let arcade = collections.get("arcade").expect("arcade");
        assert_eq!(arcade.launch.as_deref(), Some("mame {file.basename}"));
        // dangling references stay until the catalog prunes them
        assert_eq!(arcade.game_count(), 2);
        Ok(())
    }

    #[test]
    fn file_entries_share_identity_with_directory_scans() -> Result<()> {
        let temp = tempdir()?;
        fs::write(temp.path().join("tetris.gb"), b"rom")?;
        let path = temp.path().join("library.json");
        fs::write(
            &path,
            r#"{ "collections": [{ "shortname": "gb", "games": ["tetris"] }],
                 "games": [{ "id": "tetris", "file": "tetris.gb", "developer": "Nintendo" }] }"#,
        )?;

        let provider = LibraryProvider::new([&path]);
        let mut games = GameMap::new();
        let mut collections = CollectionMap::new();
        let mut diagnostics = Diagnostics::new();
        provider.find(&mut games, &mut collections, &mut diagnostics)?;
        provider.enhance(&mut games, &mut collections, &mut diagnostics)?;

        let (_, key) = file_key(&temp.path().join("tetris.gb"));
        let tetris = games.get(&key).expect("tetris keyed by path");
        assert_eq!(tetris.title(), "tetris");
        assert_eq!(tetris.metadata.developer.as_deref(), Some("Nintendo"));
        assert_eq!(
            collections.get("gb").map(|c| c.game_keys().collect::<Vec<_>>()),
            Some(vec![key.as_str()])
        );
        Ok(())
    }

    #[test]
    fn malformed_file_is_reported_not_fatal() -> Result<()> {
        let temp = tempdir()?;
        let broken = temp.path().join("broken.json");
        fs::write(&broken, "{ not json")?;

        let provider = LibraryProvider::new([broken, temp.path().join("absent.json")]);
        let mut games = GameMap::new();
        let mut collections = CollectionMap::new();
        let mut diagnostics = Diagnostics::new();
        provider.find(&mut games, &mut collections, &mut diagnostics)?;

        assert_eq!(diagnostics.len(), 2);
        assert!(games.is_empty());
        Ok(())
    }
}
