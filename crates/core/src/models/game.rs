use std::{
    collections::{hash_map, HashMap},
    path::{Path, PathBuf},
};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::fill;

/// Artwork attached to a game.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameAssets {
    /// Front cover image.
    pub box_front: Option<PathBuf>,
    /// Transparent logo image.
    pub logo: Option<PathBuf>,
    /// In-game screenshots, without duplicates.
    #[serde(default)]
    pub screenshots: Vec<PathBuf>,
}

impl GameAssets {
    /// Union `other` into `self`, keeping values that are already set.
    pub fn merge(&mut self, other: GameAssets) {
        fill(&mut self.box_front, other.box_front);
        fill(&mut self.logo, other.logo);
        for shot in other.screenshots {
            if !self.screenshots.contains(&shot) {
                self.screenshots.push(shot);
            }
        }
    }
}

/// Optional descriptive attributes that providers contribute to a game.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameMetadata {
    /// Display title.
    pub title: Option<String>,
    /// Launch command overriding the collection's template.
    pub launch: Option<String>,
    /// Working directory for the launched process.
    pub workdir: Option<PathBuf>,
    /// Long-form description.
    pub description: Option<String>,
    /// Developer credit.
    pub developer: Option<String>,
    /// Publisher credit.
    pub publisher: Option<String>,
    /// Genre label.
    pub genre: Option<String>,
    /// Maximum number of players.
    pub players: Option<u32>,
    /// Rating in the `0.0..=1.0` range.
    pub rating: Option<f32>,
    /// Release date.
    pub release: Option<NaiveDate>,
    /// Artwork.
    #[serde(default)]
    pub assets: GameAssets,
}

impl GameMetadata {
    /// Union `other` into `self`.
    ///
    /// Fields that are already set are never replaced, so applying the same
    /// metadata twice is a no-op and contributions from several providers
    /// accumulate.
    pub fn merge(&mut self, other: GameMetadata) {
        fill(&mut self.title, other.title);
        fill(&mut self.launch, other.launch);
        fill(&mut self.workdir, other.workdir);
        fill(&mut self.description, other.description);
        fill(&mut self.developer, other.developer);
        fill(&mut self.publisher, other.publisher);
        fill(&mut self.genre, other.genre);
        fill(&mut self.players, other.players);
        fill(&mut self.rating, other.rating);
        fill(&mut self.release, other.release);
        self.assets.merge(other.assets);
    }
}

/// A single launchable game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    key: String,
    files: Vec<PathBuf>,
    /// Attributes contributed by providers.
    pub metadata: GameMetadata,
}

impl Game {
    /// Create a game with the given identity and no attributes.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            files: Vec::new(),
            metadata: GameMetadata::default(),
        }
    }

    /// Stable identity of the game.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Title to show, falling back to the file stem or the key.
    pub fn title(&self) -> &str {
        if let Some(title) = self.metadata.title.as_deref() {
            return title;
        }
        self.files
            .first()
            .and_then(|path| path.file_stem())
            .and_then(|stem| stem.to_str())
            .unwrap_or(&self.key)
    }

    /// Files belonging to this game, first one being the primary file.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Primary file, if the game is file based.
    pub fn primary_file(&self) -> Option<&Path> {
        self.files.first().map(PathBuf::as_path)
    }

    /// Attach a file, ignoring duplicates.
    pub fn add_file(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !self.files.contains(&path) {
            self.files.push(path);
        }
    }
}

/// Games discovered during a scan, keyed by identity.
#[derive(Debug, Default)]
pub struct GameMap {
    inner: HashMap<String, Game>,
}

impl GameMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the game for `key`, creating it when it is not known yet.
    ///
    /// An existing game is returned untouched.
    pub fn add_or_get(&mut self, key: impl Into<String>) -> &mut Game {
        match self.inner.entry(key.into()) {
            hash_map::Entry::Occupied(entry) => entry.into_mut(),
            hash_map::Entry::Vacant(entry) => {
                let game = Game::new(entry.key().clone());
                entry.insert(game)
            }
        }
    }

    /// Look up a game.
    pub fn get(&self, key: &str) -> Option<&Game> {
        self.inner.get(key)
    }

    /// Look up a game for attribute updates.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Game> {
        self.inner.get_mut(key)
    }

    /// Whether a game with this key exists.
    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    /// Number of games.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the map holds no games.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Iterate over all games.
    pub fn iter(&self) -> impl Iterator<Item = &Game> {
        self.inner.values()
    }

    /// Iterate mutably over all games.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Game> {
        self.inner.values_mut()
    }

    pub(crate) fn into_inner(self) -> HashMap<String, Game> {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_or_get_keeps_existing_identity() {
        let mut games = GameMap::new();
        games.add_or_get("pac-man").metadata.title = Some("Pac-Man".to_string());
        let again = games.add_or_get("pac-man");
        assert_eq!(again.title(), "Pac-Man");
        assert_eq!(games.len(), 1);
    }

    #[test]
    fn metadata_merge_is_a_union() {
        let mut metadata = GameMetadata {
            description: Some("Maze chase".to_string()),
            ..Default::default()
        };
        metadata.merge(GameMetadata {
            description: Some("ignored".to_string()),
            rating: Some(0.9),
            assets: GameAssets {
                screenshots: vec![PathBuf::from("a.png")],
                ..Default::default()
            },
            ..Default::default()
        });
        metadata.merge(GameMetadata {
            assets: GameAssets {
                screenshots: vec![PathBuf::from("a.png"), PathBuf::from("b.png")],
                ..Default::default()
            },
            ..Default::default()
        });

        assert_eq!(metadata.description.as_deref(), Some("Maze chase"));
        assert_eq!(metadata.rating, Some(0.9));
        assert_eq!(metadata.assets.screenshots.len(), 2);
    }

    #[test]
    fn title_falls_back_to_file_stem() {
        let mut game = Game::new("/roms/arcade/galaga.zip");
        assert_eq!(game.title(), "/roms/arcade/galaga.zip");
        game.add_file("/roms/arcade/galaga.zip");
        game.add_file("/roms/arcade/galaga.zip");
        assert_eq!(game.title(), "galaga");
        assert_eq!(game.files().len(), 1);
    }
}
