use std::{
    collections::{hash_map, BTreeSet, HashMap},
    sync::Arc,
};

use serde::{Deserialize, Serialize};

use super::{fill, Game};
use crate::selection::SelectionError;

/// A named group of games, as found by providers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    short_name: String,
    /// Human readable name.
    pub name: Option<String>,
    /// Launch command template shared by member games.
    pub launch: Option<String>,
    games: BTreeSet<String>,
}

impl Collection {
    /// Create an empty collection. The short name is trimmed and lower-cased.
    pub fn new(short_name: &str) -> Self {
        Self {
            short_name: normalize_short_name(short_name),
            name: None,
            launch: None,
            games: BTreeSet::new(),
        }
    }

    /// Stable identity of the collection.
    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    /// Keys of member games, in key order.
    pub fn game_keys(&self) -> impl Iterator<Item = &str> {
        self.games.iter().map(String::as_str)
    }

    /// Number of linked games.
    pub fn game_count(&self) -> usize {
        self.games.len()
    }

    /// Link a game by key. Linking twice has no effect.
    pub fn add_game(&mut self, key: impl Into<String>) {
        self.games.insert(key.into());
    }

    /// Fill in the name and launch template when they are still unset.
    pub fn fill_details(&mut self, name: Option<String>, launch: Option<String>) {
        fill(&mut self.name, name);
        fill(&mut self.launch, launch);
    }

    pub(crate) fn retain_games(&mut self, keep: impl FnMut(&String) -> bool) {
        self.games.retain(keep);
    }
}

pub(crate) fn normalize_short_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Collections discovered during a scan, keyed by short name.
#[derive(Debug, Default)]
pub struct CollectionMap {
    inner: HashMap<String, Collection>,
}

impl CollectionMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the collection for `short_name`, creating it when needed.
    pub fn add_or_get(&mut self, short_name: &str) -> &mut Collection {
        match self.inner.entry(normalize_short_name(short_name)) {
            hash_map::Entry::Occupied(entry) => entry.into_mut(),
            hash_map::Entry::Vacant(entry) => {
                let collection = Collection::new(entry.key());
                entry.insert(collection)
            }
        }
    }

    /// Look up a collection by short name.
    pub fn get(&self, short_name: &str) -> Option<&Collection> {
        self.inner.get(&normalize_short_name(short_name))
    }

    /// Look up a collection for updates.
    pub fn get_mut(&mut self, short_name: &str) -> Option<&mut Collection> {
        self.inner.get_mut(&normalize_short_name(short_name))
    }

    /// Number of collections.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the map holds no collections.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Iterate over all collections.
    pub fn iter(&self) -> impl Iterator<Item = &Collection> {
        self.inner.values()
    }

    /// Iterate mutably over all collections.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Collection> {
        self.inner.values_mut()
    }

    pub(crate) fn into_inner(self) -> HashMap<String, Collection> {
        self.inner
    }
}

/// Immutable description of a platform shown to the frontend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformInfo {
    /// Stable identity.
    pub short_name: String,
    /// Human readable name, if the provider supplied one.
    pub name: Option<String>,
    /// Launch command template for member games.
    pub launch: Option<String>,
}

impl PlatformInfo {
    /// Name to show, falling back to the short name.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.short_name)
    }
}

/// A non-empty collection installed in the selection, with its own game cursor.
#[derive(Debug, Clone)]
pub struct Platform {
    info: Arc<PlatformInfo>,
    games: Vec<Arc<Game>>,
    current_game: Option<usize>,
}

impl Platform {
    pub(crate) fn new(info: PlatformInfo, games: Vec<Arc<Game>>) -> Self {
        Self {
            info: Arc::new(info),
            games,
            current_game: None,
        }
    }

    /// Shared platform description.
    pub fn info(&self) -> &Arc<PlatformInfo> {
        &self.info
    }

    /// Stable identity of the platform.
    pub fn short_name(&self) -> &str {
        &self.info.short_name
    }

    /// Member games in display order.
    pub fn games(&self) -> &[Arc<Game>] {
        &self.games
    }

    /// Remembered game index.
    pub fn current_game_index(&self) -> Option<usize> {
        self.current_game
    }

    /// Game under the remembered index.
    pub fn current_game(&self) -> Option<&Arc<Game>> {
        self.current_game.and_then(|idx| self.games.get(idx))
    }

    /// Move the game cursor. Returns whether the cursor changed.
    pub(crate) fn select_game(&mut self, index: Option<usize>) -> Result<bool, SelectionError> {
        if let Some(idx) = index {
            if idx >= self.games.len() {
                return Err(SelectionError::InvalidGameIndex {
                    platform: self.info.short_name.clone(),
                    index: idx,
                    count: self.games.len(),
                });
            }
        }
        if self.current_game == index {
            return Ok(false);
        }
        self.current_game = index;
        Ok(true)
    }

    pub(crate) fn reset_game_index(&mut self) {
        self.current_game = None;
    }
}
