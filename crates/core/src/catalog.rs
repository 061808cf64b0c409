//! Merged result of a scan, ready to be installed into the selection.

use std::{collections::HashMap, sync::Arc};

use tracing::debug;

use crate::models::{CollectionMap, Game, GameMap, Platform, PlatformInfo};

/// All games and the non-empty platforms that reference them.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    games: HashMap<String, Arc<Game>>,
    platforms: Vec<Platform>,
}

impl Catalog {
    /// Freeze the scan maps into a catalog.
    ///
    /// Links to unknown games are dropped, collections left without games are
    /// pruned, and the remaining platforms are ordered by short name with
    /// their games ordered by title.
    pub fn from_maps(games: GameMap, collections: CollectionMap) -> Self {
        let games: HashMap<String, Arc<Game>> = games
            .into_inner()
            .into_iter()
            .map(|(key, game)| (key, Arc::new(game)))
            .collect();

        let mut platforms = Vec::new();
        for (_, mut collection) in collections.into_inner() {
            collection.retain_games(|key| games.contains_key(key));
            if collection.game_count() == 0 {
                debug!(collection = collection.short_name(), "dropping empty collection");
                continue;
            }

            let mut members: Vec<Arc<Game>> = collection
                .game_keys()
                .filter_map(|key| games.get(key).cloned())
                .collect();
            members.sort_by(|a, b| {
                a.title()
                    .to_lowercase()
                    .cmp(&b.title().to_lowercase())
                    .then_with(|| a.key().cmp(b.key()))
            });

            let info = PlatformInfo {
                short_name: collection.short_name().to_string(),
                name: collection.name.clone(),
                launch: collection.launch.clone(),
            };
            platforms.push(Platform::new(info, members));
        }
        platforms.sort_by(|a, b| a.short_name().cmp(b.short_name()));

        Self { games, platforms }
    }

    /// Platforms in display order. None of them is empty.
    pub fn platforms(&self) -> &[Platform] {
        &self.platforms
    }

    pub(crate) fn platforms_mut(&mut self) -> &mut [Platform] {
        &mut self.platforms
    }

    /// Look up a game by key.
    pub fn game(&self, key: &str) -> Option<&Arc<Game>> {
        self.games.get(key)
    }

    /// Number of distinct games, including ones not linked to any platform.
    pub fn unique_game_count(&self) -> usize {
        self.games.len()
    }

    /// Sum of the game counts of every platform.
    pub fn game_count(&self) -> usize {
        self.platforms.iter().map(|platform| platform.games().len()).sum()
    }

    /// Index of the platform with the given short name.
    pub fn platform_index(&self, short_name: &str) -> Option<usize> {
        let needle = short_name.trim().to_lowercase();
        self.platforms
            .iter()
            .position(|platform| platform.short_name() == needle)
    }
}
