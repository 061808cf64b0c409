//! Current platform/game cursor and the launch handshake.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    catalog::Catalog,
    diagnostics::Diagnostics,
    events::{ApiEvent, EventBus},
    loader::LoadReport,
    models::{Game, Platform},
    stats::{PlayRecord, PlayStats},
};

/// Rejected selection or launch requests. State is unchanged when returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    /// Platform index outside `0..count`.
    #[error("invalid platform index #{index} ({count} platforms)")]
    InvalidPlatformIndex {
        /// Requested index.
        index: usize,
        /// Number of platforms.
        count: usize,
    },
    /// Game index outside the platform's game list.
    #[error("invalid game index #{index} for platform `{platform}` ({count} games)")]
    InvalidGameIndex {
        /// Short name of the platform.
        platform: String,
        /// Requested index.
        index: usize,
        /// Number of games on the platform.
        count: usize,
    },
    /// Launch requested without a current platform.
    #[error("the current platform is undefined, you can't launch any games")]
    NoPlatformSelected,
    /// Launch requested without a current game.
    #[error("the current game is undefined, you can't launch it")]
    NoGameSelected,
}

/// Information about the most recent catalog load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadMeta {
    /// A load is in flight.
    pub loading: bool,
    /// Duration of the last completed scan.
    pub elapsed: Option<Duration>,
    /// Total games across platforms after the last load.
    pub game_count: usize,
    /// Number of provider diagnostics of the last load.
    pub diagnostic_count: usize,
}

/// Owns the installed catalog and the selection cursor.
///
/// Lives on the owning thread. Every state change is announced through the
/// [`EventBus`]; rejected requests log a warning and return an error.
#[derive(Debug)]
pub struct Selection {
    catalog: Catalog,
    current: Option<usize>,
    language: String,
    stats: PlayStats,
    meta: LoadMeta,
    diagnostics: Diagnostics,
    events: EventBus,
}

impl Selection {
    /// Create an empty, unloaded selection.
    pub fn new(events: EventBus, stats: PlayStats) -> Self {
        Self {
            catalog: Catalog::default(),
            current: None,
            language: String::new(),
            stats,
            meta: LoadMeta::default(),
            diagnostics: Diagnostics::new(),
            events,
        }
    }

    /// Event bus used for notifications.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Installed catalog.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Installed platforms in display order.
    pub fn platforms(&self) -> &[Platform] {
        self.catalog.platforms()
    }

    /// Index of the current platform, `None` when unloaded.
    pub fn current_platform_index(&self) -> Option<usize> {
        self.current
    }

    /// Current platform.
    pub fn current_platform(&self) -> Option<&Platform> {
        self.current.and_then(|idx| self.catalog.platforms().get(idx))
    }

    /// Current game of the current platform.
    pub fn current_game(&self) -> Option<&Arc<Game>> {
        self.current_platform().and_then(Platform::current_game)
    }

    /// Total number of games after the last load.
    pub fn game_count(&self) -> usize {
        self.meta.game_count
    }

    /// Load bookkeeping.
    pub fn meta(&self) -> &LoadMeta {
        &self.meta
    }

    /// Provider diagnostics of the last installed load.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Play history.
    pub fn play_stats(&self) -> &PlayStats {
        &self.stats
    }

    /// Play record of a game.
    pub fn play_record(&self, game: &Game) -> Option<&PlayRecord> {
        self.stats.get(game.key())
    }

    /// Current UI language.
    pub fn language(&self) -> &str {
        &self.language
    }

    pub(crate) fn mark_loading(&mut self) {
        self.meta.loading = true;
    }

    pub(crate) fn mark_load_failed(&mut self) {
        self.meta.loading = false;
    }

    /// Replace the catalog with a finished load and select the first platform.
    ///
    /// # Panics
    ///
    /// If the catalog contains an empty platform.
    pub fn install(&mut self, report: LoadReport) {
        let LoadReport {
            catalog,
            diagnostics,
            elapsed,
        } = report;

        self.reset_platform_index();
        self.catalog = catalog;

        let mut game_count = 0;
        for platform in self.catalog.platforms_mut() {
            assert!(
                !platform.games().is_empty(),
                "empty platform `{}` reached the selection",
                platform.short_name()
            );
            let selected = platform.select_game(Some(0));
            debug_assert!(selected.is_ok(), "first game of a non-empty platform");
            game_count += platform.games().len();
        }
        info!("{game_count} games found");

        self.meta = LoadMeta {
            loading: false,
            elapsed: Some(elapsed),
            game_count,
            diagnostic_count: diagnostics.len(),
        };
        self.diagnostics = diagnostics;

        self.events.emit(ApiEvent::PlatformsChanged);
        self.events.emit(ApiEvent::GameCountChanged(game_count));

        if !self.catalog.platforms().is_empty() {
            let _ = self.set_current_platform_index(Some(0));
        }

        self.events.emit(ApiEvent::LoadingFinished {
            elapsed,
            game_count,
        });
    }

    /// Select a platform by index, or unload the selection with `None`.
    ///
    /// `None` always resets every platform's remembered game index; the
    /// platform-changed event is only emitted when a platform was selected.
    pub fn set_current_platform_index(&mut self, index: Option<usize>) -> Result<(), SelectionError> {
        let Some(idx) = index else {
            self.reset_platform_index();
            return Ok(());
        };
        if self.current == Some(idx) {
            return Ok(());
        }

        let count = self.catalog.platforms().len();
        if idx >= count {
            let err = SelectionError::InvalidPlatformIndex { index: idx, count };
            warn!("{err}");
            return Err(err);
        }

        self.current = Some(idx);
        debug!(platform = self.catalog.platforms()[idx].short_name(), "platform selected");
        self.events.emit(ApiEvent::CurrentPlatformChanged);
        self.events.emit(ApiEvent::CurrentGameChanged);
        Ok(())
    }

    fn reset_platform_index(&mut self) {
        let was_selected = self.current.take().is_some();
        for platform in self.catalog.platforms_mut() {
            platform.reset_game_index();
        }
        if was_selected {
            self.events.emit(ApiEvent::CurrentPlatformChanged);
        }
    }

    /// Move the remembered game cursor of any platform.
    ///
    /// Only changes on the current platform are announced.
    pub fn set_current_game_index(
        &mut self,
        platform_index: usize,
        game_index: Option<usize>,
    ) -> Result<(), SelectionError> {
        let count = self.catalog.platforms().len();
        let Some(platform) = self.catalog.platforms_mut().get_mut(platform_index) else {
            let err = SelectionError::InvalidPlatformIndex {
                index: platform_index,
                count,
            };
            warn!("{err}");
            return Err(err);
        };

        let changed = platform.select_game(game_index).map_err(|err| {
            warn!("{err}");
            err
        })?;
        if changed && self.current == Some(platform_index) {
            self.events.emit(ApiEvent::CurrentGameChanged);
        }
        Ok(())
    }

    /// Move the game cursor of the current platform.
    pub fn set_current_game(&mut self, game_index: Option<usize>) -> Result<(), SelectionError> {
        let Some(platform_index) = self.current else {
            let err = SelectionError::NoPlatformSelected;
            warn!("{err}");
            return Err(err);
        };
        self.set_current_game_index(platform_index, game_index)
    }

    /// Ask the frontend to prepare for launching the current game.
    pub fn launch_game(&mut self) -> Result<(), SelectionError> {
        let Some(platform) = self.current_platform() else {
            let err = SelectionError::NoPlatformSelected;
            warn!("{err}");
            return Err(err);
        };
        if platform.current_game().is_none() {
            let err = SelectionError::NoGameSelected;
            warn!("{err}");
            return Err(err);
        }

        self.events.emit(ApiEvent::PrepareLaunch);
        Ok(())
    }

    /// Called by the process collaborator once it is ready; emits
    /// [`ApiEvent::ExecuteLaunch`] for the current selection.
    ///
    /// The selection must still be defined here. This is checked with a debug
    /// assertion; release builds log and emit nothing.
    pub fn on_ready_to_launch(&mut self) -> Result<(), SelectionError> {
        let platform = self.current_platform();
        let game = platform.and_then(Platform::current_game);
        debug_assert!(platform.is_some(), "ready to launch without a current platform");
        debug_assert!(game.is_some(), "ready to launch without a current game");

        let (Some(platform), Some(game)) = (platform, game) else {
            let err = if self.current.is_none() {
                SelectionError::NoPlatformSelected
            } else {
                SelectionError::NoGameSelected
            };
            tracing::error!("{err}");
            return Err(err);
        };

        let event = ApiEvent::ExecuteLaunch {
            platform: Arc::clone(platform.info()),
            game: Arc::clone(game),
        };
        self.events.emit(event);
        Ok(())
    }

    /// Called by the process collaborator after the game exited.
    ///
    /// Counts the session for the current game, then lets the frontend resume.
    pub fn on_game_finished(&mut self) {
        if let Some(key) = self.current_game().map(|game| game.key().to_string()) {
            let record = self.stats.record(&key, Utc::now());
            debug!(game = %key, play_count = record.play_count, "play recorded");
        }
        self.events.emit(ApiEvent::RestoreAfterGame);
    }

    /// Change the UI language.
    pub fn set_language(&mut self, language: impl Into<String>) {
        let language = language.into();
        if language == self.language {
            return;
        }
        self.language = language.clone();
        self.events.emit(ApiEvent::LanguageChanged(language));
    }
}
