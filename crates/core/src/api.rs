//! Owning-thread facade over the loader and the selection.

use tracing::error;

use crate::{
    aggregator::Aggregator,
    events::EventBus,
    loader::{CatalogLoader, LoadEvent, LoadRequest},
    selection::Selection,
    stats::PlayStats,
};

/// Everything a frontend talks to.
///
/// Loads run in the background; their completion is applied to the
/// [`Selection`] only through [`Api::handle_load_event`], on the task that
/// owns the `Api`.
#[derive(Debug)]
pub struct Api {
    loader: CatalogLoader,
    selection: Selection,
}

impl Api {
    /// Create an API without starting a load.
    pub fn new(aggregator: Aggregator, events: EventBus, stats: PlayStats) -> Self {
        Self {
            loader: CatalogLoader::new(aggregator),
            selection: Selection::new(events, stats),
        }
    }

    /// Start a scan, or queue one behind the scan in flight.
    pub fn reload(&mut self) -> LoadRequest {
        self.selection.mark_loading();
        self.loader.request_load()
    }

    /// Whether a scan is running.
    pub fn is_loading(&self) -> bool {
        self.loader.is_loading()
    }

    /// Wait for the running scan. `None` when nothing is running.
    pub async fn next_load_event(&mut self) -> Option<LoadEvent> {
        self.loader.next_event().await
    }

    /// Apply a completed scan.
    pub fn handle_load_event(&mut self, event: LoadEvent) {
        match event {
            LoadEvent::Finished(report) => {
                self.selection.install(report);
                if self.loader.is_loading() {
                    self.selection.mark_loading();
                }
            }
            LoadEvent::Failed(err) => {
                error!(?err, "catalog load failed");
                if !self.loader.is_loading() {
                    self.selection.mark_load_failed();
                }
            }
        }
    }

    /// Wait for the running scan and apply it. Returns `false` when no scan
    /// was running.
    pub async fn wait_for_load(&mut self) -> bool {
        match self.next_load_event().await {
            Some(event) => {
                self.handle_load_event(event);
                true
            }
            None => false,
        }
    }

    /// Read access to the selection.
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Commands on the selection.
    pub fn selection_mut(&mut self) -> &mut Selection {
        &mut self.selection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        aggregator::tests::StaticProvider,
        events::{drain, ApiEvent},
    };

    #[tokio::test]
    async fn loads_two_sources_into_one_platform() {
        let events = EventBus::new();
        let mut rx = events.subscribe();
        let aggregator = Aggregator::new()
            .with_provider(StaticProvider::new("p1", "arcade", vec!["pac-man"]))
            .with_provider(StaticProvider::new("p2", "arcade", vec!["pac-man", "galaga"]));
        let mut api = Api::new(aggregator, events, PlayStats::default());

        assert_eq!(api.reload(), LoadRequest::Started);
        assert!(api.selection().meta().loading);
        assert!(api.wait_for_load().await);
        assert!(!api.wait_for_load().await);

        let selection = api.selection();
        assert!(!selection.meta().loading);
        assert_eq!(selection.game_count(), 2);
        assert_eq!(selection.current_platform_index(), Some(0));
        let arcade = &selection.platforms()[0];
        assert_eq!(arcade.short_name(), "arcade");
        let mut keys: Vec<_> = arcade.games().iter().map(|g| g.key()).collect();
        keys.sort();
        assert_eq!(keys, ["galaga", "pac-man"]);

        let events = drain(&mut rx);
        let count_at = events
            .iter()
            .position(|e| *e == ApiEvent::GameCountChanged(2))
            .expect("game count event");
        let platform_at = events
            .iter()
            .position(|e| *e == ApiEvent::CurrentPlatformChanged)
            .expect("platform event");
        assert!(count_at < platform_at);
    }

    #[tokio::test]
    async fn merges_directory_and_library_sources() -> anyhow::Result<()> {
        use crate::provider::{DirectoryProvider, LibraryProvider};
        use std::fs;

        let temp = tempfile::tempdir()?;
        let roms = temp.path().join("roms");
        fs::create_dir_all(&roms)?;
        fs::write(roms.join("collections.txt"), "collection: arcade\nextensions: zip\n")?;
        fs::write(roms.join("pacman.zip"), b"rom")?;
        fs::write(
            temp.path().join("library.json"),
            r#"{
  "collections": [
    { "shortname": "arcade", "launch": "mame {file.basename}", "games": ["pac-man", "galaga"] },
    { "shortname": "unused", "games": [] }
  ],
  "games": [
    { "id": "pac-man", "file": "roms/pacman.zip", "title": "Pac-Man", "developer": "Namco" },
    { "id": "galaga", "title": "Galaga" }
  ]
}"#,
        )?;

        let aggregator = Aggregator::new()
            .with_provider(DirectoryProvider::new([&roms]))
            .with_provider(LibraryProvider::new([temp.path().join("library.json")]));
        let mut api = Api::new(aggregator, EventBus::new(), PlayStats::default());
        api.reload();
        assert!(api.wait_for_load().await);

        let selection = api.selection();
        assert!(selection.diagnostics().is_empty(), "{:?}", selection.diagnostics());
        assert_eq!(selection.platforms().len(), 1);
        let arcade = &selection.platforms()[0];
        let titles: Vec<_> = arcade.games().iter().map(|g| g.title()).collect();
        assert_eq!(titles, ["Galaga", "Pac-Man"]);
        assert_eq!(arcade.info().launch.as_deref(), Some("mame {file.basename}"));
        let pacman = &arcade.games()[1];
        assert_eq!(pacman.metadata.developer.as_deref(), Some("Namco"));
        assert_eq!(pacman.files().len(), 1);
        assert_eq!(selection.game_count(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn queued_reload_keeps_loading_flag() {
        let mut api = Api::new(
            Aggregator::new().with_provider(StaticProvider::new("p", "nes", vec!["smb"])),
            EventBus::new(),
            PlayStats::default(),
        );
        api.reload();
        assert_eq!(api.reload(), LoadRequest::Queued);

        assert!(api.wait_for_load().await);
        assert!(api.selection().meta().loading);
        assert!(api.wait_for_load().await);
        assert!(!api.selection().meta().loading);
        assert_eq!(api.selection().game_count(), 1);
    }
}
