use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use gamedeck_core::{
    Api, ApiEvent, AppConfig, EventBus, Game, LaunchCommand, PlatformInfo, PlayStats,
    ProcessLauncher,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::watch::SourceWatcher;

/// Quiet period after a filesystem change before rescanning.
const RESCAN_DELAY: Duration = Duration::from_millis(300);

/// Command line frontend over the core [`Api`].
pub struct App {
    api: Api,
    events: mpsc::UnboundedReceiver<ApiEvent>,
    config: AppConfig,
    launcher: ProcessLauncher,
}

impl App {
    pub fn new(config: AppConfig, events: EventBus, stats: PlayStats) -> Self {
        let receiver = events.subscribe();
        let mut api = Api::new(config.aggregator(), events, stats);
        api.selection_mut().set_language(config.language.clone());
        Self {
            api,
            events: receiver,
            config,
            launcher: ProcessLauncher,
        }
    }

    /// Scan once and print the platforms.
    pub async fn scan(&mut self, list_games: bool) -> Result<()> {
        self.load().await?;
        self.print_summary(list_games);
        Ok(())
    }

    /// Scan, select the requested game and run the launch handshake.
    pub async fn launch(&mut self, platform: &str, game: &str) -> Result<()> {
        self.load().await?;

        let selection = self.api.selection();
        let platform_index = selection
            .catalog()
            .platform_index(platform)
            .ok_or_else(|| anyhow!("unknown platform `{platform}`"))?;
        let game_index = find_game(selection.platforms()[platform_index].games(), game)
            .ok_or_else(|| anyhow!("no game `{game}` on platform `{platform}`"))?;

        let selection = self.api.selection_mut();
        selection.set_current_platform_index(Some(platform_index))?;
        selection.set_current_game(Some(game_index))?;
        self.drain_events();

        self.api.selection_mut().launch_game()?;
        loop {
            let event = self
                .events
                .recv()
                .await
                .context("event stream closed during launch")?;
            match event {
                ApiEvent::PrepareLaunch => self.api.selection_mut().on_ready_to_launch()?,
                ApiEvent::ExecuteLaunch { platform, game } => {
                    self.execute(&platform, &game).await?;
                    self.api.selection_mut().on_game_finished();
                }
                ApiEvent::RestoreAfterGame => break,
                other => debug!(?other, "ignoring event during launch"),
            }
        }

        let stats_path = &self.config.stats_path;
        self.api
            .selection()
            .play_stats()
            .persist(stats_path)
            .with_context(|| format!("failed to save play stats to {}", stats_path.display()))
    }

    /// Scan, then rescan whenever a source changes, until the watcher stops.
    pub async fn watch(&mut self) -> Result<()> {
        self.load().await?;
        self.print_summary(false);

        let (change_tx, mut change_rx) = mpsc::channel::<PathBuf>(64);
        let _watcher = SourceWatcher::new(
            &self.config.game_dirs,
            &self.config.library_files,
            change_tx,
        )?;
        info!("watching sources for changes");

        loop {
            tokio::select! {
                change = change_rx.recv() => {
                    let Some(path) = change else { break };
                    tokio::time::sleep(RESCAN_DELAY).await;
                    while change_rx.try_recv().is_ok() {}
                    let request = self.api.reload();
                    info!(path = %path.display(), ?request, "source changed");
                }
                Some(event) = self.api.next_load_event(), if self.api.is_loading() => {
                    self.api.handle_load_event(event);
                    self.drain_events();
                    self.print_summary(false);
                }
            }
        }
        Ok(())
    }

    async fn load(&mut self) -> Result<()> {
        self.api.reload();
        if !self.api.wait_for_load().await {
            bail!("catalog load did not start");
        }
        self.drain_events();
        Ok(())
    }

    async fn execute(&self, platform: &PlatformInfo, game: &Game) -> Result<()> {
        let command = LaunchCommand::resolve(platform, game)?;
        let status = self.launcher.run(&command).await?;
        if !status.success() {
            warn!(%status, game = game.title(), "game exited with failure");
        }
        Ok(())
    }

    fn drain_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            debug!(?event, "event");
        }
    }

    fn print_summary(&self, list_games: bool) {
        let selection = self.api.selection();
        let meta = selection.meta();
        let elapsed = meta.elapsed.map(|d| d.as_millis()).unwrap_or_default();
        println!(
            "{} platforms, {} games ({elapsed} ms)",
            selection.platforms().len(),
            meta.game_count
        );

        for platform in selection.platforms() {
            println!(
                "  {:<12} {} ({} games)",
                platform.short_name(),
                platform.info().display_name(),
                platform.games().len()
            );
            if list_games {
                for (idx, game) in platform.games().iter().enumerate() {
                    let plays = selection
                        .play_record(game)
                        .map(|record| format!(", played {}x", record.play_count))
                        .unwrap_or_default();
                    println!("    {idx:>3}. {}{plays}", game.title());
                }
            }
        }

        let diagnostics = selection.diagnostics();
        if !diagnostics.is_empty() {
            println!("{} problems:", diagnostics.len());
            for diagnostic in diagnostics.iter() {
                println!("  {diagnostic}");
            }
        }
    }
}

/// Resolve a game by list index, key, or case-insensitive title.
fn find_game(games: &[Arc<Game>], query: &str) -> Option<usize> {
    if let Ok(index) = query.parse::<usize>() {
        if index < games.len() {
            return Some(index);
        }
    }
    games
        .iter()
        .position(|game| game.key() == query)
        .or_else(|| {
            games
                .iter()
                .position(|game| game.title().eq_ignore_ascii_case(query.trim()))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_games_by_index_key_or_title() {
        let mut galaga = Game::new("/roms/galaga.zip");
        galaga.metadata.title = Some("Galaga".to_string());
        let games = vec![Arc::new(Game::new("pac-man")), Arc::new(galaga)];

        assert_eq!(find_game(&games, "1"), Some(1));
        assert_eq!(find_game(&games, "pac-man"), Some(0));
        assert_eq!(find_game(&games, "GALAGA"), Some(1));
        assert_eq!(find_game(&games, "7"), None);
    }
}
