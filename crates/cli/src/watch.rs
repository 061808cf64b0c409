use std::path::PathBuf;

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Forwards filesystem changes below the watched paths to a channel.
pub struct SourceWatcher {
    _watcher: RecommendedWatcher,
}

impl SourceWatcher {
    /// Watch game directories recursively and library files directly.
    pub fn new(
        game_dirs: &[PathBuf],
        library_files: &[PathBuf],
        sender: mpsc::Sender<PathBuf>,
    ) -> Result<Self> {
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) if is_content_change(&event.kind) => {
                for path in event.paths {
                    // a full channel already guarantees a rescan
                    let _ = sender.try_send(path);
                }
            }
            Ok(_) => {}
            Err(err) => warn!(?err, "filesystem watch error"),
        })
        .context("failed to create filesystem watcher")?;

        let targets = game_dirs
            .iter()
            .map(|dir| (dir, RecursiveMode::Recursive))
            .chain(library_files.iter().map(|file| (file, RecursiveMode::NonRecursive)));
        for (path, mode) in targets {
            if !path.exists() {
                warn!(path = %path.display(), "not watching missing path");
                continue;
            }
            watcher
                .watch(path, mode)
                .with_context(|| format!("failed to watch {}", path.display()))?;
            debug!(path = %path.display(), "watching");
        }

        Ok(Self { _watcher: watcher })
    }
}

fn is_content_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}
