//! Notifications emitted to the frontend.

use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::trace;

use crate::models::{Game, PlatformInfo};

/// Events emitted by the selection controller.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiEvent {
    /// The platform list was replaced.
    PlatformsChanged,
    /// Total number of games across platforms after a load.
    GameCountChanged(usize),
    /// The current platform changed (including to none).
    CurrentPlatformChanged,
    /// The current game of the current platform changed.
    CurrentGameChanged,
    /// The UI language changed.
    LanguageChanged(String),
    /// A catalog load completed and was installed.
    LoadingFinished {
        /// Wall-clock duration of the scan.
        elapsed: Duration,
        /// Total number of games across platforms.
        game_count: usize,
    },
    /// The frontend should prepare for launching and answer with
    /// [`Selection::on_ready_to_launch`](crate::Selection::on_ready_to_launch).
    PrepareLaunch,
    /// The process collaborator should start this game.
    ExecuteLaunch {
        /// Platform of the game.
        platform: Arc<PlatformInfo>,
        /// The game to run.
        game: Arc<Game>,
    },
    /// The launched game exited; the frontend can resume.
    RestoreAfterGame,
}

/// Fan-out of [`ApiEvent`]s to any number of subscribers.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<ApiEvent>>>>,
}

impl EventBus {
    /// Create a bus without subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber. Dropping the receiver unsubscribes it.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ApiEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Deliver an event to every live subscriber.
    pub fn emit(&self, event: ApiEvent) {
        trace!(?event, "emit");
        self.subscribers
            .lock()
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|subscriber| !subscriber.is_closed());
        subscribers.len()
    }
}

/// Collect every event currently queued on `receiver`.
pub fn drain(receiver: &mut mpsc::UnboundedReceiver<ApiEvent>) -> Vec<ApiEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}
