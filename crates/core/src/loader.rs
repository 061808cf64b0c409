//! Background catalog loading.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::anyhow;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::{aggregator::Aggregator, catalog::Catalog, diagnostics::Diagnostics};

/// Output of a finished load.
#[derive(Debug)]
pub struct LoadReport {
    /// The merged catalog.
    pub catalog: Catalog,
    /// Provider diagnostics.
    pub diagnostics: Diagnostics,
    /// Wall-clock duration of the scan.
    pub elapsed: Duration,
}

/// Completion of a background load.
#[derive(Debug)]
pub enum LoadEvent {
    /// The scan ran to completion.
    Finished(LoadReport),
    /// The scan task itself failed (panicked or was aborted).
    Failed(anyhow::Error),
}

/// What happened to a load request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadRequest {
    /// A new scan started.
    Started,
    /// A scan is already running; another one starts after it completes.
    Queued,
}

/// Runs the [`Aggregator`] on tokio's blocking pool, one scan at a time.
///
/// The owner polls [`CatalogLoader::next_event`] on its own task; the scan
/// never touches selection state. Requests made while a scan is in flight
/// collapse into a single follow-up scan.
pub struct CatalogLoader {
    aggregator: Arc<Aggregator>,
    sender: mpsc::Sender<LoadEvent>,
    receiver: mpsc::Receiver<LoadEvent>,
    in_flight: bool,
    pending: bool,
}

impl CatalogLoader {
    /// Create a loader over the given providers.
    pub fn new(aggregator: Aggregator) -> Self {
        let (sender, receiver) = mpsc::channel(8);
        Self {
            aggregator: Arc::new(aggregator),
            sender,
            receiver,
            in_flight: false,
            pending: false,
        }
    }

    /// Whether a scan is running.
    pub fn is_loading(&self) -> bool {
        self.in_flight
    }

    /// Whether a follow-up scan is queued.
    pub fn has_pending(&self) -> bool {
        self.pending
    }

    /// Start a scan, or queue one if a scan is already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn request_load(&mut self) -> LoadRequest {
        if self.in_flight {
            debug!("load in flight, queueing reload");
            self.pending = true;
            return LoadRequest::Queued;
        }
        self.spawn();
        LoadRequest::Started
    }

    /// Wait for the running scan to complete.
    ///
    /// Returns `None` when no scan is running or queued. A queued scan is
    /// started before the completed one is returned.
    pub async fn next_event(&mut self) -> Option<LoadEvent> {
        if !self.in_flight {
            return None;
        }
        let event = self.receiver.recv().await?;
        self.in_flight = false;
        if std::mem::take(&mut self.pending) {
            self.spawn();
        }
        Some(event)
    }

    fn spawn(&mut self) {
        self.in_flight = true;
        let aggregator = Arc::clone(&self.aggregator);
        let sender = self.sender.clone();

        tokio::spawn(async move {
            let started = Instant::now();
            let result = tokio::task::spawn_blocking(move || aggregator.run()).await;
            let elapsed = started.elapsed();

            let event = match result {
                Ok(aggregation) => {
                    info!(elapsed_ms = elapsed.as_millis() as u64, "catalog scan finished");
                    LoadEvent::Finished(LoadReport {
                        catalog: aggregation.catalog,
                        diagnostics: aggregation.diagnostics,
                        elapsed,
                    })
                }
                Err(err) => {
                    error!(?err, "catalog scan task failed");
                    LoadEvent::Failed(anyhow!("catalog scan task failed: {err}"))
                }
            };
            let _ = sender.send(event).await;
        });
    }
}

impl std::fmt::Debug for CatalogLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogLoader")
            .field("aggregator", &self.aggregator)
            .field("in_flight", &self.in_flight)
            .field("pending", &self.pending)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        aggregator::tests::StaticProvider,
        diagnostics::Diagnostics,
        models::{CollectionMap, GameMap},
        provider::Provider,
    };
    use anyhow::Result;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        runs: Arc<AtomicUsize>,
    }

    impl Provider for CountingProvider {
        fn name(&self) -> &str {
            "counting"
        }

        fn find(&self, games: &mut GameMap, collections: &mut CollectionMap, _: &mut Diagnostics) -> Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            games.add_or_get("smb");
            collections.add_or_get("nes").add_game("smb");
            Ok(())
        }

        fn enhance(&self, _: &mut GameMap, _: &mut CollectionMap, _: &mut Diagnostics) -> Result<()> {
            Ok(())
        }
    }

    struct PanickingProvider;

    impl Provider for PanickingProvider {
        fn name(&self) -> &str {
            "panicking"
        }

        fn find(&self, _: &mut GameMap, _: &mut CollectionMap, _: &mut Diagnostics) -> Result<()> {
            panic!("provider bug");
        }

        fn enhance(&self, _: &mut GameMap, _: &mut CollectionMap, _: &mut Diagnostics) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn delivers_report_with_elapsed_time() {
        let mut loader = CatalogLoader::new(
            Aggregator::new().with_provider(StaticProvider::new("a", "arcade", vec!["pac-man"])),
        );
        assert!(loader.next_event().await.is_none());

        assert_eq!(loader.request_load(), LoadRequest::Started);
        assert!(loader.is_loading());
        match loader.next_event().await {
            Some(LoadEvent::Finished(report)) => {
                assert_eq!(report.catalog.game_count(), 1);
                assert!(report.diagnostics.is_empty());
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(!loader.is_loading());
    }

    #[tokio::test]
    async fn reload_requests_are_coalesced() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut loader = CatalogLoader::new(Aggregator::new().with_provider(CountingProvider {
            runs: Arc::clone(&runs),
        }));

        assert_eq!(loader.request_load(), LoadRequest::Started);
        assert_eq!(loader.request_load(), LoadRequest::Queued);
        assert_eq!(loader.request_load(), LoadRequest::Queued);

        assert!(matches!(loader.next_event().await, Some(LoadEvent::Finished(_))));
        assert!(loader.is_loading());
        assert!(!loader.has_pending());
        assert!(matches!(loader.next_event().await, Some(LoadEvent::Finished(_))));
        assert!(loader.next_event().await.is_none());
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn panicking_scan_reports_failure() {
        let mut loader = CatalogLoader::new(Aggregator::new().with_provider(PanickingProvider));
        loader.request_load();
        assert!(matches!(loader.next_event().await, Some(LoadEvent::Failed(_))));
        assert!(!loader.is_loading());
    }
}
