//! Runs every provider and merges their output into a [`Catalog`].

use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    catalog::Catalog,
    diagnostics::Diagnostics,
    models::{CollectionMap, GameMap},
    provider::Provider,
};

/// Result of one aggregation run.
#[derive(Debug, Default)]
pub struct Aggregation {
    /// The merged, pruned catalog.
    pub catalog: Catalog,
    /// Problems reported by providers along the way.
    pub diagnostics: Diagnostics,
}

/// Ordered set of providers merged into one catalog.
///
/// Registration order is the precedence order for conflicting attributes.
#[derive(Clone, Default)]
pub struct Aggregator {
    providers: Vec<Arc<dyn Provider>>,
}

impl Aggregator {
    /// Create an aggregator without providers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider. Providers run in registration order.
    pub fn with_provider(mut self, provider: impl Provider + 'static) -> Self {
        self.providers.push(Arc::new(provider));
        self
    }

    /// Register an already shared provider.
    pub fn push(&mut self, provider: Arc<dyn Provider>) {
        self.providers.push(provider);
    }

    /// Names of the registered providers.
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|provider| provider.name()).collect()
    }

    /// Run `find` for every provider, then `enhance` for every provider, then
    /// prune and order the result.
    ///
    /// Provider failures end up in the returned diagnostics; they never stop
    /// the remaining providers.
    pub fn run(&self) -> Aggregation {
        let mut games = GameMap::new();
        let mut collections = CollectionMap::new();
        let mut diagnostics = Diagnostics::new();

        for provider in &self.providers {
            if let Err(err) = provider.find(&mut games, &mut collections, &mut diagnostics) {
                diagnostics.report_error(provider.name(), &err.context("find failed"));
            }
            debug!(
                provider = provider.name(),
                games = games.len(),
                collections = collections.len(),
                "find finished"
            );
        }

        for provider in &self.providers {
            if let Err(err) = provider.enhance(&mut games, &mut collections, &mut diagnostics) {
                diagnostics.report_error(provider.name(), &err.context("enhance failed"));
            }
        }

        let catalog = Catalog::from_maps(games, collections);
        info!(
            platforms = catalog.platforms().len(),
            games = catalog.unique_game_count(),
            diagnostics = diagnostics.len(),
            "aggregation finished"
        );
        Aggregation {
            catalog,
            diagnostics,
        }
    }
}

impl std::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator")
            .field("providers", &self.provider_names())
            .finish()
    }
}
