//! Data sources that discover and enrich games.

mod directory;
mod entries;
mod library;

pub use directory::{DirectoryProvider, DEFAULT_SCAN_DEPTH};
pub use library::LibraryProvider;

use anyhow::Result;

use crate::{
    diagnostics::Diagnostics,
    models::{CollectionMap, GameMap},
};

/// A source of games and collections.
///
/// Providers run in two phases over maps shared by every provider. `find`
/// only adds new entities or links existing ones; `enhance` only fills in
/// attributes of entities already present. Both must tolerate broken input:
/// per-item problems go into `diagnostics`, and an `Err` return is recorded
/// as a diagnostic for the provider without aborting the load.
pub trait Provider: Send + Sync {
    /// Short name used as the diagnostics source.
    fn name(&self) -> &str;

    /// Discover games and collections.
    fn find(
        &self,
        games: &mut GameMap,
        collections: &mut CollectionMap,
        diagnostics: &mut Diagnostics,
    ) -> Result<()>;

    /// Attach secondary metadata to known entities.
    ///
    /// Must be idempotent. Attributes are only ever filled, never
    /// overwritten: when two providers supply different values for the same
    /// single-valued attribute, the provider registered first with the
    /// [`Aggregator`](crate::Aggregator) wins. List-valued attributes are
    /// unioned, so they do not depend on order at all.
    fn enhance(
        &self,
        games: &mut GameMap,
        collections: &mut CollectionMap,
        diagnostics: &mut Diagnostics,
    ) -> Result<()>;
}

/// Key identifying a file based game: its canonical path when resolvable.
pub(crate) fn file_key(path: &std::path::Path) -> (std::path::PathBuf, String) {
    let canonical = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let key = canonical.to_string_lossy().into_owned();
    (canonical, key)
}
