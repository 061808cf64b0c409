//! Shared domain models.

mod collection;
mod game;

pub use collection::{Collection, CollectionMap, Platform, PlatformInfo};
pub use game::{Game, GameAssets, GameMap, GameMetadata};

/// Fill `slot` with `value` unless it already holds something; the first
/// writer wins.
pub(crate) fn fill<T>(slot: &mut Option<T>, value: Option<T>) {
    if slot.is_none() {
        *slot = value;
    }
}
