#![warn(clippy::all, missing_docs)]

//! Core library for the gamedeck frontend.
//!
//! This crate discovers games and collections through pluggable providers,
//! merges them into a single catalog on a background task, and exposes the
//! selection cursor and launch handshake consumed by any frontend.

pub mod aggregator;
pub mod api;
pub mod catalog;
pub mod config;
pub mod diagnostics;
pub mod events;
pub mod launch;
pub mod loader;
pub mod models;
pub mod provider;
pub mod selection;
pub mod stats;

pub use aggregator::{Aggregation, Aggregator};
pub use api::Api;
pub use catalog::Catalog;
pub use config::AppConfig;
pub use diagnostics::{Diagnostic, Diagnostics};
pub use events::{ApiEvent, EventBus};
pub use launch::{LaunchCommand, LaunchError, ProcessLauncher};
pub use loader::{CatalogLoader, LoadEvent, LoadReport, LoadRequest};
pub use models::{Collection, CollectionMap, Game, GameAssets, GameMap, GameMetadata, Platform, PlatformInfo};
pub use provider::{DirectoryProvider, LibraryProvider, Provider};
pub use selection::{LoadMeta, Selection, SelectionError};
pub use stats::{PlayRecord, PlayStats};
