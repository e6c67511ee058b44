//! Conversion of Spotify personal data exports into SQLite databases.
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod catalog;
pub mod config;
pub mod enrichment;
pub mod export;
pub mod flatten;
pub mod naming;
pub mod progress;
pub mod sqlite_persistence;

pub use catalog::{CatalogClient, SpotifyClient};
pub use export::{ConvertOptions, ConvertReport, ExportArchive, ExportConverter};
pub use sqlite_persistence::ExportDatabase;
