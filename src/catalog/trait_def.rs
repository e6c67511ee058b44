//! CatalogClient trait definition.

use super::models::{AudioFeatures, CatalogTrack};
use anyhow::Result;

/// Remote lookups needed by enrichment.
///
/// "Nothing found" is a regular outcome (`Ok(None)`, empty lists); errors
/// are reserved for transport and protocol failures.
#[cfg_attr(feature = "mock", mockall::automock)]
pub trait CatalogClient {
    /// Tracks matching a free text query, best match first.
    fn search_tracks(&self, query: &str, limit: usize) -> Result<Vec<CatalogTrack>>;

    /// A single track by URI (`spotify:track:<id>`) or bare id.
    fn track(&self, uri: &str) -> Result<Option<CatalogTrack>>;

    /// Audio features for each of `uris`, in the same order.
    fn audio_features(&self, uris: &[String]) -> Result<Vec<Option<AudioFeatures>>>;
}
