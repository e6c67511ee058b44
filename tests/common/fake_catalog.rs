//! Deterministic in-memory catalog

#![allow(dead_code)]

use super::constants::*;
use anyhow::{bail, Result};
use spotify_to_sqlite::catalog::{
    AudioFeatures, CatalogArtist, CatalogClient, CatalogTrack, ExternalUrls,
};
use std::cell::RefCell;

/// Answers searches of the form "<artist> <track>" and lookups by URI for a
/// fixed set of tracks, and records every call it receives.
pub struct FakeCatalog {
    tracks: Vec<CatalogTrack>,
    /// URIs whose audio features are unknown.
    without_features: Vec<String>,
    /// Queries or URIs that fail as a network error would.
    failing: Vec<String>,
    pub searches: RefCell<Vec<String>>,
    pub lookups: RefCell<Vec<String>>,
    pub feature_requests: RefCell<Vec<String>>,
}

fn catalog_track(artist: &str, name: &str, uri: &str, popularity: i64) -> CatalogTrack {
    let id = uri.rsplit(':').next().unwrap_or(uri).to_string();
    CatalogTrack {
        id: Some(id.clone()),
        uri: uri.to_string(),
        name: name.to_string(),
        artists: vec![CatalogArtist {
            name: artist.to_string(),
            uri: Some(format!("spotify:artist:{}", artist.replace(' ', ""))),
        }],
        external_urls: ExternalUrls {
            spotify: Some(format!("https://open.spotify.com/track/{}", id)),
        },
        duration_ms: Some(300000),
        explicit: Some(false),
        popularity: Some(popularity),
        preview_url: None,
        track_number: Some(1),
        item_type: Some("track".to_string()),
    }
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self {
            tracks: vec![
                catalog_track(ARTIST_1_NAME, TRACK_1_NAME, TRACK_1_URI, 80),
                catalog_track(ARTIST_2_NAME, TRACK_2_NAME, TRACK_2_URI, 75),
                catalog_track(ARTIST_2_NAME, TRACK_3_NAME, TRACK_3_URI, 60),
            ],
            without_features: vec![],
            failing: vec![],
            searches: RefCell::new(vec![]),
            lookups: RefCell::new(vec![]),
            feature_requests: RefCell::new(vec![]),
        }
    }

    pub fn without_features_for(mut self, uri: &str) -> Self {
        self.without_features.push(uri.to_string());
        self
    }

    pub fn failing_for(mut self, query_or_uri: &str) -> Self {
        self.failing.push(query_or_uri.to_string());
        self
    }

    pub fn call_count(&self) -> usize {
        self.searches.borrow().len() + self.lookups.borrow().len()
    }
}

impl CatalogClient for FakeCatalog {
    fn search_tracks(&self, query: &str, limit: usize) -> Result<Vec<CatalogTrack>> {
        self.searches.borrow_mut().push(query.to_string());
        if self.failing.iter().any(|f| f == query) {
            bail!("connection reset while searching {}", query);
        }
        Ok(self
            .tracks
            .iter()
            .filter(|t| format!("{} {}", t.artists[0].name, t.name) == query)
            .take(limit)
            .cloned()
            .collect())
    }

    fn track(&self, uri: &str) -> Result<Option<CatalogTrack>> {
        self.lookups.borrow_mut().push(uri.to_string());
        if self.failing.iter().any(|f| f == uri) {
            bail!("connection reset while fetching {}", uri);
        }
        Ok(self.tracks.iter().find(|t| t.uri == uri).cloned())
    }

    fn audio_features(&self, uris: &[String]) -> Result<Vec<Option<AudioFeatures>>> {
        self.feature_requests
            .borrow_mut()
            .extend(uris.iter().cloned());
        Ok(uris
            .iter()
            .map(|uri| {
                if self.without_features.contains(uri) {
                    return None;
                }
                let track = self.tracks.iter().find(|t| &t.uri == uri)?;
                Some(AudioFeatures {
                    id: track.id.clone(),
                    uri: Some(track.uri.clone()),
                    track_href: None,
                    analysis_url: None,
                    danceability: Some(0.6),
                    energy: Some(0.7),
                    key: Some(5),
                    loudness: Some(-6.5),
                    mode: Some(1),
                    speechiness: Some(0.05),
                    acousticness: Some(0.1),
                    instrumentalness: Some(0.0),
                    liveness: Some(0.2),
                    valence: Some(0.8),
                    tempo: Some(122.0),
                    duration_ms: track.duration_ms,
                    time_signature: Some(4),
                    item_type: Some("audio_features".to_string()),
                })
            })
            .collect())
    }
}
