//! Spotify Web API client.
//!
//! Uses the client-credentials flow, so only public catalog endpoints are
//! reachable. Requests are spaced by a configurable minimum interval and
//! HTTP 429 responses are retried after the advertised `Retry-After`.

use super::models::{AudioFeatures, CatalogTrack};
use super::trait_def::CatalogClient;
use crate::config::SpotifySettings;
use anyhow::Result;
use reqwest::blocking::{Client, Response};
use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Maximum number of ids accepted by the batch audio features endpoint.
const AUDIO_FEATURES_BATCH: usize = 100;
/// Tokens are refreshed this long before they expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);
const TRACK_URI_PREFIX: &str = "spotify:track:";
const TRACK_URL_PATH: &str = "/track/";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Spotify client id and secret are required")]
    MissingCredentials,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Spotify API returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Still rate limited after {0} retries")]
    RateLimited(u32),

    #[error("Not a track URI: {0}")]
    InvalidUri(String),
}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Deserialize)]
struct SearchResponse {
    tracks: Option<Paging<CatalogTrack>>,
}

#[derive(Deserialize)]
struct Paging<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Deserialize)]
struct AudioFeaturesResponse {
    #[serde(default)]
    audio_features: Vec<Option<AudioFeatures>>,
}

/// Extracts the track id from a `spotify:track:<id>` URI, an
/// `open.spotify.com/track/<id>` URL or a bare id.
pub fn track_id(uri: &str) -> Result<&str, CatalogError> {
    let candidate = if let Some(id) = uri.strip_prefix(TRACK_URI_PREFIX) {
        id
    } else if let Some(start) = uri.find(TRACK_URL_PATH) {
        let rest = &uri[start + TRACK_URL_PATH.len()..];
        rest.split(['?', '#', '/']).next().unwrap_or(rest)
    } else {
        uri
    };
    if !candidate.is_empty() && candidate.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(candidate)
    } else {
        Err(CatalogError::InvalidUri(uri.to_string()))
    }
}

pub struct SpotifyClient {
    client: Client,
    client_id: String,
    client_secret: String,
    api_base: String,
    token_url: String,
    rate_limit_interval: Duration,
    max_retries: u32,
    last_request: Mutex<Instant>,
    token: Mutex<Option<AccessToken>>,
}

impl SpotifyClient {
    pub fn new(settings: &SpotifySettings) -> Result<Self> {
        let (Some(client_id), Some(client_secret)) =
            (settings.client_id.clone(), settings.client_secret.clone())
        else {
            return Err(CatalogError::MissingCredentials.into());
        };

        let client = Client::builder()
            .user_agent(concat!("spotify-to-sqlite/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        let rate_limit_interval = Duration::from_millis(settings.rate_limit_ms);

        Ok(Self {
            client,
            client_id,
            client_secret,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            token_url: settings.token_url.clone(),
            rate_limit_interval,
            max_retries: settings.max_retries,
            last_request: Mutex::new(Instant::now() - rate_limit_interval),
            token: Mutex::new(None),
        })
    }

    fn rate_limit(&self) {
        let mut last = self.last_request.lock().unwrap();
        let elapsed = last.elapsed();
        if elapsed < self.rate_limit_interval {
            std::thread::sleep(self.rate_limit_interval - elapsed);
        }
        *last = Instant::now();
    }

    fn access_token(&self) -> Result<String, CatalogError> {
        let mut token = self.token.lock().unwrap();
        if let Some(current) = token.as_ref() {
            if current.expires_at > Instant::now() + TOKEN_EXPIRY_MARGIN {
                return Ok(current.value.clone());
            }
        }

        debug!("Requesting Spotify access token");
        let response = self
            .client
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()?;
        let response = check_status(response)?;
        let body: TokenResponse = response.json()?;

        let value = body.access_token.clone();
        *token = Some(AccessToken {
            value: body.access_token,
            expires_at: Instant::now() + Duration::from_secs(body.expires_in),
        });
        Ok(value)
    }

    fn clear_token(&self) {
        *self.token.lock().unwrap() = None;
    }

    /// GETs `path` (relative to the API base), `None` on 404.
    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, CatalogError> {
        let url = format!("{}{}", self.api_base, path);
        let mut retries = 0;
        let mut refreshed_token = false;
        loop {
            let token = self.access_token()?;
            self.rate_limit();
            let response = self.client.get(&url).bearer_auth(&token).send()?;

            match response.status() {
                StatusCode::NOT_FOUND => return Ok(None),
                StatusCode::UNAUTHORIZED if !refreshed_token => {
                    debug!("Access token rejected, requesting a new one");
                    self.clear_token();
                    refreshed_token = true;
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    if retries >= self.max_retries {
                        return Err(CatalogError::RateLimited(retries));
                    }
                    let wait = response
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.trim().parse::<u64>().ok())
                        .map(Duration::from_secs)
                        .unwrap_or(DEFAULT_RETRY_AFTER);
                    warn!("Rate limited by Spotify, retrying in {:?}", wait);
                    std::thread::sleep(wait);
                    retries += 1;
                }
                _ => return Ok(Some(check_status(response)?.json()?)),
            }
        }
    }
}

fn check_status(response: Response) -> Result<Response, CatalogError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().unwrap_or_default();
    Err(CatalogError::Status {
        status: status.as_u16(),
        message,
    })
}

impl CatalogClient for SpotifyClient {
    fn search_tracks(&self, query: &str, limit: usize) -> Result<Vec<CatalogTrack>> {
        let path = format!(
            "/search?q={}&type=track&limit={}",
            urlencoding::encode(query),
            limit
        );
        let response: Option<SearchResponse> = self.get_json(&path)?;
        Ok(response
            .and_then(|r| r.tracks)
            .map(|paging| paging.items)
            .unwrap_or_default())
    }

    fn track(&self, uri: &str) -> Result<Option<CatalogTrack>> {
        let id = track_id(uri)?;
        Ok(self.get_json(&format!("/tracks/{}", id))?)
    }

    fn audio_features(&self, uris: &[String]) -> Result<Vec<Option<AudioFeatures>>> {
        let mut features = Vec::with_capacity(uris.len());
        for chunk in uris.chunks(AUDIO_FEATURES_BATCH) {
            let ids: Vec<Option<&str>> = chunk.iter().map(|uri| track_id(uri).ok()).collect();
            let valid: Vec<&str> = ids.iter().flatten().copied().collect();
            if valid.is_empty() {
                features.extend(chunk.iter().map(|_| None));
                continue;
            }

            let response: Option<AudioFeaturesResponse> =
                self.get_json(&format!("/audio-features?ids={}", valid.join(",")))?;
            let mut found = response.map(|r| r.audio_features).unwrap_or_default().into_iter();
            for id in ids {
                features.push(match id {
                    Some(_) => found.next().flatten(),
                    None => None,
                });
            }
        }
        Ok(features)
    }
}
