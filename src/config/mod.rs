mod file_config;

pub use file_config::{EnrichmentConfig, FileConfig, SpotifyConfig};

use anyhow::{bail, Result};

pub const CLIENT_ID_ENV: &str = "SPOTIPY_CLIENT_ID";
pub const CLIENT_SECRET_ENV: &str = "SPOTIPY_CLIENT_SECRET";

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub spotify: SpotifySettings,
    pub enrichment: EnrichmentSettings,
}

#[derive(Debug, Clone)]
pub struct SpotifySettings {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub api_base: String,
    pub token_url: String,
    pub timeout_secs: u64,
    pub rate_limit_ms: u64,
    pub max_retries: u32,
}

impl Default for SpotifySettings {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            api_base: "https://api.spotify.com/v1".to_string(),
            token_url: "https://accounts.spotify.com/api/token".to_string(),
            timeout_secs: 30,
            rate_limit_ms: 100,
            max_retries: 5,
        }
    }
}

/// Table names used by the enrichment pass of `convert --audio-features`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentSettings {
    pub library_table: String,
    pub library_uri_column: String,
    pub library_dest_table: String,
    pub streaming_history_table: String,
    pub streaming_history_dest_table: String,
    pub view_name: String,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            library_table: "your_library_tracks".to_string(),
            library_uri_column: "uri".to_string(),
            library_dest_table: "library_tracks_audio_features".to_string(),
            streaming_history_table: "streaming_history".to_string(),
            streaming_history_dest_table: "streaming_history_audio_features".to_string(),
            view_name: "enriched_streaming_history".to_string(),
        }
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present; credentials fall back to
    /// the environment.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        Self::resolve_with_env(cli, file_config, |key| std::env::var(key).ok())
    }

    pub fn resolve_with_env(
        cli: &CliConfig,
        file_config: Option<FileConfig>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let file = file_config.unwrap_or_default();
        let defaults = SpotifySettings::default();

        let spotify_file = file.spotify.unwrap_or_default();
        let spotify = SpotifySettings {
            client_id: spotify_file
                .client_id
                .or_else(|| cli.client_id.clone())
                .or_else(|| env(CLIENT_ID_ENV))
                .filter(|s| !s.is_empty()),
            client_secret: spotify_file
                .client_secret
                .or_else(|| cli.client_secret.clone())
                .or_else(|| env(CLIENT_SECRET_ENV))
                .filter(|s| !s.is_empty()),
            api_base: spotify_file.api_base.unwrap_or(defaults.api_base),
            token_url: spotify_file.token_url.unwrap_or(defaults.token_url),
            timeout_secs: spotify_file.timeout_secs.unwrap_or(defaults.timeout_secs),
            rate_limit_ms: spotify_file.rate_limit_ms.unwrap_or(defaults.rate_limit_ms),
            max_retries: spotify_file.max_retries.unwrap_or(defaults.max_retries),
        };
        if spotify.timeout_secs == 0 {
            bail!("spotify.timeout_secs must be greater than zero");
        }

        let enrichment_file = file.enrichment.unwrap_or_default();
        let enrichment_defaults = EnrichmentSettings::default();
        let enrichment = EnrichmentSettings {
            library_table: enrichment_file
                .library_table
                .unwrap_or(enrichment_defaults.library_table),
            library_uri_column: enrichment_file
                .library_uri_column
                .unwrap_or(enrichment_defaults.library_uri_column),
            library_dest_table: enrichment_file
                .library_dest_table
                .unwrap_or(enrichment_defaults.library_dest_table),
            streaming_history_table: enrichment_file
                .streaming_history_table
                .unwrap_or(enrichment_defaults.streaming_history_table),
            streaming_history_dest_table: enrichment_file
                .streaming_history_dest_table
                .unwrap_or(enrichment_defaults.streaming_history_dest_table),
            view_name: enrichment_file
                .view_name
                .unwrap_or(enrichment_defaults.view_name),
        };

        Ok(Self {
            spotify,
            enrichment,
        })
    }
}
