use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    pub spotify: Option<SpotifyConfig>,
    pub enrichment: Option<EnrichmentConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SpotifyConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub api_base: Option<String>,
    pub token_url: Option<String>,
    pub timeout_secs: Option<u64>,
    /// Minimum interval between two API requests.
    pub rate_limit_ms: Option<u64>,
    pub max_retries: Option<u32>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub library_table: Option<String>,
    pub library_uri_column: Option<String>,
    pub library_dest_table: Option<String>,
    pub streaming_history_table: Option<String>,
    pub streaming_history_dest_table: Option<String>,
    pub view_name: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
