pub mod animeunity;

pub use animeunity::AnimeUnityClient;

use crate::domain::EpisodeNumber;
use crate::models::catalog::CatalogEntry;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredEpisode {
    pub number: EpisodeNumber,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveredEpisodes {
    /// Sorted by numeric episode order; symbolic numbers sort first.
    pub episodes: Vec<DiscoveredEpisode>,
    pub genres: Vec<String>,
}

#[async_trait::async_trait]
pub trait CatalogSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<CatalogEntry>, ClientError>;
}

#[async_trait::async_trait]
pub trait EpisodeDiscovery: Send + Sync {
    async fn discover_episodes(&self, series_url: &str) -> Result<DiscoveredEpisodes, ClientError>;
}
