use crate::domain::{DownloadStatus, EpisodeId, EpisodeNumber, SeriesId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub id: EpisodeId,
    pub series_id: SeriesId,
    pub number: EpisodeNumber,
    pub source_url: String,
    pub video_url: Option<String>,
    pub status: DownloadStatus,
    pub progress: u8,
    pub file_path: Option<String>,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A completed episode joined with its series title, for listings.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadedEpisode {
    pub episode: Episode,
    pub series_title: String,
}
