//! Domain events for the application.
//!
//! Events are published on the broadcast event bus whenever an episode or
//! series changes state, so long-running processes can observe the pipeline
//! without polling the store.

use super::{DownloadStatus, EpisodeId, SeriesId};
use serde::Serialize;

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum NotificationEvent {
    EpisodeStatusChanged {
        episode_id: EpisodeId,
        series_id: SeriesId,
        status: DownloadStatus,
    },
    EpisodeProgress {
        episode_id: EpisodeId,
        progress: u8,
    },
    SeriesStatusChanged {
        series_id: SeriesId,
        status: DownloadStatus,
    },
    SeriesAdded {
        series_id: SeriesId,
        title: String,
        episodes: usize,
    },
    DiscoveryFinished {
        checked: usize,
        queued: usize,
        failed: usize,
    },
    Error {
        message: String,
    },
}

impl NotificationEvent {
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::EpisodeStatusChanged { .. } => "EpisodeStatusChanged",
            Self::EpisodeProgress { .. } => "EpisodeProgress",
            Self::SeriesStatusChanged { .. } => "SeriesStatusChanged",
            Self::SeriesAdded { .. } => "SeriesAdded",
            Self::DiscoveryFinished { .. } => "DiscoveryFinished",
            Self::Error { .. } => "Error",
        }
    }
}
