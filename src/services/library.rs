use crate::clients::{ClientError, EpisodeDiscovery};
use crate::db::Store;
use crate::domain::events::NotificationEvent;
use crate::domain::{DownloadStatus, SeriesId};
use crate::library::LibraryLayout;
use crate::models::catalog::CatalogEntry;
use crate::models::series::Series;
use crate::services::aggregator::SeriesStatusAggregator;
use crate::services::queue::JobDispatcher;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("Series {0} not found")]
    SeriesNotFound(SeriesId),

    #[error("Episode discovery failed: {0}")]
    Discovery(#[from] ClientError),

    #[error("File system error: {0}")]
    FileSystem(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for LibraryError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err.to_string())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AddSeriesResult {
    pub series: Series,
    pub created: bool,
    pub episodes: usize,
    pub queued: usize,
    /// `false` when the download queue was not running, so pending episodes
    /// will only start on a later check or manual start.
    pub dispatched: bool,
}

pub struct LibraryService {
    store: Store,
    discovery: Arc<dyn EpisodeDiscovery>,
    dispatcher: Arc<dyn JobDispatcher>,
    layout: LibraryLayout,
    http: reqwest::Client,
    write_metadata: bool,
    aggregator: SeriesStatusAggregator,
    event_bus: broadcast::Sender<NotificationEvent>,
}

impl LibraryService {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Store,
        discovery: Arc<dyn EpisodeDiscovery>,
        dispatcher: Arc<dyn JobDispatcher>,
        layout: LibraryLayout,
        http: reqwest::Client,
        write_metadata: bool,
        event_bus: broadcast::Sender<NotificationEvent>,
    ) -> Self {
        Self {
            aggregator: SeriesStatusAggregator::new(store.clone(), event_bus.clone()),
            store,
            discovery,
            dispatcher,
            layout,
            http,
            write_metadata,
            event_bus,
        }
    }

    /// Adds a catalog entry to the library, or refreshes it if it is already
    /// there, and queues every pending episode.
    ///
    /// Episodes that failed, were cancelled or were skipped go back to
    /// pending. Completed and in-flight episodes are left alone.
    pub async fn add_series(&self, entry: &CatalogEntry) -> Result<AddSeriesResult, LibraryError> {
        let dispatch_available = self.dispatcher.is_available();
        if !dispatch_available {
            warn!(
                title = %entry.title,
                "Download queue is not running; episodes will be added but downloads won't start automatically"
            );
        }

        let (series_id, created) = self.store.upsert_series(&entry.to_new_series()).await?;

        let discovered = self.discovery.discover_episodes(&entry.url).await?;
        if !discovered.genres.is_empty() {
            self.store
                .set_series_genres(series_id, &discovered.genres)
                .await?;
        }

        let series = self
            .store
            .get_series(series_id)
            .await?
            .ok_or(LibraryError::SeriesNotFound(series_id))?;

        if self.write_metadata
            && let Err(e) = self.layout.write_series_metadata(&self.http, &series).await
        {
            warn!(series_id = %series_id, error = %e, "Failed to write series metadata");
        }

        for episode in &discovered.episodes {
            if self
                .store
                .insert_episode_if_missing(series_id, &episode.number, &episode.url)
                .await?
                .is_none()
                && let Some(existing) = self.store.find_episode(series_id, &episode.number).await?
                && existing.status.is_resumable()
            {
                self.store.reset_episode_to_pending(existing.id).await?;
            }
        }

        let status = self.aggregator.recompute(series_id).await?;

        let pending = self
            .store
            .list_episodes_in(series_id, &[DownloadStatus::Pending])
            .await?;
        let queued = if dispatch_available {
            pending
                .iter()
                .filter(|episode| self.dispatcher.enqueue(episode.id))
                .count()
        } else {
            0
        };

        let episodes = discovered.episodes.len();
        info!(
            series_id = %series_id,
            title = %series.title,
            created,
            episodes,
            queued,
            "Series added to library"
        );
        let _ = self.event_bus.send(NotificationEvent::SeriesAdded {
            series_id,
            title: series.title.clone(),
            episodes,
        });

        Ok(AddSeriesResult {
            series: Series { status, ..series },
            created,
            episodes,
            queued,
            dispatched: dispatch_available,
        })
    }

    /// Deletes the series with all of its episodes, then its directory.
    pub async fn delete_series(&self, series_id: SeriesId) -> Result<Series, LibraryError> {
        let series = self
            .store
            .get_series(series_id)
            .await?
            .ok_or(LibraryError::SeriesNotFound(series_id))?;

        if !self.store.delete_series(series_id).await? {
            return Err(LibraryError::SeriesNotFound(series_id));
        }

        self.layout
            .remove_series_dir(&series.directory_name)
            .await
            .map_err(|e| LibraryError::FileSystem(e.to_string()))?;

        info!(series_id = %series_id, title = %series.title, "Series removed from library");
        Ok(series)
    }
}
