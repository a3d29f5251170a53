//! Per-episode download lifecycle.
//!
//! ```text
//! pending -> downloading -> completed | failed | cancelled | skipped
//! failed | cancelled | skipped -> pending
//! ```
//!
//! Pipeline transitions (`start_download`, resolution, transfer) and control
//! actions (`cancel`, `skip`, `resume`, `retry`) may run concurrently on the
//! same episode. They only meet in the store: every gating decision re-reads
//! the persisted status, and every write touches only the columns it owns.

use crate::db::Store;
use crate::domain::events::NotificationEvent;
use crate::domain::{AbortReason, DownloadStatus, EpisodeId, SeriesId};
use crate::library::LibraryLayout;
use crate::models::episode::Episode;
use crate::services::aggregator::SeriesStatusAggregator;
use crate::services::queue::JobDispatcher;
use crate::services::resolver::VideoUrlResolver;
use crate::services::transfer::{
    CancelProbe, ProgressSink, StreamingDownloader, TransferOutcome,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum EpisodeError {
    #[error("Episode {0} not found")]
    NotFound(EpisodeId),

    #[error("Series {0} not found")]
    SeriesNotFound(SeriesId),

    #[error("Cannot {action} episode {id} while it is {status}")]
    InvalidTransition {
        id: EpisodeId,
        action: &'static str,
        status: DownloadStatus,
    },

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for EpisodeError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// What a download job did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartReport {
    /// The episode was not pending; nothing was written.
    NotStarted(DownloadStatus),
    /// The job ran and left the episode in this status.
    Finished(DownloadStatus),
}

pub struct EpisodeStateMachine {
    store: Store,
    resolver: VideoUrlResolver,
    downloader: StreamingDownloader,
    layout: LibraryLayout,
    aggregator: SeriesStatusAggregator,
    dispatcher: Arc<dyn JobDispatcher>,
    event_bus: broadcast::Sender<NotificationEvent>,
}

impl EpisodeStateMachine {
    #[must_use]
    pub fn new(
        store: Store,
        resolver: VideoUrlResolver,
        downloader: StreamingDownloader,
        layout: LibraryLayout,
        dispatcher: Arc<dyn JobDispatcher>,
        event_bus: broadcast::Sender<NotificationEvent>,
    ) -> Self {
        Self {
            aggregator: SeriesStatusAggregator::new(store.clone(), event_bus.clone()),
            store,
            resolver,
            downloader,
            layout,
            dispatcher,
            event_bus,
        }
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Arc<dyn JobDispatcher> {
        &self.dispatcher
    }

    /// Job entry point. Any fault is persisted as a failed status with a
    /// message, so the episode never stays stuck in `downloading`.
    pub async fn run(&self, id: EpisodeId) -> StartReport {
        match self.start_download(id).await {
            Ok(report) => report,
            Err(e) => {
                error!(episode_id = %id, error = %e, "Download job failed");
                self.mark_failed(id, &e.to_string()).await;
                StartReport::Finished(DownloadStatus::Failed)
            }
        }
    }

    pub async fn start_download(&self, id: EpisodeId) -> Result<StartReport, EpisodeError> {
        let episode = self.load(id).await?;

        if !self.store.mark_episode_downloading(id).await? {
            let current = self
                .store
                .get_episode_status(id)
                .await?
                .unwrap_or(episode.status);
            debug!(episode_id = %id, status = %current, "Episode not pending, job skipped");
            return Ok(StartReport::NotStarted(current));
        }

        info!(episode_id = %id, series_id = %episode.series_id, number = %episode.number, "Starting download");
        self.emit_status(id, episode.series_id, DownloadStatus::Downloading);
        self.recompute(episode.series_id).await;

        let Some(video_url) = self.resolve_if_needed(&episode).await? else {
            return Ok(StartReport::Finished(DownloadStatus::Failed));
        };

        if let Some(reason) = self
            .store
            .get_episode_status(id)
            .await?
            .and_then(AbortReason::from_status)
        {
            info!(episode_id = %id, reason = %reason, "Download stopped before transfer");
            self.recompute(episode.series_id).await;
            return Ok(StartReport::Finished(reason.status()));
        }

        let status = self.run_transfer(&episode, &video_url).await?;
        Ok(StartReport::Finished(status))
    }

    /// Returns the playable URL, resolving and persisting it on first use.
    /// A resolution failure is recorded on the episode and yields `None`.
    pub async fn resolve_if_needed(
        &self,
        episode: &Episode,
    ) -> Result<Option<String>, EpisodeError> {
        if let Some(url) = episode.video_url.as_deref().filter(|u| !u.is_empty()) {
            return Ok(Some(url.to_string()));
        }

        match self.resolver.resolve(&episode.source_url).await {
            Ok(url) => {
                self.store.set_episode_video_url(episode.id, &url).await?;
                debug!(episode_id = %episode.id, video_url = %url, "Resolved video URL");
                Ok(Some(url))
            }
            Err(e) => {
                warn!(episode_id = %episode.id, error = %e, "Failed to resolve video URL");
                let message = e.to_string();
                self.store.mark_episode_failed(episode.id, &message).await?;
                self.emit_error(episode.id, &message);
                self.emit_status(episode.id, episode.series_id, DownloadStatus::Failed);
                self.recompute(episode.series_id).await;
                Ok(None)
            }
        }
    }

    pub async fn run_transfer(
        &self,
        episode: &Episode,
        video_url: &str,
    ) -> Result<DownloadStatus, EpisodeError> {
        let series = self
            .store
            .get_series(episode.series_id)
            .await?
            .ok_or(EpisodeError::SeriesNotFound(episode.series_id))?;

        let dest = self.layout.episode_path(&series, &episode.number);
        let probe = StoreCancelProbe {
            store: self.store.clone(),
            episode_id: episode.id,
        };
        let sink = StoreProgressSink {
            store: self.store.clone(),
            event_bus: self.event_bus.clone(),
            episode_id: episode.id,
        };

        let status = match self.downloader.download(video_url, &dest, &sink, &probe).await {
            TransferOutcome::Completed { bytes } => {
                let public = self.layout.public_path(&series, &episode.number);
                self.store.mark_episode_completed(episode.id, &public).await?;
                info!(
                    episode_id = %episode.id,
                    bytes,
                    path = %dest.display(),
                    "Download completed"
                );
                DownloadStatus::Completed
            }
            TransferOutcome::Aborted(reason) => {
                info!(episode_id = %episode.id, reason = %reason, "Download aborted");
                self.settle_abort(episode.id, reason).await?
            }
            TransferOutcome::Failed(e) => {
                warn!(episode_id = %episode.id, error = %e, "Download failed");
                let message = e.to_string();
                self.store.mark_episode_failed(episode.id, &message).await?;
                self.emit_error(episode.id, &message);
                DownloadStatus::Failed
            }
        };

        self.emit_status(episode.id, episode.series_id, status);
        self.recompute(episode.series_id).await;
        Ok(status)
    }

    /// Status an aborted transfer leaves behind. The abort itself was
    /// written by the control action; a later action (a resume) wins.
    async fn settle_abort(
        &self,
        id: EpisodeId,
        reason: AbortReason,
    ) -> Result<DownloadStatus, EpisodeError> {
        let current = self
            .store
            .get_episode_status(id)
            .await?
            .ok_or(EpisodeError::NotFound(id))?;

        if current != reason.status() {
            debug!(episode_id = %id, reason = %reason, status = %current, "Episode changed after abort");
        }
        Ok(current)
    }

    // ========================================================================
    // Control actions
    // ========================================================================

    pub async fn cancel(&self, id: EpisodeId) -> Result<(), EpisodeError> {
        self.abort(id, AbortReason::Cancelled).await
    }

    pub async fn skip(&self, id: EpisodeId) -> Result<(), EpisodeError> {
        self.abort(id, AbortReason::Skipped).await
    }

    async fn abort(&self, id: EpisodeId, reason: AbortReason) -> Result<(), EpisodeError> {
        let episode = self.load(id).await?;
        if !matches!(
            episode.status,
            DownloadStatus::Pending | DownloadStatus::Downloading
        ) {
            return Err(EpisodeError::InvalidTransition {
                id,
                action: action_name(reason),
                status: episode.status,
            });
        }

        self.store.set_episode_status(id, reason.status()).await?;
        info!(episode_id = %id, reason = %reason, "Episode download stopped");
        self.emit_status(id, episode.series_id, reason.status());
        self.recompute(episode.series_id).await;
        Ok(())
    }

    /// Moves a failed, cancelled or skipped episode back to pending and
    /// queues it. Returns whether a job was queued.
    pub async fn resume(&self, id: EpisodeId) -> Result<bool, EpisodeError> {
        let episode = self.load(id).await?;
        if !episode.status.is_resumable() {
            return Err(EpisodeError::InvalidTransition {
                id,
                action: "resume",
                status: episode.status,
            });
        }

        self.store.reset_episode_to_pending(id).await?;
        self.emit_status(id, episode.series_id, DownloadStatus::Pending);
        self.recompute(episode.series_id).await;

        Ok(self.dispatch(id))
    }

    pub async fn retry(&self, id: EpisodeId) -> Result<bool, EpisodeError> {
        self.resume(id).await
    }

    /// Queues a job for one episode. The job itself is a no-op unless the
    /// episode is still pending when it runs.
    pub async fn request_download(&self, id: EpisodeId) -> Result<bool, EpisodeError> {
        let episode = self.load(id).await?;
        if episode.status != DownloadStatus::Pending {
            return Err(EpisodeError::InvalidTransition {
                id,
                action: "start",
                status: episode.status,
            });
        }
        Ok(self.dispatch(id))
    }

    pub async fn cancel_series(&self, series_id: SeriesId) -> Result<u64, EpisodeError> {
        self.abort_series(series_id, AbortReason::Cancelled).await
    }

    pub async fn skip_series(&self, series_id: SeriesId) -> Result<u64, EpisodeError> {
        self.abort_series(series_id, AbortReason::Skipped).await
    }

    async fn abort_series(
        &self,
        series_id: SeriesId,
        reason: AbortReason,
    ) -> Result<u64, EpisodeError> {
        self.ensure_series(series_id).await?;

        let changed = self
            .store
            .set_series_episodes_status_except(
                series_id,
                reason.status(),
                &[DownloadStatus::Completed, DownloadStatus::Failed],
            )
            .await?;

        info!(series_id = %series_id, reason = %reason, changed, "Series downloads stopped");
        self.recompute(series_id).await;
        Ok(changed)
    }

    /// Resumes every failed, cancelled or skipped episode of the series.
    /// Returns the number of episodes moved back to pending.
    pub async fn resume_series(&self, series_id: SeriesId) -> Result<usize, EpisodeError> {
        self.ensure_series(series_id).await?;

        let episodes = self
            .store
            .list_episodes_in(series_id, &DownloadStatus::RESUMABLE)
            .await?;

        for episode in &episodes {
            self.store.reset_episode_to_pending(episode.id).await?;
            self.emit_status(episode.id, series_id, DownloadStatus::Pending);
        }
        self.recompute(series_id).await;

        if !episodes.is_empty() && !self.dispatcher.is_available() {
            warn!(series_id = %series_id, "Download queue unavailable, resumed episodes will not start automatically");
        }
        for episode in &episodes {
            self.dispatch(episode.id);
        }

        info!(series_id = %series_id, resumed = episodes.len(), "Series downloads resumed");
        Ok(episodes.len())
    }

    /// Records a failure that happened outside the normal pipeline flow.
    /// Never fails; store errors are logged.
    pub async fn mark_failed(&self, id: EpisodeId, message: &str) {
        if let Err(e) = self.store.mark_episode_failed(id, message).await {
            error!(episode_id = %id, error = %e, "Failed to persist episode failure");
            return;
        }
        self.emit_error(id, message);

        match self.store.get_episode(id).await {
            Ok(Some(episode)) => {
                self.emit_status(id, episode.series_id, DownloadStatus::Failed);
                self.recompute(episode.series_id).await;
            }
            Ok(None) => {}
            Err(e) => error!(episode_id = %id, error = %e, "Failed to reload episode"),
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn load(&self, id: EpisodeId) -> Result<Episode, EpisodeError> {
        self.store
            .get_episode(id)
            .await?
            .ok_or(EpisodeError::NotFound(id))
    }

    async fn ensure_series(&self, series_id: SeriesId) -> Result<(), EpisodeError> {
        self.store
            .get_series(series_id)
            .await?
            .map(|_| ())
            .ok_or(EpisodeError::SeriesNotFound(series_id))
    }

    fn dispatch(&self, id: EpisodeId) -> bool {
        if !self.dispatcher.is_available() {
            warn!(episode_id = %id, "Download queue unavailable, episode will not start automatically");
            return false;
        }
        self.dispatcher.enqueue(id)
    }

    async fn recompute(&self, series_id: SeriesId) {
        if let Err(e) = self.aggregator.recompute(series_id).await {
            error!(series_id = %series_id, error = %e, "Failed to recompute series status");
        }
    }

    fn emit_error(&self, episode_id: EpisodeId, message: &str) {
        let _ = self.event_bus.send(NotificationEvent::Error {
            message: format!("Episode {episode_id} failed: {message}"),
        });
    }

    fn emit_status(&self, episode_id: EpisodeId, series_id: SeriesId, status: DownloadStatus) {
        let _ = self.event_bus.send(NotificationEvent::EpisodeStatusChanged {
            episode_id,
            series_id,
            status,
        });
    }
}

const fn action_name(reason: AbortReason) -> &'static str {
    match reason {
        AbortReason::Cancelled => "cancel",
        AbortReason::Skipped => "skip",
    }
}

/// Reads the persisted status at every checkpoint.
struct StoreCancelProbe {
    store: Store,
    episode_id: EpisodeId,
}

#[async_trait::async_trait]
impl CancelProbe for StoreCancelProbe {
    async fn should_abort(&self) -> anyhow::Result<Option<AbortReason>> {
        let status = self.store.get_episode_status(self.episode_id).await?;
        Ok(status.and_then(AbortReason::from_status))
    }
}

struct StoreProgressSink {
    store: Store,
    event_bus: broadcast::Sender<NotificationEvent>,
    episode_id: EpisodeId,
}

#[async_trait::async_trait]
impl ProgressSink for StoreProgressSink {
    async fn report(&self, percent: u8) -> anyhow::Result<()> {
        self.store
            .set_episode_progress(self.episode_id, percent)
            .await?;
        let _ = self.event_bus.send(NotificationEvent::EpisodeProgress {
            episode_id: self.episode_id,
            progress: percent,
        });
        Ok(())
    }
}
