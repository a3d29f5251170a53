use crate::clients::EpisodeDiscovery;
use crate::db::Store;
use crate::domain::events::NotificationEvent;
use crate::domain::{DownloadStatus, EpisodeId, SeriesId};
use crate::services::aggregator::SeriesStatusAggregator;
use crate::services::episode_state::EpisodeStateMachine;
use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiscoveryReport {
    pub checked: usize,
    pub queued: usize,
    pub failed: usize,
}

/// Periodic bridge between the episode source and the download pipeline.
pub struct DiscoveryBridge {
    store: Store,
    discovery: Arc<dyn EpisodeDiscovery>,
    machine: Arc<EpisodeStateMachine>,
    aggregator: SeriesStatusAggregator,
    event_bus: broadcast::Sender<NotificationEvent>,
}

impl DiscoveryBridge {
    #[must_use]
    pub fn new(
        store: Store,
        discovery: Arc<dyn EpisodeDiscovery>,
        machine: Arc<EpisodeStateMachine>,
        event_bus: broadcast::Sender<NotificationEvent>,
    ) -> Self {
        Self {
            aggregator: SeriesStatusAggregator::new(store.clone(), event_bus.clone()),
            store,
            discovery,
            machine,
            event_bus,
        }
    }

    /// Checks every series for episodes not yet in the library and queues
    /// them. A failing series is logged and counted; the pass continues.
    pub async fn check_for_new_episodes(&self, delay: Duration) -> Result<DiscoveryReport> {
        let series_ids = self.store.list_series_ids().await?;
        let mut report = DiscoveryReport::default();

        for (index, series_id) in series_ids.into_iter().enumerate() {
            if index > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match self.check_series(series_id).await {
                Ok(queued) => {
                    report.checked += 1;
                    report.queued += queued;
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(series_id = %series_id, error = %e, "Episode check failed");
                }
            }
        }

        info!(
            checked = report.checked,
            queued = report.queued,
            failed = report.failed,
            "Episode check finished"
        );
        let _ = self.event_bus.send(NotificationEvent::DiscoveryFinished {
            checked: report.checked,
            queued: report.queued,
            failed: report.failed,
        });

        Ok(report)
    }

    /// Returns the number of new episodes queued for the series.
    pub async fn check_series(&self, series_id: SeriesId) -> Result<usize> {
        let series = self
            .store
            .get_series(series_id)
            .await?
            .with_context(|| format!("Series {series_id} not found"))?;

        let discovered = self
            .discovery
            .discover_episodes(&series.source_url)
            .await
            .with_context(|| format!("Failed to discover episodes for '{}'", series.title))?;

        if !discovered.genres.is_empty() {
            self.store
                .set_series_genres(series_id, &discovered.genres)
                .await?;
        }

        let mut created: Vec<EpisodeId> = Vec::new();
        for episode in &discovered.episodes {
            if let Some(id) = self
                .store
                .insert_episode_if_missing(series_id, &episode.number, &episode.url)
                .await?
            {
                info!(series_id = %series_id, number = %episode.number, "New episode found");
                created.push(id);
            }
        }

        self.aggregator.recompute(series_id).await?;

        let dispatcher = self.machine.dispatcher();
        let queued = created.iter().filter(|id| dispatcher.enqueue(**id)).count();

        debug!(series_id = %series_id, created = created.len(), queued, "Series checked");
        Ok(queued)
    }

    /// Moves every failed episode back to pending and queues it again.
    /// Returns the number of episodes reset.
    pub async fn retry_failed_episodes(&self) -> Result<usize> {
        let failed = self
            .store
            .list_episodes_by_status(DownloadStatus::Failed)
            .await?;

        let mut retried = 0;
        for episode in failed {
            match self.machine.retry(episode.id).await {
                Ok(_) => retried += 1,
                Err(e) => warn!(episode_id = %episode.id, error = %e, "Failed to retry episode"),
            }
        }

        info!(retried, "Retried failed episodes");
        Ok(retried)
    }
}
