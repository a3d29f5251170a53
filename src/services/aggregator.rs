use crate::db::Store;
use crate::domain::events::NotificationEvent;
use crate::domain::{DownloadStatus, SeriesId};
use anyhow::Result;
use tokio::sync::broadcast;
use tracing::debug;

/// Folds episode statuses into a series status.
///
/// The result depends only on the multiset of statuses, so repeated
/// recomputation is harmless.
pub fn aggregate_status<I>(statuses: I) -> DownloadStatus
where
    I: IntoIterator<Item = DownloadStatus>,
{
    let mut total = 0usize;
    let mut cancelled = 0usize;
    let mut skipped = 0usize;
    let mut terminal = 0usize;
    let mut any_failed = false;
    let mut any_downloading = false;

    for status in statuses {
        total += 1;
        match status {
            DownloadStatus::Cancelled => cancelled += 1,
            DownloadStatus::Skipped => skipped += 1,
            DownloadStatus::Failed => any_failed = true,
            DownloadStatus::Downloading => any_downloading = true,
            DownloadStatus::Completed | DownloadStatus::Pending => {}
        }
        if status.is_terminal() {
            terminal += 1;
        }
    }

    if total == 0 {
        return DownloadStatus::Pending;
    }

    if terminal == total {
        if cancelled == total {
            DownloadStatus::Cancelled
        } else if skipped == total {
            DownloadStatus::Skipped
        } else if any_failed {
            DownloadStatus::Failed
        } else {
            DownloadStatus::Completed
        }
    } else if any_downloading {
        DownloadStatus::Downloading
    } else {
        DownloadStatus::Pending
    }
}

#[derive(Clone)]
pub struct SeriesStatusAggregator {
    store: Store,
    event_bus: broadcast::Sender<NotificationEvent>,
}

impl SeriesStatusAggregator {
    #[must_use]
    pub const fn new(store: Store, event_bus: broadcast::Sender<NotificationEvent>) -> Self {
        Self { store, event_bus }
    }

    /// Rescans every episode of the series and persists the derived status.
    pub async fn recompute(&self, series_id: SeriesId) -> Result<DownloadStatus> {
        let statuses = self.store.episode_statuses(series_id).await?;
        let status = aggregate_status(statuses);

        self.store.set_series_status(series_id, status).await?;
        debug!(series_id = %series_id, status = %status, "Recomputed series status");

        let _ = self
            .event_bus
            .send(NotificationEvent::SeriesStatusChanged { series_id, status });

        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use DownloadStatus::{Cancelled, Completed, Downloading, Failed, Pending, Skipped};

    #[test]
    fn test_empty_is_pending() {
        assert_eq!(aggregate_status([]), Pending);
    }

    #[test]
    fn test_terminal_combinations() {
        assert_eq!(aggregate_status([Completed, Skipped]), Completed);
        assert_eq!(aggregate_status([Cancelled, Cancelled]), Cancelled);
        assert_eq!(aggregate_status([Skipped, Skipped]), Skipped);
        assert_eq!(aggregate_status([Completed, Failed]), Failed);
        assert_eq!(aggregate_status([Cancelled, Skipped]), Completed);
        assert_eq!(aggregate_status([Cancelled, Failed, Skipped]), Failed);
    }

    #[test]
    fn test_non_terminal_combinations() {
        assert_eq!(aggregate_status([Completed, Downloading]), Downloading);
        assert_eq!(aggregate_status([Pending, Downloading, Failed]), Downloading);
        assert_eq!(aggregate_status([Completed, Pending]), Pending);
        assert_eq!(aggregate_status([Failed, Pending]), Pending);
    }

    #[test]
    fn test_order_independent() {
        let statuses = [Completed, Failed, Downloading, Skipped, Pending, Cancelled];
        let expected = aggregate_status(statuses);

        let mut reversed = statuses;
        reversed.reverse();
        assert_eq!(aggregate_status(reversed), expected);

        let mut rotated = statuses;
        rotated.rotate_left(2);
        assert_eq!(aggregate_status(rotated), expected);
    }
}
