use crate::domain::{DownloadStatus, EpisodeId, EpisodeNumber, SeriesId};
use crate::entities::{episodes, prelude::*, series};
use crate::models::episode::{DownloadedEpisode, Episode};
use anyhow::Result;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    UpdateMany,
};

/// Repository for episode rows.
///
/// Every mutation is a column-scoped `UPDATE` so that a control action and an
/// in-flight transfer writing the same row only overwrite the fields they own.
pub struct EpisodeRepository {
    conn: DatabaseConnection,
}

impl EpisodeRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    // ========================================================================
    // Model Conversion Helpers
    // ========================================================================

    fn map_model(m: episodes::Model) -> Episode {
        Episode {
            id: EpisodeId::new(m.id),
            series_id: SeriesId::new(m.series_id),
            number: EpisodeNumber::new(&m.number),
            source_url: m.source_url,
            video_url: m.video_url,
            status: m.status,
            progress: u8::try_from(m.progress.clamp(0, 100)).unwrap_or(0),
            file_path: m.file_path,
            error_message: m.error_message,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }

    fn update_one(id: EpisodeId) -> UpdateMany<Episodes> {
        Episodes::update_many()
            .col_expr(
                episodes::Column::UpdatedAt,
                Expr::value(chrono::Utc::now().to_rfc3339()),
            )
            .filter(episodes::Column::Id.eq(id.value()))
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub async fn get(&self, id: EpisodeId) -> Result<Option<Episode>> {
        let model = Episodes::find_by_id(id.value()).one(&self.conn).await?;
        Ok(model.map(Self::map_model))
    }

    /// Reads only the persisted status; used wherever a decision depends on
    /// what other actors may have written concurrently.
    pub async fn get_status(&self, id: EpisodeId) -> Result<Option<DownloadStatus>> {
        let status = Episodes::find_by_id(id.value())
            .select_only()
            .column(episodes::Column::Status)
            .into_tuple::<DownloadStatus>()
            .one(&self.conn)
            .await?;
        Ok(status)
    }

    pub async fn find_by_number(
        &self,
        series_id: SeriesId,
        number: &EpisodeNumber,
    ) -> Result<Option<Episode>> {
        let model = Episodes::find()
            .filter(episodes::Column::SeriesId.eq(series_id.value()))
            .filter(episodes::Column::Number.eq(number.as_str()))
            .one(&self.conn)
            .await?;
        Ok(model.map(Self::map_model))
    }

    pub async fn list_for_series(&self, series_id: SeriesId) -> Result<Vec<Episode>> {
        let rows = Episodes::find()
            .filter(episodes::Column::SeriesId.eq(series_id.value()))
            .order_by_asc(episodes::Column::Id)
            .all(&self.conn)
            .await?;
        Ok(rows.into_iter().map(Self::map_model).collect())
    }

    pub async fn statuses_for_series(&self, series_id: SeriesId) -> Result<Vec<DownloadStatus>> {
        let statuses = Episodes::find()
            .select_only()
            .column(episodes::Column::Status)
            .filter(episodes::Column::SeriesId.eq(series_id.value()))
            .order_by_asc(episodes::Column::Id)
            .into_tuple::<DownloadStatus>()
            .all(&self.conn)
            .await?;
        Ok(statuses)
    }

    pub async fn list_by_status(&self, status: DownloadStatus) -> Result<Vec<Episode>> {
        let rows = Episodes::find()
            .filter(episodes::Column::Status.eq(status))
            .order_by_asc(episodes::Column::Id)
            .all(&self.conn)
            .await?;
        Ok(rows.into_iter().map(Self::map_model).collect())
    }

    pub async fn list_for_series_in(
        &self,
        series_id: SeriesId,
        statuses: &[DownloadStatus],
    ) -> Result<Vec<Episode>> {
        let rows = Episodes::find()
            .filter(episodes::Column::SeriesId.eq(series_id.value()))
            .filter(episodes::Column::Status.is_in(statuses.iter().copied()))
            .order_by_asc(episodes::Column::Id)
            .all(&self.conn)
            .await?;
        Ok(rows.into_iter().map(Self::map_model).collect())
    }

    pub async fn list_downloaded(&self) -> Result<Vec<DownloadedEpisode>> {
        let rows = Episodes::find()
            .filter(episodes::Column::Status.eq(DownloadStatus::Completed))
            .order_by_desc(episodes::Column::UpdatedAt)
            .find_also_related(series::Entity)
            .all(&self.conn)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(episode, series)| DownloadedEpisode {
                series_title: series.map(|s| s.title).unwrap_or_default(),
                episode: Self::map_model(episode),
            })
            .collect())
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Inserts a pending episode unless `(series, number)` already exists.
    /// Returns the new id only when a row was created.
    pub async fn insert_if_missing(
        &self,
        series_id: SeriesId,
        number: &EpisodeNumber,
        source_url: &str,
    ) -> Result<Option<EpisodeId>> {
        let now = chrono::Utc::now().to_rfc3339();
        let active = episodes::ActiveModel {
            series_id: Set(series_id.value()),
            number: Set(number.as_str().to_string()),
            source_url: Set(source_url.to_string()),
            video_url: Set(None),
            status: Set(DownloadStatus::Pending),
            progress: Set(0),
            file_path: Set(None),
            error_message: Set(None),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        let inserted = Episodes::insert(active)
            .on_conflict(
                OnConflict::columns([episodes::Column::SeriesId, episodes::Column::Number])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await?;

        if inserted == 0 {
            return Ok(None);
        }

        Ok(self
            .find_by_number(series_id, number)
            .await?
            .map(|episode| episode.id))
    }

    /// Moves a pending episode to downloading. Returns `false` without
    /// writing anything when the episode is not pending.
    pub async fn mark_downloading(&self, id: EpisodeId) -> Result<bool> {
        let result = Self::update_one(id)
            .col_expr(
                episodes::Column::Status,
                Expr::value(DownloadStatus::Downloading),
            )
            .col_expr(episodes::Column::Progress, Expr::value(0))
            .col_expr(
                episodes::Column::ErrorMessage,
                Expr::value(Option::<String>::None),
            )
            .filter(episodes::Column::Status.eq(DownloadStatus::Pending))
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected > 0)
    }

    pub async fn set_video_url(&self, id: EpisodeId, video_url: &str) -> Result<()> {
        Self::update_one(id)
            .col_expr(episodes::Column::VideoUrl, Expr::value(video_url))
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    pub async fn set_progress(&self, id: EpisodeId, progress: u8) -> Result<()> {
        Self::update_one(id)
            .col_expr(episodes::Column::Progress, Expr::value(i32::from(progress)))
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    pub async fn mark_completed(&self, id: EpisodeId, file_path: &str) -> Result<()> {
        Self::update_one(id)
            .col_expr(
                episodes::Column::Status,
                Expr::value(DownloadStatus::Completed),
            )
            .col_expr(episodes::Column::Progress, Expr::value(100))
            .col_expr(episodes::Column::FilePath, Expr::value(file_path))
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    pub async fn mark_failed(&self, id: EpisodeId, message: &str) -> Result<()> {
        Self::update_one(id)
            .col_expr(episodes::Column::Status, Expr::value(DownloadStatus::Failed))
            .col_expr(episodes::Column::ErrorMessage, Expr::value(message))
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    /// Writes a bare status; used for cancel/skip, which carry no message and
    /// keep the last observed progress.
    pub async fn set_status(&self, id: EpisodeId, status: DownloadStatus) -> Result<()> {
        Self::update_one(id)
            .col_expr(episodes::Column::Status, Expr::value(status))
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    /// Moves an episode back to pending with progress and error cleared.
    pub async fn reset_to_pending(&self, id: EpisodeId) -> Result<()> {
        Self::update_one(id)
            .col_expr(episodes::Column::Status, Expr::value(DownloadStatus::Pending))
            .col_expr(episodes::Column::Progress, Expr::value(0))
            .col_expr(
                episodes::Column::ErrorMessage,
                Expr::value(Option::<String>::None),
            )
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    /// Sets `status` on every episode of the series whose status is not in
    /// `keep`. Returns the number of rows changed.
    pub async fn set_status_for_series_except(
        &self,
        series_id: SeriesId,
        status: DownloadStatus,
        keep: &[DownloadStatus],
    ) -> Result<u64> {
        let result = Episodes::update_many()
            .col_expr(episodes::Column::Status, Expr::value(status))
            .col_expr(
                episodes::Column::UpdatedAt,
                Expr::value(chrono::Utc::now().to_rfc3339()),
            )
            .filter(episodes::Column::SeriesId.eq(series_id.value()))
            .filter(episodes::Column::Status.is_not_in(keep.iter().copied()))
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected)
    }
}
