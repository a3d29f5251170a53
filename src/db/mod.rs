use crate::domain::{DownloadStatus, EpisodeId, EpisodeNumber, SeriesId};
use crate::models::episode::{DownloadedEpisode, Episode};
use crate::models::series::{NewSeries, Series};
use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod migrator;
pub mod repositories;

/// Durable entity store. Cheap to clone; every read goes to the database so
/// concurrent writers are always observed.
#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn series_repo(&self) -> repositories::series::SeriesRepository {
        repositories::series::SeriesRepository::new(self.conn.clone())
    }

    fn episode_repo(&self) -> repositories::episode::EpisodeRepository {
        repositories::episode::EpisodeRepository::new(self.conn.clone())
    }

    // ------------------------------------------------------------------------
    // Series
    // ------------------------------------------------------------------------

    pub async fn upsert_series(&self, series: &NewSeries) -> Result<(SeriesId, bool)> {
        self.series_repo().upsert(series).await
    }

    pub async fn get_series(&self, id: SeriesId) -> Result<Option<Series>> {
        self.series_repo().get(id).await
    }

    pub async fn list_series(&self) -> Result<Vec<Series>> {
        self.series_repo().list().await
    }

    pub async fn list_series_ids(&self) -> Result<Vec<SeriesId>> {
        self.series_repo().list_ids().await
    }

    pub async fn set_series_genres(&self, id: SeriesId, genres: &[String]) -> Result<()> {
        self.series_repo().set_genres(id, genres).await
    }

    pub async fn set_series_status(&self, id: SeriesId, status: DownloadStatus) -> Result<()> {
        self.series_repo().set_status(id, status).await
    }

    pub async fn delete_series(&self, id: SeriesId) -> Result<bool> {
        self.series_repo().delete(id).await
    }

    // ------------------------------------------------------------------------
    // Episodes
    // ------------------------------------------------------------------------

    pub async fn get_episode(&self, id: EpisodeId) -> Result<Option<Episode>> {
        self.episode_repo().get(id).await
    }

    pub async fn get_episode_status(&self, id: EpisodeId) -> Result<Option<DownloadStatus>> {
        self.episode_repo().get_status(id).await
    }

    pub async fn find_episode(
        &self,
        series_id: SeriesId,
        number: &EpisodeNumber,
    ) -> Result<Option<Episode>> {
        self.episode_repo().find_by_number(series_id, number).await
    }

    pub async fn list_episodes(&self, series_id: SeriesId) -> Result<Vec<Episode>> {
        self.episode_repo().list_for_series(series_id).await
    }

    pub async fn list_episodes_in(
        &self,
        series_id: SeriesId,
        statuses: &[DownloadStatus],
    ) -> Result<Vec<Episode>> {
        self.episode_repo()
            .list_for_series_in(series_id, statuses)
            .await
    }

    pub async fn episode_statuses(&self, series_id: SeriesId) -> Result<Vec<DownloadStatus>> {
        self.episode_repo().statuses_for_series(series_id).await
    }

    pub async fn list_episodes_by_status(&self, status: DownloadStatus) -> Result<Vec<Episode>> {
        self.episode_repo().list_by_status(status).await
    }

    pub async fn list_downloaded(&self) -> Result<Vec<DownloadedEpisode>> {
        self.episode_repo().list_downloaded().await
    }

    pub async fn insert_episode_if_missing(
        &self,
        series_id: SeriesId,
        number: &EpisodeNumber,
        source_url: &str,
    ) -> Result<Option<EpisodeId>> {
        self.episode_repo()
            .insert_if_missing(series_id, number, source_url)
            .await
    }

    pub async fn mark_episode_downloading(&self, id: EpisodeId) -> Result<bool> {
        self.episode_repo().mark_downloading(id).await
    }

    pub async fn set_episode_video_url(&self, id: EpisodeId, video_url: &str) -> Result<()> {
        self.episode_repo().set_video_url(id, video_url).await
    }

    pub async fn set_episode_progress(&self, id: EpisodeId, progress: u8) -> Result<()> {
        self.episode_repo().set_progress(id, progress).await
    }

    pub async fn mark_episode_completed(&self, id: EpisodeId, file_path: &str) -> Result<()> {
        self.episode_repo().mark_completed(id, file_path).await
    }

    pub async fn mark_episode_failed(&self, id: EpisodeId, message: &str) -> Result<()> {
        self.episode_repo().mark_failed(id, message).await
    }

    pub async fn set_episode_status(&self, id: EpisodeId, status: DownloadStatus) -> Result<()> {
        self.episode_repo().set_status(id, status).await
    }

    pub async fn reset_episode_to_pending(&self, id: EpisodeId) -> Result<()> {
        self.episode_repo().reset_to_pending(id).await
    }

    pub async fn set_series_episodes_status_except(
        &self,
        series_id: SeriesId,
        status: DownloadStatus,
        keep: &[DownloadStatus],
    ) -> Result<u64> {
        self.episode_repo()
            .set_status_for_series_except(series_id, status, keep)
            .await
    }
}
