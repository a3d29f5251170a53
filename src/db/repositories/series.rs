use crate::domain::{DownloadStatus, SeriesId};
use crate::entities::{episodes, prelude::*, series};
use crate::models::series::{NewSeries, Series as SeriesRecord};
use anyhow::Result;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use tracing::info;

/// Repository for series rows.
pub struct SeriesRepository {
    conn: DatabaseConnection,
}

impl SeriesRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn map_model(model: series::Model) -> SeriesRecord {
        SeriesRecord {
            id: SeriesId::new(model.id),
            title: model.title,
            source_url: model.source_url,
            directory_name: model.directory_name,
            catalog_id: model.catalog_id,
            slug: model.slug,
            cover_image: model.cover_image,
            plot: model.plot,
            year: model.year,
            genres: model.genres.map(|g| {
                g.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(ToString::to_string)
                    .collect()
            }),
            studio: model.studio,
            status: model.status,
            created_at: model.created_at,
        }
    }

    /// Creates the series or refreshes its metadata in place when the source
    /// reference is already known. Returns the id and whether it was created.
    pub async fn upsert(&self, new: &NewSeries) -> Result<(SeriesId, bool)> {
        let existing = Series::find()
            .filter(series::Column::SourceUrl.eq(new.source_url.as_str()))
            .one(&self.conn)
            .await?;

        if let Some(model) = existing {
            let id = model.id;
            let mut active: series::ActiveModel = model.into();
            active.title = Set(new.title.clone());
            active.directory_name = Set(new.directory_name.clone());
            active.catalog_id = Set(new.catalog_id);
            active.slug = Set(new.slug.clone());
            active.cover_image = Set(new.cover_image.clone());
            active.plot = Set(new.plot.clone());
            active.year = Set(new.year.clone());
            active.studio = Set(new.studio.clone());
            active.update(&self.conn).await?;

            info!(series_id = id, title = %new.title, "Updated series metadata");
            return Ok((SeriesId::new(id), false));
        }

        let active = series::ActiveModel {
            title: Set(new.title.clone()),
            source_url: Set(new.source_url.clone()),
            directory_name: Set(new.directory_name.clone()),
            catalog_id: Set(new.catalog_id),
            slug: Set(new.slug.clone()),
            cover_image: Set(new.cover_image.clone()),
            plot: Set(new.plot.clone()),
            year: Set(new.year.clone()),
            genres: Set(None),
            studio: Set(new.studio.clone()),
            status: Set(DownloadStatus::Pending),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };

        let res = Series::insert(active).exec(&self.conn).await?;
        info!(series_id = res.last_insert_id, title = %new.title, "Added series");
        Ok((SeriesId::new(res.last_insert_id), true))
    }

    pub async fn get(&self, id: SeriesId) -> Result<Option<SeriesRecord>> {
        let model = Series::find_by_id(id.value()).one(&self.conn).await?;
        Ok(model.map(Self::map_model))
    }

    pub async fn list(&self) -> Result<Vec<SeriesRecord>> {
        let rows = Series::find()
            .order_by_desc(series::Column::CreatedAt)
            .all(&self.conn)
            .await?;

        Ok(rows.into_iter().map(Self::map_model).collect())
    }

    pub async fn list_ids(&self) -> Result<Vec<SeriesId>> {
        let rows = Series::find()
            .order_by_asc(series::Column::Id)
            .all(&self.conn)
            .await?;

        Ok(rows.into_iter().map(|m| SeriesId::new(m.id)).collect())
    }

    pub async fn set_genres(&self, id: SeriesId, genres: &[String]) -> Result<()> {
        Series::update_many()
            .col_expr(series::Column::Genres, Expr::value(genres.join(",")))
            .filter(series::Column::Id.eq(id.value()))
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    pub async fn set_status(&self, id: SeriesId, status: DownloadStatus) -> Result<()> {
        Series::update_many()
            .col_expr(series::Column::Status, Expr::value(status))
            .filter(series::Column::Id.eq(id.value()))
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    /// Deletes the series and all of its episodes atomically.
    pub async fn delete(&self, id: SeriesId) -> Result<bool> {
        let txn = self.conn.begin().await?;

        Episodes::delete_many()
            .filter(episodes::Column::SeriesId.eq(id.value()))
            .exec(&txn)
            .await?;
        let result = Series::delete_by_id(id.value()).exec(&txn).await?;

        txn.commit().await?;
        Ok(result.rows_affected > 0)
    }
}
