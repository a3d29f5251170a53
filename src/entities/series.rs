use crate::domain::DownloadStatus;
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "series")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    #[sea_orm(unique)]
    pub source_url: String,
    pub directory_name: String,
    #[sea_orm(unique)]
    pub catalog_id: Option<i32>,
    pub slug: Option<String>,
    pub cover_image: Option<String>,
    pub plot: Option<String>,
    pub year: Option<String>,
    /// Comma-joined genre names.
    pub genres: Option<String>,
    pub studio: Option<String>,
    pub status: DownloadStatus,
    pub created_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::episodes::Entity")]
    Episodes,
}

impl Related<super::episodes::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Episodes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
