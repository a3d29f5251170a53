use crate::domain::{DownloadStatus, SeriesId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Series {
    pub id: SeriesId,
    pub title: String,
    pub source_url: String,
    pub directory_name: String,
    pub catalog_id: Option<i32>,
    pub slug: Option<String>,
    pub cover_image: Option<String>,
    pub plot: Option<String>,
    pub year: Option<String>,
    pub genres: Option<Vec<String>>,
    pub studio: Option<String>,
    pub status: DownloadStatus,
    pub created_at: String,
}

/// Metadata used to create or refresh a series; keyed by `source_url`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewSeries {
    pub title: String,
    pub source_url: String,
    pub directory_name: String,
    pub catalog_id: Option<i32>,
    pub slug: Option<String>,
    pub cover_image: Option<String>,
    pub plot: Option<String>,
    pub year: Option<String>,
    pub studio: Option<String>,
}
