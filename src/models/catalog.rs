use crate::library::clean_filename;
use crate::models::series::NewSeries;
use serde::{Deserialize, Serialize};

/// One catalog search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub title: String,
    pub url: String,
    pub cover_image: Option<String>,
    pub id: i32,
    pub slug: String,
    pub plot: Option<String>,
    pub episodes_count: Option<i32>,
    pub year: Option<String>,
    pub studio: Option<String>,
}

impl CatalogEntry {
    #[must_use]
    pub fn to_new_series(&self) -> NewSeries {
        NewSeries {
            title: self.title.clone(),
            source_url: self.url.clone(),
            directory_name: clean_filename(&self.title),
            catalog_id: Some(self.id),
            slug: Some(self.slug.clone()),
            cover_image: self.cover_image.clone(),
            plot: self.plot.clone(),
            year: self.year.clone(),
            studio: self.studio.clone(),
        }
    }
}
