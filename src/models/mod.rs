pub mod catalog;
pub mod episode;
pub mod series;
