pub mod episode;
pub mod series;
