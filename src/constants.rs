pub const SEASON_DIR: &str = "Season 01";

pub const VIDEO_EXTENSION: &str = "mp4";

/// Directory and file name used when a title cleans down to nothing.
pub const UNTITLED: &str = "Untitled";

pub mod transfer {

    pub const CHUNK_SIZE: usize = 8 * 1024;

    /// Minimum percent advance between mid-transfer checkpoints.
    pub const PROGRESS_STEP: u8 = 5;
}

pub mod files {

    pub const SERIES_NFO: &str = "tvshow.nfo";

    pub const POSTER: &str = "poster.jpg";
}

pub mod limits {

    pub const MAX_SEARCH_RESULTS: usize = 20;
}
