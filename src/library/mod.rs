use crate::config::LibraryConfig;
use crate::constants::{SEASON_DIR, UNTITLED, VIDEO_EXTENSION, files};
use crate::domain::EpisodeNumber;
use crate::models::series::Series;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use tracing::{info, warn};

/// On-disk and public layout of the media library.
///
/// ```text
/// <media_root>/<dir>/tvshow.nfo
/// <media_root>/<dir>/poster.jpg
/// <media_root>/<dir>/Season 01/<title> - S01E07.mp4
/// ```
#[derive(Debug, Clone)]
pub struct LibraryLayout {
    media_root: PathBuf,
    media_url: String,
}

impl LibraryLayout {
    #[must_use]
    pub fn new(config: &LibraryConfig) -> Self {
        Self {
            media_root: PathBuf::from(&config.media_root),
            media_url: config.media_url.clone(),
        }
    }

    #[must_use]
    pub fn media_root(&self) -> &Path {
        &self.media_root
    }

    #[must_use]
    pub fn series_dir(&self, directory_name: &str) -> PathBuf {
        self.media_root.join(directory_name)
    }

    #[must_use]
    pub fn episode_filename(title: &str, number: &EpisodeNumber) -> String {
        format!(
            "{} - {}.{}",
            clean_filename(title),
            number.episode_token(),
            VIDEO_EXTENSION
        )
    }

    /// Absolute destination of an episode file.
    #[must_use]
    pub fn episode_path(&self, series: &Series, number: &EpisodeNumber) -> PathBuf {
        self.series_dir(&series.directory_name)
            .join(SEASON_DIR)
            .join(Self::episode_filename(&series.title, number))
    }

    /// URL path under which a completed episode is served.
    #[must_use]
    pub fn public_path(&self, series: &Series, number: &EpisodeNumber) -> String {
        let raw = format!(
            "{}/{}/{}/{}",
            self.media_url,
            series.directory_name,
            SEASON_DIR,
            Self::episode_filename(&series.title, number)
        );
        normalize_url_path(&raw)
    }

    pub async fn write_series_metadata(
        &self,
        client: &reqwest::Client,
        series: &Series,
    ) -> Result<()> {
        let dir = self.series_dir(&series.directory_name);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let nfo = render_nfo(series)?;
        let nfo_path = dir.join(files::SERIES_NFO);
        tokio::fs::write(&nfo_path, nfo)
            .await
            .with_context(|| format!("Failed to write {}", nfo_path.display()))?;

        if let Some(cover) = series.cover_image.as_deref().filter(|c| !c.is_empty())
            && let Err(e) = download_poster(client, cover, &dir.join(files::POSTER)).await
        {
            warn!(series_id = %series.id, error = %e, "Failed to download poster");
        }

        info!(series_id = %series.id, path = %dir.display(), "Wrote series metadata");
        Ok(())
    }

    pub async fn remove_series_dir(&self, directory_name: &str) -> Result<()> {
        if !is_child_name(directory_name) {
            anyhow::bail!(
                "Refusing to remove '{directory_name}': not a directory inside the media root"
            );
        }

        let dir = self.series_dir(directory_name);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                info!(path = %dir.display(), "Removed series directory");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", dir.display())),
        }
    }
}

#[derive(Debug, Serialize)]
struct TvShowNfo<'a> {
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    plot: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    year: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    studio: Option<&'a str>,
    #[serde(rename = "genre")]
    genres: Vec<&'a str>,
}

fn render_nfo(series: &Series) -> Result<String> {
    let nfo = TvShowNfo {
        title: &series.title,
        plot: series.plot.as_deref(),
        year: series.year.as_deref(),
        studio: series.studio.as_deref(),
        genres: series
            .genres
            .iter()
            .flatten()
            .map(String::as_str)
            .collect(),
    };

    let body = quick_xml::se::to_string_with_root("tvshow", &nfo)?;
    Ok(format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n{body}\n"
    ))
}

async fn download_poster(client: &reqwest::Client, url: &str, dest: &Path) -> Result<()> {
    let bytes = client
        .get(url)
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;
    tokio::fs::write(dest, &bytes).await?;
    Ok(())
}

/// Strips characters that are not allowed in file names on common
/// filesystems. Never returns an empty or dot-only name.
#[must_use]
pub fn clean_filename(name: &str) -> String {
    let cleaned = name
        .chars()
        .filter(|c| !matches!(c, '\\' | '/' | '*' | '?' | ':' | '"' | '<' | '>' | '|'))
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    let trimmed = cleaned.trim_matches('.').trim();
    if trimmed.is_empty() {
        UNTITLED.to_string()
    } else {
        trimmed.to_string()
    }
}

/// A name that joins onto the media root as exactly one normal component.
fn is_child_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

fn normalize_url_path(raw: &str) -> String {
    let joined = raw
        .replace('\\', "/")
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/");
    format!("/{joined}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DownloadStatus, SeriesId};

    fn test_series(title: &str) -> Series {
        Series {
            id: SeriesId::new(1),
            title: title.to_string(),
            source_url: "https://example.com/anime/1-test".to_string(),
            directory_name: clean_filename(title),
            catalog_id: Some(1),
            slug: Some("test".to_string()),
            cover_image: None,
            plot: Some("A <plot> & more".to_string()),
            year: Some("2023".to_string()),
            genres: Some(vec!["Action".to_string(), "Fantasy".to_string()]),
            studio: Some("Madhouse".to_string()),
            status: DownloadStatus::Pending,
            created_at: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    fn test_config() -> LibraryConfig {
        LibraryConfig {
            media_root: "/srv/media".to_string(),
            media_url: "/media/".to_string(),
            write_metadata: true,
        }
    }

    #[test]
    fn test_clean_filename() {
        assert_eq!(clean_filename("Re:Zero"), "ReZero");
        assert_eq!(clean_filename("Fate/Zero?"), "FateZero");
        assert_eq!(clean_filename(r#"a\b*c"d<e>f|g"#), "abcdefg");
        assert_eq!(clean_filename("  Spaced   Title "), "Spaced Title");
        assert_eq!(clean_filename("Dr. Stone"), "Dr. Stone");
    }

    #[test]
    fn test_clean_filename_never_yields_relative_dirs() {
        for raw in [".", "..", "...", " . ", "", "   ", "??", "/..\\"] {
            assert_eq!(clean_filename(raw), "Untitled", "input {raw:?}");
        }
        assert_eq!(clean_filename("..hack"), "hack");
        assert_eq!(clean_filename("Bleach."), "Bleach");
    }

    #[tokio::test]
    async fn test_remove_series_dir_stays_inside_media_root() {
        let root = std::env::temp_dir().join(format!("animedl-lib-{}", uuid::Uuid::new_v4()));
        let media = root.join("media");
        let other = media.join("Other Show");
        std::fs::create_dir_all(&other).unwrap();
        std::fs::write(other.join("ep.mp4"), b"x").unwrap();
        std::fs::write(root.join("sibling.txt"), b"x").unwrap();

        let layout = LibraryLayout::new(&LibraryConfig {
            media_root: media.to_string_lossy().to_string(),
            ..test_config()
        });

        for name in [".", "..", "", "Other Show/..", "../media", "/tmp"] {
            assert!(
                layout.remove_series_dir(name).await.is_err(),
                "removed {name:?}"
            );
        }
        layout
            .remove_series_dir(&clean_filename(".."))
            .await
            .unwrap();

        assert!(other.join("ep.mp4").exists());
        assert!(root.join("sibling.txt").exists());

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_episode_path_numeric() {
        let layout = LibraryLayout::new(&test_config());
        let series = test_series("Frieren: Beyond Journey's End");
        let path = layout.episode_path(&series, &EpisodeNumber::new("7"));

        assert_eq!(
            path,
            PathBuf::from(
                "/srv/media/Frieren Beyond Journey's End/Season 01/Frieren Beyond Journey's End - S01E07.mp4"
            )
        );
    }

    #[test]
    fn test_episode_path_symbolic() {
        let layout = LibraryLayout::new(&test_config());
        let series = test_series("Mob Psycho 100");
        let path = layout.episode_path(&series, &EpisodeNumber::new("OVA"));

        assert!(path.ends_with("Season 01/Mob Psycho 100 - S01EOVA.mp4"));
    }

    #[test]
    fn test_public_path_is_normalized() {
        let layout = LibraryLayout::new(&test_config());
        let series = test_series("Frieren");
        assert_eq!(
            layout.public_path(&series, &EpisodeNumber::new("12")),
            "/media/Frieren/Season 01/Frieren - S01E12.mp4"
        );

        let layout = LibraryLayout::new(&LibraryConfig {
            media_url: "media\\\\".to_string(),
            ..test_config()
        });
        assert_eq!(
            layout.public_path(&series, &EpisodeNumber::new("3")),
            "/media/Frieren/Season 01/Frieren - S01E03.mp4"
        );
    }

    #[test]
    fn test_render_nfo() {
        let nfo = render_nfo(&test_series("Frieren")).unwrap();
        assert!(nfo.starts_with("<?xml"));
        assert!(nfo.contains("<tvshow>"));
        assert!(nfo.contains("<title>Frieren</title>"));
        assert!(nfo.contains("&lt;plot&gt; &amp; more"));
        assert!(nfo.contains("<genre>Action</genre>"));
        assert!(nfo.contains("<genre>Fantasy</genre>"));
        assert!(nfo.contains("<studio>Madhouse</studio>"));
    }

    #[tokio::test]
    async fn test_write_and_remove_series_dir() {
        let root = std::env::temp_dir().join(format!("animedl-lib-{}", uuid::Uuid::new_v4()));
        let layout = LibraryLayout::new(&LibraryConfig {
            media_root: root.to_string_lossy().to_string(),
            ..test_config()
        });
        let series = test_series("Frieren");

        layout
            .write_series_metadata(&reqwest::Client::new(), &series)
            .await
            .unwrap();
        assert!(root.join("Frieren").join("tvshow.nfo").exists());
        assert!(!root.join("Frieren").join("poster.jpg").exists());

        layout.remove_series_dir("Frieren").await.unwrap();
        assert!(!root.join("Frieren").exists());
        // Missing directory is not an error.
        layout.remove_series_dir("Frieren").await.unwrap();
        assert!(layout.remove_series_dir("").await.is_err());

        std::fs::remove_dir_all(&root).ok();
    }
}
