//! Two-hop resolution of a direct video URL from an episode page.
//!
//! The episode page id is exchanged at `<origin>/embed-url/<id>` for the URL
//! of an embed page, and the embed page carries the file location in a
//! `window.downloadUrl = '...'` assignment.

use regex::Regex;
use reqwest::header::REFERER;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("Invalid episode URL '{url}': {reason}")]
    InvalidEpisodeUrl { url: String, reason: String },

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Embed endpoint did not return a URL: {0}")]
    InvalidEmbedResponse(String),

    #[error("No download URL found in embed page {0}")]
    ExtractionFailed(String),
}

/// Where in the embed page a download URL is looked for. Tried in
/// declaration order; the first hit wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    DocumentBody,
    ScriptBlocks,
}

impl ExtractionStrategy {
    pub const ORDERED: [Self; 2] = [Self::DocumentBody, Self::ScriptBlocks];

    #[must_use]
    pub fn extract(self, html: &str) -> Option<String> {
        match self {
            Self::DocumentBody => find_download_url(html),
            Self::ScriptBlocks => script_block_regex()
                .captures_iter(html)
                .filter_map(|c| c.get(1))
                .find_map(|m| find_download_url(m.as_str())),
        }
    }
}

fn get_regex(re: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    re.get_or_init(|| Regex::new(pattern).expect("Invalid regex pattern defined in code"))
}

fn download_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    get_regex(&RE, r#"window\.downloadUrl\s*=\s*['"](https?://[^'"]+)['"]"#)
}

fn script_block_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    get_regex(&RE, r"(?is)<script[^>]*>(.*?)</script>")
}

fn find_download_url(text: &str) -> Option<String> {
    download_url_regex()
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Runs every strategy in order against `html`.
#[must_use]
pub fn extract_download_url(html: &str) -> Option<String> {
    ExtractionStrategy::ORDERED
        .iter()
        .find_map(|strategy| strategy.extract(html))
}

/// Returns `(embed endpoint, origin with trailing slash)` for an episode page.
pub fn embed_endpoint(episode_url: &str) -> Result<(Url, String), ResolutionError> {
    let invalid = |reason: &str| ResolutionError::InvalidEpisodeUrl {
        url: episode_url.to_string(),
        reason: reason.to_string(),
    };

    let parsed = Url::parse(episode_url).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid("unsupported scheme"));
    }

    let id = parsed
        .path_segments()
        .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
        .ok_or_else(|| invalid("missing episode id"))?
        .to_string();

    let mut origin = parsed.clone();
    origin.set_path("/");
    origin.set_query(None);
    origin.set_fragment(None);

    let endpoint = origin
        .join(&format!("embed-url/{id}"))
        .map_err(|e| invalid(&e.to_string()))?;

    Ok((endpoint, origin.to_string()))
}

#[derive(Clone)]
pub struct VideoUrlResolver {
    client: reqwest::Client,
    timeout: Duration,
}

impl VideoUrlResolver {
    #[must_use]
    pub const fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub async fn resolve(&self, episode_url: &str) -> Result<String, ResolutionError> {
        let (endpoint, origin) = embed_endpoint(episode_url)?;

        let response = self
            .client
            .get(endpoint.clone())
            .header(REFERER, episode_url)
            .header("X-Requested-With", "XMLHttpRequest")
            .timeout(self.timeout)
            .send()
            .await?;
        let body = Self::checked_text(response, endpoint.as_str()).await?;

        let embed_url = body.trim();
        if !(embed_url.starts_with("http://") || embed_url.starts_with("https://")) {
            let preview: String = embed_url.chars().take(120).collect();
            return Err(ResolutionError::InvalidEmbedResponse(preview));
        }
        debug!(episode_url, embed_url, "Resolved embed page");

        let response = self
            .client
            .get(embed_url)
            .header(REFERER, origin.as_str())
            .timeout(self.timeout)
            .send()
            .await?;
        let html = Self::checked_text(response, embed_url).await?;

        extract_download_url(&html)
            .ok_or_else(|| ResolutionError::ExtractionFailed(embed_url.to_string()))
    }

    async fn checked_text(
        response: reqwest::Response,
        url: &str,
    ) -> Result<String, ResolutionError> {
        let status = response.status();
        if !status.is_success() {
            return Err(ResolutionError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embed_endpoint_keeps_origin() {
        let (endpoint, origin) =
            embed_endpoint("https://www.animeunity.so/anime/1234-frieren/56789").unwrap();
        assert_eq!(endpoint.as_str(), "https://www.animeunity.so/embed-url/56789");
        assert_eq!(origin, "https://www.animeunity.so/");

        let (endpoint, origin) = embed_endpoint("http://127.0.0.1:8080/anime/1-x/2/").unwrap();
        assert_eq!(endpoint.as_str(), "http://127.0.0.1:8080/embed-url/2");
        assert_eq!(origin, "http://127.0.0.1:8080/");
    }

    #[test]
    fn test_embed_endpoint_rejects_bad_urls() {
        assert!(matches!(
            embed_endpoint("not a url"),
            Err(ResolutionError::InvalidEpisodeUrl { .. })
        ));
        assert!(matches!(
            embed_endpoint("ftp://example.com/a/1"),
            Err(ResolutionError::InvalidEpisodeUrl { .. })
        ));
        assert!(matches!(
            embed_endpoint("https://example.com/"),
            Err(ResolutionError::InvalidEpisodeUrl { .. })
        ));
    }

    #[test]
    fn test_extract_single_and_double_quotes() {
        assert_eq!(
            extract_download_url("window.downloadUrl = 'https://cdn.example/v.mp4';"),
            Some("https://cdn.example/v.mp4".to_string())
        );
        assert_eq!(
            extract_download_url(r#"window.downloadUrl="http://cdn.example/a.mp4""#),
            Some("http://cdn.example/a.mp4".to_string())
        );
    }

    #[test]
    fn test_extract_from_script_block() {
        let html = r"<html><head><script type='text/javascript'>
            var a = 1;
            window.downloadUrl = 'https://scws.example/download/1.mp4?token=x';
        </script></head></html>";

        assert_eq!(
            ExtractionStrategy::ScriptBlocks.extract(html),
            Some("https://scws.example/download/1.mp4?token=x".to_string())
        );
        assert_eq!(
            extract_download_url(html),
            Some("https://scws.example/download/1.mp4?token=x".to_string())
        );
    }

    #[test]
    fn test_extract_ignores_relative_urls() {
        assert_eq!(extract_download_url("window.downloadUrl = '/v.mp4';"), None);
        assert_eq!(extract_download_url("<html>no player here</html>"), None);
    }
}
