//! Domain types for the download library with strong typing.
//!
//! Newtype identifiers keep series and episode ids from being mixed up, and
//! [`DownloadStatus`] is the single status vocabulary shared by episodes and
//! the derived series status.

pub mod events;

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unique identifier for a Series in the library.
///
/// # Examples
///
/// ```rust
/// use animedl::domain::SeriesId;
///
/// let id = SeriesId::new(42);
/// assert_eq!(id.value(), 42);
/// assert_eq!(id.to_string(), "42");
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SeriesId(i32);

impl SeriesId {
    #[must_use]
    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn value(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for SeriesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for SeriesId {
    fn from(id: i32) -> Self {
        Self::new(id)
    }
}

impl From<SeriesId> for i32 {
    fn from(id: SeriesId) -> Self {
        id.0
    }
}

/// Unique identifier for an Episode row.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EpisodeId(i32);

impl EpisodeId {
    #[must_use]
    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn value(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for EpisodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for EpisodeId {
    fn from(id: i32) -> Self {
        Self::new(id)
    }
}

impl From<EpisodeId> for i32 {
    fn from(id: EpisodeId) -> Self {
        id.0
    }
}

/// Episode number as shown to the user.
///
/// Numbers are kept as text because sources publish symbolic entries such as
/// `OVA` or `10.5`. Purely numeric input is normalised (`"07"` becomes `"7"`)
/// so the same episode cannot be stored twice under different spellings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EpisodeNumber(String);

impl EpisodeNumber {
    #[must_use]
    pub fn new(raw: &str) -> Self {
        let trimmed = raw.trim();
        if Self::is_digits(trimmed)
            && let Ok(n) = trimmed.parse::<u64>()
        {
            return Self(n.to_string());
        }
        Self(trimmed.to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the number is made of ASCII digits only.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        Self::is_digits(&self.0)
    }

    /// Season/episode token used in file names: `S01E07`, `S01EOVA`, `S01E10.5`.
    #[must_use]
    pub fn episode_token(&self) -> String {
        if self.is_numeric()
            && let Ok(n) = self.0.parse::<u64>()
        {
            return format!("S01E{n:02}");
        }
        format!("S01E{}", self.0)
    }

    /// Sort key that orders numeric episodes numerically and puts symbolic
    /// ones first.
    #[must_use]
    pub fn sort_key(&self) -> f64 {
        self.0.parse::<f64>().unwrap_or(0.0)
    }

    fn is_digits(s: &str) -> bool {
        !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
    }
}

impl fmt::Display for EpisodeNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EpisodeNumber {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// Lifecycle status shared by episodes and (derived) series.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, EnumIter, DeriveActiveEnum, Serialize,
    Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    #[default]
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "downloading")]
    Downloading,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "failed")]
    Failed,
    #[sea_orm(string_value = "skipped")]
    Skipped,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl DownloadStatus {
    pub const TERMINAL: [Self; 4] = [Self::Completed, Self::Failed, Self::Skipped, Self::Cancelled];

    /// Statuses a resume/retry request may move back to pending.
    pub const RESUMABLE: [Self; 3] = [Self::Failed, Self::Skipped, Self::Cancelled];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Downloading => "downloading",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Skipped | Self::Cancelled
        )
    }

    #[must_use]
    pub const fn is_resumable(&self) -> bool {
        matches!(self, Self::Failed | Self::Skipped | Self::Cancelled)
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DownloadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "downloading" => Ok(Self::Downloading),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "skipped" => Ok(Self::Skipped),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown download status: {other}")),
        }
    }
}

/// Externally requested termination observed by a running transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    Cancelled,
    Skipped,
}

impl AbortReason {
    /// Maps a freshly read status to an abort request, if it is one.
    #[must_use]
    pub const fn from_status(status: DownloadStatus) -> Option<Self> {
        match status {
            DownloadStatus::Cancelled => Some(Self::Cancelled),
            DownloadStatus::Skipped => Some(Self::Skipped),
            _ => None,
        }
    }

    #[must_use]
    pub const fn status(self) -> DownloadStatus {
        match self {
            Self::Cancelled => DownloadStatus::Cancelled,
            Self::Skipped => DownloadStatus::Skipped,
        }
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.status().as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn series_id_conversions() {
        let id = SeriesId::new(42);
        assert_eq!(id.value(), 42);
        assert_eq!(id.to_string(), "42");
        assert_eq!(i32::from(id), 42);
        assert_eq!(SeriesId::from(42), id);
    }

    #[test]
    fn episode_id_serialization() {
        let id = EpisodeId::new(7);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "7");
        let back: EpisodeId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn numeric_episode_token_is_zero_padded() {
        assert_eq!(EpisodeNumber::new("7").episode_token(), "S01E07");
        assert_eq!(EpisodeNumber::new("12").episode_token(), "S01E12");
        assert_eq!(EpisodeNumber::new("123").episode_token(), "S01E123");
    }

    #[test]
    fn symbolic_episode_token_is_raw() {
        assert_eq!(EpisodeNumber::new("OVA").episode_token(), "S01EOVA");
        assert_eq!(EpisodeNumber::new("10.5").episode_token(), "S01E10.5");
    }

    #[test]
    fn numeric_spellings_normalise() {
        assert_eq!(EpisodeNumber::new("07"), EpisodeNumber::new("7"));
        assert_eq!(EpisodeNumber::new(" 3 ").as_str(), "3");
        assert!(!EpisodeNumber::new("10.5").is_numeric());
    }

    #[test]
    fn status_round_trips_through_text() {
        for status in [
            DownloadStatus::Pending,
            DownloadStatus::Downloading,
            DownloadStatus::Completed,
            DownloadStatus::Failed,
            DownloadStatus::Skipped,
            DownloadStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<DownloadStatus>(), Ok(status));
        }
        assert!("paused".parse::<DownloadStatus>().is_err());
    }

    #[test]
    fn terminal_and_resumable_sets() {
        assert!(!DownloadStatus::Pending.is_terminal());
        assert!(!DownloadStatus::Downloading.is_terminal());
        assert!(DownloadStatus::Completed.is_terminal());
        assert!(!DownloadStatus::Completed.is_resumable());
        assert!(DownloadStatus::Failed.is_resumable());
    }

    #[test]
    fn abort_reason_only_for_cancel_and_skip() {
        assert_eq!(
            AbortReason::from_status(DownloadStatus::Cancelled),
            Some(AbortReason::Cancelled)
        );
        assert_eq!(
            AbortReason::from_status(DownloadStatus::Skipped),
            Some(AbortReason::Skipped)
        );
        assert_eq!(AbortReason::from_status(DownloadStatus::Downloading), None);
        assert_eq!(AbortReason::from_status(DownloadStatus::Failed), None);
    }
}
