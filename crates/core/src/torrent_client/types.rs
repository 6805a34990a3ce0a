//! Types for download client operations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::retry::Transient;

/// Errors that can occur during download client operations.
#[derive(Debug, Error)]
pub enum TorrentClientError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Request timeout")]
    Timeout,

    /// Connection reset or truncated body mid-request.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The response arrived but could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Torrent not found: {0}")]
    TorrentNotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TorrentClientError {
    /// The client is unreachable; the caller should back off.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            TorrentClientError::ConnectionFailed(_)
                | TorrentClientError::Timeout
                | TorrentClientError::AuthenticationFailed(_)
        )
    }
}

impl Transient for TorrentClientError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            TorrentClientError::Transport(_) | TorrentClientError::Decode(_)
        )
    }
}

/// qBittorrent torrent state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TorrentState {
    Error,
    MissingFiles,
    Uploading,
    PausedUpload,
    QueuedUpload,
    StalledUpload,
    CheckingUpload,
    ForcedUpload,
    Allocating,
    Downloading,
    MetadataDownload,
    PausedDownload,
    QueuedDownload,
    ForcedDownload,
    StalledDownload,
    CheckingDownload,
    CheckingResumeData,
    Moving,
    Unknown,
}

impl TorrentState {
    /// Parse the Web API state string. v5 `stopped*` names map to `Paused*`.
    pub fn from_api(state: &str) -> Self {
        match state {
            "error" => TorrentState::Error,
            "missingFiles" => TorrentState::MissingFiles,
            "uploading" => TorrentState::Uploading,
            "pausedUP" | "stoppedUP" => TorrentState::PausedUpload,
            "queuedUP" => TorrentState::QueuedUpload,
            "stalledUP" => TorrentState::StalledUpload,
            "checkingUP" => TorrentState::CheckingUpload,
            "forcedUP" => TorrentState::ForcedUpload,
            "allocating" => TorrentState::Allocating,
            "downloading" => TorrentState::Downloading,
            "metaDL" | "forcedMetaDL" => TorrentState::MetadataDownload,
            "pausedDL" | "stoppedDL" => TorrentState::PausedDownload,
            "queuedDL" => TorrentState::QueuedDownload,
            "forcedDL" => TorrentState::ForcedDownload,
            "stalledDL" => TorrentState::StalledDownload,
            "checkingDL" => TorrentState::CheckingDownload,
            "checkingResumeData" => TorrentState::CheckingResumeData,
            "moving" => TorrentState::Moving,
            _ => TorrentState::Unknown,
        }
    }

    /// Returns the string representation for logs and status output.
    pub fn as_str(&self) -> &'static str {
        match self {
            TorrentState::Error => "error",
            TorrentState::MissingFiles => "missing_files",
            TorrentState::Uploading => "uploading",
            TorrentState::PausedUpload => "paused_upload",
            TorrentState::QueuedUpload => "queued_upload",
            TorrentState::StalledUpload => "stalled_upload",
            TorrentState::CheckingUpload => "checking_upload",
            TorrentState::ForcedUpload => "forced_upload",
            TorrentState::Allocating => "allocating",
            TorrentState::Downloading => "downloading",
            TorrentState::MetadataDownload => "metadata_download",
            TorrentState::PausedDownload => "paused_download",
            TorrentState::QueuedDownload => "queued_download",
            TorrentState::ForcedDownload => "forced_download",
            TorrentState::StalledDownload => "stalled_download",
            TorrentState::CheckingDownload => "checking_download",
            TorrentState::CheckingResumeData => "checking_resume_data",
            TorrentState::Moving => "moving",
            TorrentState::Unknown => "unknown",
        }
    }

    pub fn is_downloading(&self) -> bool {
        matches!(
            self,
            TorrentState::Downloading
                | TorrentState::MetadataDownload
                | TorrentState::StalledDownload
                | TorrentState::CheckingDownload
                | TorrentState::PausedDownload
                | TorrentState::QueuedDownload
                | TorrentState::ForcedDownload
        )
    }

    /// States in which every piece is present.
    pub fn is_complete(&self) -> bool {
        matches!(
            self,
            TorrentState::Uploading
                | TorrentState::StalledUpload
                | TorrentState::PausedUpload
                | TorrentState::QueuedUpload
        )
    }

    /// Complete and not paused.
    pub fn is_uploading(&self) -> bool {
        matches!(
            self,
            TorrentState::Uploading | TorrentState::StalledUpload | TorrentState::QueuedUpload
        )
    }

    /// States owned by the client itself; nothing is changed while in them.
    pub fn is_ignored(&self) -> bool {
        matches!(
            self,
            TorrentState::ForcedDownload
                | TorrentState::ForcedUpload
                | TorrentState::CheckingUpload
                | TorrentState::CheckingDownload
                | TorrentState::CheckingResumeData
                | TorrentState::Allocating
                | TorrentState::Moving
                | TorrentState::QueuedDownload
        )
    }
}

impl std::fmt::Display for TorrentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one torrent as reported by the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TorrentInfo {
    /// Info hash (lowercase hex).
    pub hash: String,
    pub name: String,
    pub state: TorrentState,
    pub category: String,
    pub tags: Vec<String>,
    /// Download progress (0.0 - 1.0).
    pub progress: f64,
    /// ETA in seconds. The client reports 8640000 for "infinite".
    pub eta: i64,
    /// Distributed copies; below 1.0 means some pieces are unavailable.
    pub availability: f64,
    /// Unix timestamps (seconds). Zero means unset.
    pub added_on: i64,
    pub completion_on: i64,
    pub last_activity: i64,
    pub amount_left: i64,
    pub size: i64,
    /// Seconds spent seeding.
    pub seeding_time: i64,
    pub ratio: f64,
    /// Per-torrent limits. -2 follows the global limit, -1 is unlimited.
    pub ratio_limit: f64,
    pub seeding_time_limit: i64,
    /// Rate limits in bytes/second. Zero or negative is unlimited.
    pub up_limit: i64,
    pub dl_limit: i64,
    pub super_seeding: bool,
    pub content_path: Option<String>,
}

impl TorrentInfo {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// One file inside a torrent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TorrentFile {
    /// File index used by the priority call.
    pub id: i64,
    /// Path relative to the torrent root.
    pub name: String,
    pub size: i64,
    pub progress: f64,
    pub priority: i32,
}

/// One tracker entry of a torrent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackerEntry {
    pub url: String,
    /// 0 disabled, 1 not contacted, 2 working, 3 updating, 4 not working.
    pub status: i32,
    pub msg: String,
}

impl TrackerEntry {
    /// DHT, PeX and LSD pseudo-trackers are reported with a `** [` prefix.
    pub fn is_pseudo(&self) -> bool {
        self.url.starts_with("** [")
    }
}

/// Filters for listing torrents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TorrentFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Restrict to these hashes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hashes: Vec<String>,
}

impl TorrentFilters {
    pub fn category(category: impl Into<String>) -> Self {
        Self {
            category: Some(category.into()),
            hashes: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.category.is_none() && self.hashes.is_empty()
    }
}

/// Ratio and seeding-time limits as sent to the client.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShareLimits {
    pub ratio_limit: f64,
    /// Minutes.
    pub seeding_time_limit: i64,
}

/// Trait for download client backends.
#[async_trait]
pub trait TorrentClient: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Application version; doubles as a liveness probe.
    async fn api_version(&self) -> Result<String, TorrentClientError>;

    /// List torrents, sorted by `added_on`.
    async fn list_torrents(
        &self,
        filters: &TorrentFilters,
    ) -> Result<Vec<TorrentInfo>, TorrentClientError>;

    async fn torrent_files(&self, hash: &str) -> Result<Vec<TorrentFile>, TorrentClientError>;

    async fn torrent_trackers(&self, hash: &str) -> Result<Vec<TrackerEntry>, TorrentClientError>;

    async fn pause(&self, hashes: &[String]) -> Result<(), TorrentClientError>;

    async fn resume(&self, hashes: &[String]) -> Result<(), TorrentClientError>;

    async fn recheck(&self, hashes: &[String]) -> Result<(), TorrentClientError>;

    /// Remove torrents. If `delete_files` is true, also delete downloaded files.
    async fn delete(&self, hashes: &[String], delete_files: bool)
        -> Result<(), TorrentClientError>;

    async fn set_file_priority(
        &self,
        hash: &str,
        file_ids: &[i64],
        priority: i32,
    ) -> Result<(), TorrentClientError>;

    async fn add_trackers(&self, hash: &str, urls: &[String]) -> Result<(), TorrentClientError>;

    async fn remove_trackers(&self, hash: &str, urls: &[String])
        -> Result<(), TorrentClientError>;

    async fn set_share_limits(
        &self,
        hash: &str,
        limits: ShareLimits,
    ) -> Result<(), TorrentClientError>;

    /// Bytes/second, -1 for unlimited.
    async fn set_download_limit(&self, hash: &str, limit: i64) -> Result<(), TorrentClientError>;

    /// Bytes/second, -1 for unlimited.
    async fn set_upload_limit(&self, hash: &str, limit: i64) -> Result<(), TorrentClientError>;

    async fn set_super_seeding(&self, hash: &str, enabled: bool)
        -> Result<(), TorrentClientError>;

    async fn add_tags(&self, hash: &str, tags: &[String]) -> Result<(), TorrentClientError>;

    async fn remove_tags(&self, hash: &str, tags: &[String]) -> Result<(), TorrentClientError>;

    async fn set_category(&self, hashes: &[String], category: &str)
        -> Result<(), TorrentClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_from_api() {
        assert_eq!(TorrentState::from_api("pausedUP"), TorrentState::PausedUpload);
        assert_eq!(TorrentState::from_api("stoppedUP"), TorrentState::PausedUpload);
        assert_eq!(TorrentState::from_api("stoppedDL"), TorrentState::PausedDownload);
        assert_eq!(TorrentState::from_api("forcedMetaDL"), TorrentState::MetadataDownload);
        assert_eq!(TorrentState::from_api("checkingResumeData"), TorrentState::CheckingResumeData);
        assert_eq!(TorrentState::from_api("bogus"), TorrentState::Unknown);
    }

    #[test]
    fn test_paused_upload_is_complete_but_not_uploading() {
        assert!(TorrentState::PausedUpload.is_complete());
        assert!(!TorrentState::PausedUpload.is_uploading());
        assert!(TorrentState::StalledUpload.is_uploading());
    }

    #[test]
    fn test_ignored_states() {
        for state in [
            TorrentState::ForcedDownload,
            TorrentState::ForcedUpload,
            TorrentState::CheckingUpload,
            TorrentState::CheckingDownload,
            TorrentState::CheckingResumeData,
            TorrentState::Allocating,
            TorrentState::Moving,
            TorrentState::QueuedDownload,
        ] {
            assert!(state.is_ignored(), "{} should be ignored", state);
        }
        assert!(!TorrentState::Downloading.is_ignored());
        assert!(!TorrentState::QueuedUpload.is_ignored());
    }

    #[test]
    fn test_downloading_states() {
        assert!(TorrentState::MetadataDownload.is_downloading());
        assert!(TorrentState::PausedDownload.is_downloading());
        assert!(!TorrentState::Uploading.is_downloading());
        assert!(!TorrentState::Error.is_downloading());
    }

    #[test]
    fn test_error_classification() {
        assert!(TorrentClientError::Timeout.is_connectivity());
        assert!(TorrentClientError::ConnectionFailed("x".into()).is_connectivity());
        assert!(!TorrentClientError::Transport("reset".into()).is_connectivity());
        assert!(TorrentClientError::Transport("reset".into()).is_transient());
        assert!(TorrentClientError::Decode("eof".into()).is_transient());
        assert!(!TorrentClientError::Http {
            status: 500,
            body: String::new()
        }
        .is_transient());
    }

    #[test]
    fn test_pseudo_tracker() {
        let dht = TrackerEntry {
            url: "** [DHT] **".into(),
            status: 2,
            msg: String::new(),
        };
        assert!(dht.is_pseudo());
    }
}
