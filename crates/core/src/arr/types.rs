use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::retry::Transient;

#[derive(Debug, Error)]
pub enum ArrError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ArrError {
    pub fn is_connectivity(&self) -> bool {
        matches!(self, ArrError::Connection(_) | ArrError::Timeout)
    }
}

impl Transient for ArrError {
    fn is_transient(&self) -> bool {
        matches!(self, ArrError::Transport(_) | ArrError::Decode(_))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub version: String,
    #[serde(default)]
    pub app_name: Option<String>,
}

impl SystemStatus {
    /// Leading numeric component of the version string.
    pub fn major_version(&self) -> Option<u32> {
        self.version.split('.').next()?.trim().parse().ok()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatusMessage {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub messages: Vec<String>,
}

/// One record of the live download queue.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueueRecord {
    pub id: i64,
    #[serde(default)]
    pub download_id: Option<String>,
    #[serde(default)]
    pub episode_id: Option<i64>,
    #[serde(default)]
    pub movie_id: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub tracked_download_state: Option<String>,
    #[serde(default)]
    pub tracked_download_status: Option<String>,
    #[serde(default)]
    pub status_messages: Vec<QueueStatusMessage>,
    #[serde(default)]
    pub output_path: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl QueueRecord {
    /// The content entry this queue record downloads, if any.
    pub fn entry_id(&self) -> Option<i64> {
        self.episode_id.or(self.movie_id)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct QueuePage {
    #[serde(default)]
    pub records: Vec<QueueRecord>,
}

/// Named commands accepted by `POST /api/v3/command`.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrCommand {
    RssSync,
    RefreshMonitoredDownloads,
    EpisodeSearch {
        episode_ids: Vec<i64>,
    },
    SeriesSearch {
        series_id: i64,
    },
    MissingEpisodeSearch {
        series_id: i64,
    },
    MoviesSearch {
        movie_ids: Vec<i64>,
    },
    DownloadedEpisodesScan {
        path: String,
        download_client_id: String,
        import_mode: String,
    },
    DownloadedMoviesScan {
        path: String,
        download_client_id: String,
        import_mode: String,
    },
}

impl ArrCommand {
    pub fn name(&self) -> &'static str {
        match self {
            ArrCommand::RssSync => "RssSync",
            ArrCommand::RefreshMonitoredDownloads => "RefreshMonitoredDownloads",
            ArrCommand::EpisodeSearch { .. } => "EpisodeSearch",
            ArrCommand::SeriesSearch { .. } => "SeriesSearch",
            ArrCommand::MissingEpisodeSearch { .. } => "MissingEpisodeSearch",
            ArrCommand::MoviesSearch { .. } => "MoviesSearch",
            ArrCommand::DownloadedEpisodesScan { .. } => "DownloadedEpisodesScan",
            ArrCommand::DownloadedMoviesScan { .. } => "DownloadedMoviesScan",
        }
    }

    pub fn is_search(&self) -> bool {
        matches!(
            self,
            ArrCommand::EpisodeSearch { .. }
                | ArrCommand::SeriesSearch { .. }
                | ArrCommand::MissingEpisodeSearch { .. }
                | ArrCommand::MoviesSearch { .. }
        )
    }

    /// JSON body for the command endpoint.
    pub fn to_body(&self) -> Value {
        let name = self.name();
        match self {
            ArrCommand::RssSync | ArrCommand::RefreshMonitoredDownloads => json!({ "name": name }),
            ArrCommand::EpisodeSearch { episode_ids } => {
                json!({ "name": name, "episodeIds": episode_ids })
            }
            ArrCommand::SeriesSearch { series_id }
            | ArrCommand::MissingEpisodeSearch { series_id } => {
                json!({ "name": name, "seriesId": series_id })
            }
            ArrCommand::MoviesSearch { movie_ids } => json!({ "name": name, "movieIds": movie_ids }),
            ArrCommand::DownloadedEpisodesScan {
                path,
                download_client_id,
                import_mode,
            }
            | ArrCommand::DownloadedMoviesScan {
                path,
                download_client_id,
                import_mode,
            } => json!({
                "name": name,
                "path": path,
                "downloadClientId": download_client_id,
                "importMode": import_mode,
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SeriesRef {
    #[serde(default)]
    pub title: Option<String>,
}

/// Subset of `GET /api/v3/episode/{id}`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeMetadata {
    pub id: i64,
    #[serde(default)]
    pub series_id: Option<i64>,
    #[serde(default)]
    pub series: SeriesRef,
    #[serde(default)]
    pub quality_cutoff_not_met: bool,
}

/// Subset of `GET /api/v3/movie/{id}`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MovieMetadata {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub quality_cutoff_not_met: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SeasonStatistics {
    #[serde(default)]
    pub episode_count: i64,
    #[serde(default)]
    pub episode_file_count: i64,
    #[serde(default)]
    pub total_episode_count: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SeasonInfo {
    pub season_number: i64,
    #[serde(default)]
    pub statistics: SeasonStatistics,
}

/// Subset of `GET /api/v3/series/{id}`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SeriesMetadata {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub seasons: Vec<SeasonInfo>,
}

impl SeriesMetadata {
    /// Every wanted episode has a file. Specials count only when included.
    pub fn is_fully_downloaded(&self, include_specials: bool) -> bool {
        let mut wanted = 0;
        let mut total = 0;
        let mut files = 0;
        for season in &self.seasons {
            let stats = &season.statistics;
            wanted += stats.episode_count;
            total += stats.total_episode_count;
            files += stats.episode_file_count;
        }
        if include_specials {
            total == files
        } else {
            wanted == files
        }
    }
}

/// Sonarr/Radarr API v3 surface used by the engine.
#[async_trait]
pub trait ArrClient: Send + Sync {
    async fn system_status(&self) -> Result<SystemStatus, ArrError>;

    async fn get_queue(&self, page: u32, page_size: u32) -> Result<Vec<QueueRecord>, ArrError>;

    async fn delete_queue(
        &self,
        id: i64,
        remove_from_client: bool,
        blocklist: bool,
    ) -> Result<(), ArrError>;

    async fn post_command(&self, command: &ArrCommand) -> Result<(), ArrError>;

    async fn get_episode(&self, id: i64) -> Result<EpisodeMetadata, ArrError>;

    async fn get_movie(&self, id: i64) -> Result<MovieMetadata, ArrError>;

    async fn get_series(&self, id: i64) -> Result<SeriesMetadata, ArrError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_major_version() {
        let status = SystemStatus {
            version: "4.0.1.929".into(),
            app_name: None,
        };
        assert_eq!(status.major_version(), Some(4));
        let bad = SystemStatus {
            version: "nightly".into(),
            app_name: None,
        };
        assert_eq!(bad.major_version(), None);
    }

    #[test]
    fn test_command_bodies() {
        let body = ArrCommand::EpisodeSearch {
            episode_ids: vec![12],
        }
        .to_body();
        assert_eq!(body["name"], "EpisodeSearch");
        assert_eq!(body["episodeIds"][0], 12);

        let body = ArrCommand::DownloadedMoviesScan {
            path: "/done/Movie".into(),
            download_client_id: "ABC".into(),
            import_mode: "Move".into(),
        }
        .to_body();
        assert_eq!(body["downloadClientId"], "ABC");
        assert_eq!(body["importMode"], "Move");
        assert!(!ArrCommand::RssSync.is_search());
        assert!(ArrCommand::MissingEpisodeSearch { series_id: 1 }.is_search());
    }

    #[test]
    fn test_queue_record_parses_partial_payload() {
        let json = r#"{
            "id": 5,
            "downloadId": "ABCDEF",
            "episodeId": 77,
            "statusMessages": [{"title": "a.mkv", "messages": ["Not a Custom Format upgrade"]}]
        }"#;
        let record: QueueRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.entry_id(), Some(77));
        assert_eq!(record.status_messages[0].messages.len(), 1);
        assert!(record.output_path.is_none());
    }

    #[test]
    fn test_series_fully_downloaded() {
        let series = SeriesMetadata {
            id: 1,
            title: Some("Show".into()),
            seasons: vec![
                SeasonInfo {
                    season_number: 0,
                    statistics: SeasonStatistics {
                        episode_count: 0,
                        episode_file_count: 0,
                        total_episode_count: 3,
                    },
                },
                SeasonInfo {
                    season_number: 1,
                    statistics: SeasonStatistics {
                        episode_count: 10,
                        episode_file_count: 10,
                        total_episode_count: 10,
                    },
                },
            ],
        };
        assert!(series.is_fully_downloaded(false));
        assert!(!series.is_fully_downloaded(true));
    }

    #[test]
    fn test_error_classification() {
        assert!(ArrError::Connection("refused".into()).is_connectivity());
        assert!(!ArrError::Http {
            status: 401,
            body: String::new()
        }
        .is_connectivity());
        assert!(ArrError::Decode("eof".into()).is_transient());
    }
}
