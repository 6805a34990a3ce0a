//! Testing utilities and mock implementations.
//!
//! Mocks stand in for the download client, the content manager's HTTP API and
//! the request aggregators, so loops and executors can be driven end to end
//! without any running service.
//!
//! # Example
//!
//! ```rust,ignore
//! use reconcilarr_core::testing::{fixtures, MockArrClient, MockTorrentClient};
//!
//! let client = MockTorrentClient::new();
//! client.add_torrent(fixtures::torrent("abc", TorrentState::Downloading)).await;
//! let arr = MockArrClient::new();
//! arr.set_queue(vec![fixtures::queue_record(1, "abc", 10)]).await;
//! ```

mod mock_arr_client;
mod mock_internet_probe;
mod mock_request_source;
mod mock_torrent_client;

pub use mock_arr_client::{MockArrClient, QueueDeletion};
pub use mock_internet_probe::MockInternetProbe;
pub use mock_request_source::MockRequestSource;
pub use mock_torrent_client::{ClientCall, MockTorrentClient};

/// Test fixtures and helper functions.
pub mod fixtures {
    use rusqlite::Connection;

    use crate::arr::QueueRecord;
    use crate::config::ArrKind;
    use crate::torrent_client::{TorrentFile, TorrentInfo, TorrentState, TrackerEntry};

    /// A torrent in category `sonarr` with every limit following the client default.
    pub fn torrent(hash: &str, state: TorrentState) -> TorrentInfo {
        let complete = state.is_complete();
        TorrentInfo {
            hash: hash.to_string(),
            name: format!("Torrent {}", hash),
            state,
            category: "sonarr".to_string(),
            tags: Vec::new(),
            progress: if complete { 1.0 } else { 0.5 },
            eta: 0,
            availability: 1.0,
            added_on: 1_600_000_000,
            completion_on: 0,
            last_activity: 1_600_000_000,
            amount_left: if complete { 0 } else { 512 * 1024 * 1024 },
            size: 1024 * 1024 * 1024,
            seeding_time: 0,
            ratio: 0.0,
            ratio_limit: -2.0,
            seeding_time_limit: -2,
            up_limit: 0,
            dl_limit: 0,
            super_seeding: false,
            content_path: None,
        }
    }

    /// A working tracker.
    pub fn tracker(url: &str) -> TrackerEntry {
        TrackerEntry {
            url: url.to_string(),
            status: 2,
            msg: String::new(),
        }
    }

    /// A wanted file with nothing downloaded yet.
    pub fn file(id: i64, name: &str) -> TorrentFile {
        TorrentFile {
            id,
            name: name.to_string(),
            size: 700 * 1024 * 1024,
            progress: 0.0,
            priority: 1,
        }
    }

    /// A queue record for an episode (or movie) being downloaded as `download_id`.
    pub fn queue_record(id: i64, download_id: &str, entry_id: i64) -> QueueRecord {
        QueueRecord {
            id,
            download_id: Some(download_id.to_uppercase()),
            episode_id: Some(entry_id),
            movie_id: None,
            status: Some("downloading".to_string()),
            tracked_download_state: Some("downloading".to_string()),
            tracked_download_status: Some("ok".to_string()),
            status_messages: Vec::new(),
            output_path: None,
            title: Some(format!("Release {}", download_id)),
        }
    }

    /// DDL for the slice of a Sonarr/Radarr database that is read, per major version.
    pub fn arr_db_schema_sql(kind: ArrKind, major: u32) -> String {
        let commands = "CREATE TABLE Commands (
                Id INTEGER PRIMARY KEY AUTOINCREMENT,
                Name TEXT NOT NULL,
                EndedAt DATETIME
            );";
        match kind {
            ArrKind::Sonarr => {
                let last_aired = if major >= 4 { ", LastAired DATETIME" } else { "" };
                format!(
                    "{commands}
                    CREATE TABLE Series (
                        Id INTEGER PRIMARY KEY,
                        Title TEXT,
                        Monitored INTEGER NOT NULL DEFAULT 1,
                        TvdbId INTEGER,
                        ImdbId TEXT,
                        Added DATETIME{last_aired}
                    );
                    CREATE TABLE Episodes (
                        Id INTEGER PRIMARY KEY,
                        SeriesId INTEGER NOT NULL,
                        SeasonNumber INTEGER NOT NULL,
                        EpisodeNumber INTEGER NOT NULL,
                        Title TEXT,
                        EpisodeFileId INTEGER NOT NULL DEFAULT 0,
                        AbsoluteEpisodeNumber INTEGER,
                        SceneAbsoluteEpisodeNumber INTEGER,
                        Monitored INTEGER NOT NULL DEFAULT 1,
                        AirDateUtc DATETIME,
                        AirDate TEXT,
                        LastSearchTime DATETIME
                    );"
                )
            }
            ArrKind::Radarr => {
                let profile = if major >= 5 { "QualityProfileId" } else { "ProfileId" };
                format!(
                    "{commands}
                    CREATE TABLE MovieMetadata (
                        Id INTEGER PRIMARY KEY,
                        TmdbId INTEGER,
                        ImdbId TEXT,
                        Title TEXT,
                        Year INTEGER,
                        InCinemas DATETIME,
                        DigitalRelease DATETIME,
                        PhysicalRelease DATETIME
                    );
                    CREATE TABLE Movies (
                        Id INTEGER PRIMARY KEY,
                        Monitored INTEGER NOT NULL DEFAULT 1,
                        MovieFileId INTEGER NOT NULL DEFAULT 0,
                        MinimumAvailability INTEGER NOT NULL DEFAULT 3,
                        {profile} INTEGER,
                        Added DATETIME,
                        MovieMetadataId INTEGER NOT NULL
                    );"
                )
            }
        }
    }

    /// In-memory database laid out like the given content manager version.
    pub fn arr_db_connection(kind: ArrKind, major: u32) -> Connection {
        let conn = Connection::open_in_memory().expect("in-memory database");
        conn.execute_batch(&arr_db_schema_sql(kind, major))
            .expect("arr schema");
        conn
    }
}
