use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

/// What kind of searchable unit a row describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Episode,
    Series,
    Movie,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Episode => "episode",
            EntryKind::Series => "series",
            EntryKind::Movie => "movie",
        }
    }
}

/// One cached searchable unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentEntry {
    pub kind: EntryKind,
    pub entry_id: i64,
    pub monitored: bool,
    /// 0 when no file exists.
    pub file_id: i64,
    pub searched: bool,
    pub upgrade: bool,
    pub quality_met: bool,
    pub is_request: bool,
    pub title: Option<String>,
    pub series_id: Option<i64>,
    pub series_title: Option<String>,
    pub season_number: Option<i64>,
    pub episode_number: Option<i64>,
    pub absolute_episode_number: Option<i64>,
    pub scene_absolute_episode_number: Option<i64>,
    /// `%Y-%m-%d %H:%M:%S`, UTC.
    pub air_date_utc: Option<String>,
    pub last_search_time: Option<String>,
    pub year: Option<i64>,
    pub tmdb_id: Option<i64>,
}

impl ContentEntry {
    /// A bare entry with every flag cleared.
    pub fn new(kind: EntryKind, entry_id: i64) -> Self {
        Self {
            kind,
            entry_id,
            monitored: true,
            file_id: 0,
            searched: false,
            upgrade: false,
            quality_met: false,
            is_request: false,
            title: None,
            series_id: None,
            series_title: None,
            season_number: None,
            episode_number: None,
            absolute_episode_number: None,
            scene_absolute_episode_number: None,
            air_date_utc: None,
            last_search_time: None,
            year: None,
            tmdb_id: None,
        }
    }

    /// Human-readable label for log lines.
    pub fn describe(&self) -> String {
        let title = self.title.as_deref().unwrap_or("?");
        match self.kind {
            EntryKind::Episode => format!(
                "{} | S{:02}E{:03} | {} | [id={}|AirDateUTC={}]",
                self.series_title.as_deref().unwrap_or("?"),
                self.season_number.unwrap_or(0),
                self.episode_number.unwrap_or(0),
                title,
                self.entry_id,
                self.air_date_utc.as_deref().unwrap_or("-"),
            ),
            EntryKind::Series => format!("{} | [id={}]", title, self.entry_id),
            EntryKind::Movie => format!(
                "{} ({}) [tmdbId={}|id={}]",
                title,
                self.year.unwrap_or(0),
                self.tmdb_id.unwrap_or(0),
                self.entry_id
            ),
        }
    }
}

/// Which entries still need a search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CandidateFilter {
    pub include_specials: bool,
    pub upgrade_search: bool,
    pub quality_unmet_search: bool,
}
