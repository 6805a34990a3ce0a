//! Read-only access to the content manager's own SQLite database.
//!
//! The LocalStateStore is refreshed from these queries rather than from the
//! paged HTTP API. Date columns are stored as text; comparisons normalise
//! them to `%Y-%m-%d %H:%M:%S` so both `T`- and space-separated forms work.

mod schema;

pub use schema::{select_schema, ArrSchema, RadarrV4, RadarrV5, SonarrV3, SonarrV4};

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension, Row};
use thiserror::Error;

use crate::config::ArrKind;
use crate::requests::RequestIds;

#[derive(Debug, Error)]
pub enum ArrDbError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("{0} is not available for this instance type")]
    Unsupported(&'static str),
}

impl From<rusqlite::Error> for ArrDbError {
    fn from(e: rusqlite::Error) -> Self {
        ArrDbError::Database(e.to_string())
    }
}

/// One row of `Episodes`.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrEpisode {
    pub id: i64,
    pub series_id: i64,
    pub season_number: i64,
    pub episode_number: i64,
    pub title: Option<String>,
    pub episode_file_id: i64,
    pub absolute_episode_number: Option<i64>,
    pub scene_absolute_episode_number: Option<i64>,
    pub monitored: bool,
    pub air_date_utc: Option<String>,
    pub last_search_time: Option<String>,
}

/// One row of `Series`.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrSeries {
    pub id: i64,
    pub title: Option<String>,
    pub monitored: bool,
    pub tvdb_id: Option<i64>,
    pub imdb_id: Option<String>,
    pub added: Option<String>,
    /// Only present on v4 schemas.
    pub last_aired: Option<String>,
}

/// One row of `Movies` joined with its `MovieMetadata`.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrMovie {
    pub id: i64,
    pub monitored: bool,
    pub movie_file_id: i64,
    /// 1 announced, 2 in cinemas, 3 released.
    pub minimum_availability: i64,
    pub quality_profile_id: Option<i64>,
    pub added: Option<String>,
    pub tmdb_id: Option<i64>,
    pub imdb_id: Option<String>,
    pub title: Option<String>,
    pub year: i64,
    pub in_cinemas: Option<String>,
    pub digital_release: Option<String>,
    pub physical_release: Option<String>,
}

const EPISODE_SELECT: &str = "SELECT e.Id, e.SeriesId, e.SeasonNumber, e.EpisodeNumber, e.Title, \
    e.EpisodeFileId, e.AbsoluteEpisodeNumber, e.SceneAbsoluteEpisodeNumber, e.Monitored, \
    e.AirDateUtc, e.LastSearchTime FROM Episodes e";

const AIR_UTC: &str = "replace(substr(e.AirDateUtc, 1, 19), 'T', ' ')";

/// Aired, numbered episodes. `?1` is "now".
const AIRED_CONDITION: &str = "e.AirDateUtc IS NOT NULL \
    AND replace(substr(e.AirDateUtc, 1, 19), 'T', ' ') < ?1 \
    AND (e.AbsoluteEpisodeNumber IS NOT NULL OR e.SceneAbsoluteEpisodeNumber IS NOT NULL)";

pub(crate) fn sql_datetime(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn row_to_episode(row: &Row) -> rusqlite::Result<ArrEpisode> {
    Ok(ArrEpisode {
        id: row.get(0)?,
        series_id: row.get(1)?,
        season_number: row.get(2)?,
        episode_number: row.get(3)?,
        title: row.get(4)?,
        episode_file_id: row.get::<_, Option<i64>>(5)?.unwrap_or(0),
        absolute_episode_number: row.get(6)?,
        scene_absolute_episode_number: row.get(7)?,
        monitored: row.get::<_, Option<bool>>(8)?.unwrap_or(false),
        air_date_utc: row.get(9)?,
        last_search_time: row.get(10)?,
    })
}

fn row_to_series(row: &Row) -> rusqlite::Result<ArrSeries> {
    Ok(ArrSeries {
        id: row.get(0)?,
        title: row.get(1)?,
        monitored: row.get::<_, Option<bool>>(2)?.unwrap_or(false),
        tvdb_id: row.get(3)?,
        imdb_id: row.get(4)?,
        added: row.get(5)?,
        last_aired: row.get(6)?,
    })
}

fn row_to_movie(row: &Row) -> rusqlite::Result<ArrMovie> {
    Ok(ArrMovie {
        id: row.get(0)?,
        monitored: row.get::<_, Option<bool>>(1)?.unwrap_or(false),
        movie_file_id: row.get::<_, Option<i64>>(2)?.unwrap_or(0),
        minimum_availability: row.get::<_, Option<i64>>(3)?.unwrap_or(0),
        quality_profile_id: row.get(4)?,
        added: row.get(5)?,
        tmdb_id: row.get(6)?,
        imdb_id: row.get(7)?,
        title: row.get(8)?,
        year: row.get::<_, Option<i64>>(9)?.unwrap_or(0),
        in_cinemas: row.get(10)?,
        digital_release: row.get(11)?,
        physical_release: row.get(12)?,
    })
}

fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Read-only handle on a Sonarr/Radarr database.
pub struct ArrDatabase {
    conn: Mutex<Connection>,
    schema: Box<dyn ArrSchema>,
}

impl ArrDatabase {
    /// Open `path` read-only.
    pub fn open(path: &Path, schema: Box<dyn ArrSchema>) -> Result<Self, ArrDbError> {
        let uri = format!("file:{}?mode=ro", path.display());
        let conn = Connection::open_with_flags(
            uri,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI,
        )?;
        Ok(Self::from_connection(conn, schema))
    }

    /// Wrap an existing connection (useful for testing).
    pub fn from_connection(conn: Connection, schema: Box<dyn ArrSchema>) -> Self {
        Self {
            conn: Mutex::new(conn),
            schema,
        }
    }

    pub fn schema(&self) -> &dyn ArrSchema {
        self.schema.as_ref()
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, ArrDbError> {
        self.conn
            .lock()
            .map_err(|_| ArrDbError::Database("connection lock poisoned".to_string()))
    }

    #[cfg(test)]
    pub(crate) fn conn_for_tests(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }

    fn require(&self, kind: ArrKind, what: &'static str) -> Result<(), ArrDbError> {
        if self.schema.kind() == kind {
            Ok(())
        } else {
            Err(ArrDbError::Unsupported(what))
        }
    }

    /// Unfinished search commands, excluding the `*Missing*` family.
    pub fn active_search_commands(&self) -> Result<i64, ArrDbError> {
        let conn = self.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM Commands WHERE EndedAt IS NULL \
             AND Name LIKE '%Search' AND Name NOT LIKE '%Missing%'",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Episodes that already aired, optionally restricted to one air year.
    pub fn aired_episodes(
        &self,
        now: DateTime<Utc>,
        year: Option<i32>,
    ) -> Result<Vec<ArrEpisode>, ArrDbError> {
        self.require(ArrKind::Sonarr, "aired_episodes")?;
        let conn = self.conn()?;
        let now = sql_datetime(now);
        let episodes = match year {
            Some(year) => {
                let sql = format!(
                    "{} WHERE {} AND substr(e.AirDateUtc, 1, 4) = ?2",
                    EPISODE_SELECT, AIRED_CONDITION
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params![now, format!("{:04}", year)], row_to_episode)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let sql = format!("{} WHERE {}", EPISODE_SELECT, AIRED_CONDITION);
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params![now], row_to_episode)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
        };
        Ok(episodes)
    }

    /// Episodes that aired earlier today (UTC).
    pub fn todays_episodes(&self, now: DateTime<Utc>) -> Result<Vec<ArrEpisode>, ArrDbError> {
        self.require(ArrKind::Sonarr, "todays_episodes")?;
        let conn = self.conn()?;
        let start_of_day = now.format("%Y-%m-%d 00:00:00").to_string();
        let sql = format!(
            "{} WHERE {} AND {} >= ?2",
            EPISODE_SELECT, AIRED_CONDITION, AIR_UTC
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![sql_datetime(now), start_of_day], row_to_episode)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Every episode of the given series.
    pub fn episodes_for_series(&self, series_ids: &[i64]) -> Result<Vec<ArrEpisode>, ArrDbError> {
        self.require(ArrKind::Sonarr, "episodes_for_series")?;
        if series_ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn()?;
        let sql = format!(
            "{} WHERE e.SeriesId IN ({})",
            EPISODE_SELECT,
            placeholders(1, series_ids.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(series_ids.iter()), row_to_episode)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Every series, newest first.
    pub fn all_series(&self) -> Result<Vec<ArrSeries>, ArrDbError> {
        self.require(ArrKind::Sonarr, "all_series")?;
        let conn = self.conn()?;
        let sql = format!("{} ORDER BY s.Added DESC", self.schema.primary_select());
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], row_to_series)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn series_by_id(&self, id: i64) -> Result<Option<ArrSeries>, ArrDbError> {
        self.require(ArrKind::Sonarr, "series_by_id")?;
        let conn = self.conn()?;
        let series = conn
            .query_row(&self.schema.by_id_query(), params![id], row_to_series)
            .optional()?;
        Ok(series)
    }

    /// Every movie with its metadata, newest first, optionally for one year.
    pub fn movies(&self, year: Option<i32>) -> Result<Vec<ArrMovie>, ArrDbError> {
        self.require(ArrKind::Radarr, "movies")?;
        let conn = self.conn()?;
        let select = self.schema.primary_select();
        let movies = match year {
            Some(year) => {
                let sql = format!("{} WHERE mm.Year = ?1 ORDER BY m.Added DESC", select);
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params![year], row_to_movie)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let sql = format!("{} ORDER BY m.Added DESC", select);
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map([], row_to_movie)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
        };
        Ok(movies)
    }

    pub fn movie_by_id(&self, id: i64) -> Result<Option<ArrMovie>, ArrDbError> {
        self.require(ArrKind::Radarr, "movie_by_id")?;
        let conn = self.conn()?;
        let movie = conn
            .query_row(&self.schema.by_id_query(), params![id], row_to_movie)
            .optional()?;
        Ok(movie)
    }

    /// Distinct catalog years up to `current_year`. Descending unless `ascending`.
    pub fn search_years(&self, current_year: i32, ascending: bool) -> Result<Vec<i32>, ArrDbError> {
        let order = if ascending { "ASC" } else { "DESC" };
        let sql = match self.schema.kind() {
            ArrKind::Radarr => format!(
                "SELECT DISTINCT Year FROM MovieMetadata \
                 WHERE Year IS NOT NULL AND Year != 0 AND Year <= ?1 ORDER BY Year {}",
                order
            ),
            ArrKind::Sonarr => format!(
                "SELECT DISTINCT CAST(substr(AirDate, 1, 4) AS INTEGER) AS Year FROM Episodes \
                 WHERE AirDate IS NOT NULL AND CAST(substr(AirDate, 1, 4) AS INTEGER) <= ?1 \
                 ORDER BY Year {}",
                order
            ),
        };
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![current_year], |row| row.get::<_, i32>(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Ids of every entry that still exists upstream.
    pub fn all_entry_ids(&self, series_mode: bool) -> Result<Vec<i64>, ArrDbError> {
        let sql = match (self.schema.kind(), series_mode) {
            (ArrKind::Sonarr, true) => "SELECT Id FROM Series",
            (ArrKind::Sonarr, false) => "SELECT Id FROM Episodes",
            (ArrKind::Radarr, _) => "SELECT Id FROM Movies",
        };
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Aired episodes whose series matches a requested IMDb or TVDB id.
    pub fn requested_episodes(
        &self,
        ids: &RequestIds,
        include_specials: bool,
        now: DateTime<Utc>,
    ) -> Result<Vec<ArrEpisode>, ArrDbError> {
        self.require(ArrKind::Sonarr, "requested_episodes")?;
        if ids.imdb.is_empty() && ids.tvdb.is_empty() {
            return Ok(Vec::new());
        }

        let mut values: Vec<rusqlite::types::Value> = vec![sql_datetime(now).into()];
        let mut matches = Vec::new();
        if !ids.imdb.is_empty() {
            matches.push(format!(
                "s.ImdbId IN ({})",
                placeholders(values.len() + 1, ids.imdb.len())
            ));
            values.extend(ids.imdb.iter().cloned().map(Into::into));
        }
        if !ids.tvdb.is_empty() {
            matches.push(format!(
                "s.TvdbId IN ({})",
                placeholders(values.len() + 1, ids.tvdb.len())
            ));
            values.extend(ids.tvdb.iter().copied().map(Into::into));
        }

        let specials = if include_specials {
            ""
        } else {
            " AND e.SeasonNumber != 0"
        };
        let sql = format!(
            "{} LEFT JOIN Series s ON e.SeriesId = s.Id WHERE {}{} AND ({})",
            EPISODE_SELECT,
            AIRED_CONDITION,
            specials,
            matches.join(" OR ")
        );

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), row_to_episode)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Movies up to `current_year` matching a requested IMDb or TMDb id.
    pub fn requested_movies(
        &self,
        ids: &RequestIds,
        current_year: i32,
    ) -> Result<Vec<ArrMovie>, ArrDbError> {
        self.require(ArrKind::Radarr, "requested_movies")?;
        if ids.imdb.is_empty() && ids.tmdb.is_empty() {
            return Ok(Vec::new());
        }

        let mut values: Vec<rusqlite::types::Value> = vec![i64::from(current_year).into()];
        let mut matches = Vec::new();
        if !ids.imdb.is_empty() {
            matches.push(format!(
                "mm.ImdbId IN ({})",
                placeholders(values.len() + 1, ids.imdb.len())
            ));
            values.extend(ids.imdb.iter().cloned().map(Into::into));
        }
        if !ids.tmdb.is_empty() {
            matches.push(format!(
                "mm.TmdbId IN ({})",
                placeholders(values.len() + 1, ids.tmdb.len())
            ));
            values.extend(ids.tmdb.iter().copied().map(Into::into));
        }

        let sql = format!(
            "{} WHERE mm.Year <= ?1 AND ({}) ORDER BY m.Added DESC",
            self.schema.primary_select(),
            matches.join(" OR ")
        );

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), row_to_movie)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 18, 0, 0).unwrap()
    }

    fn sonarr_db() -> ArrDatabase {
        let conn = fixtures::arr_db_connection(ArrKind::Sonarr, 4);
        conn.execute_batch(
            r#"
            INSERT INTO Series (Id, Title, Monitored, TvdbId, ImdbId, Added, LastAired)
                VALUES (1, 'Show', 1, 100, 'tt100', '2024-01-01 00:00:00Z', NULL),
                       (2, 'Other', 1, 200, 'tt200', '2024-02-01 00:00:00Z', NULL);
            INSERT INTO Episodes (Id, SeriesId, SeasonNumber, EpisodeNumber, Title, EpisodeFileId,
                                  AbsoluteEpisodeNumber, Monitored, AirDateUtc, AirDate)
                VALUES (10, 1, 1, 1, 'Pilot', 0, 1, 1, '2023-03-01 02:00:00Z', '2023-03-01'),
                       (11, 1, 1, 2, 'Second', 0, 2, 1, '2024-06-15 02:00:00Z', '2024-06-15'),
                       (12, 1, 0, 1, 'Special', 0, 3, 1, '2024-01-05T02:00:00Z', '2024-01-05'),
                       (13, 2, 1, 1, 'Future', 0, 1, 1, '2025-01-01 02:00:00Z', '2025-01-01'),
                       (14, 2, 1, 2, 'Unnumbered', 0, NULL, 1, '2022-01-01 02:00:00Z', '2022-01-01');
            "#,
        )
        .unwrap();
        ArrDatabase::from_connection(conn, select_schema(ArrKind::Sonarr, 4))
    }

    fn radarr_db(major: u32) -> ArrDatabase {
        let conn = fixtures::arr_db_connection(ArrKind::Radarr, major);
        let profile = if major >= 5 { "QualityProfileId" } else { "ProfileId" };
        conn.execute_batch(&format!(
            r#"
            INSERT INTO MovieMetadata (Id, TmdbId, ImdbId, Title, Year)
                VALUES (1, 550, 'tt0137523', 'Fight Club', 1999),
                       (2, 27205, 'tt1375666', 'Inception', 2010),
                       (3, 1, NULL, 'Unknown Year', 0);
            INSERT INTO Movies (Id, Monitored, MovieFileId, MinimumAvailability, {profile}, Added, MovieMetadataId)
                VALUES (100, 1, 0, 3, 1, '2024-01-01', 1),
                       (101, 1, 5, 3, 1, '2024-02-01', 2),
                       (102, 0, 0, 1, 1, '2024-03-01', 3);
            "#
        ))
        .unwrap();
        ArrDatabase::from_connection(conn, select_schema(ArrKind::Radarr, major))
    }

    #[test]
    fn test_active_search_commands() {
        let db = sonarr_db();
        db.conn()
            .unwrap()
            .execute_batch(
                r#"
                INSERT INTO Commands (Name, EndedAt) VALUES ('EpisodeSearch', NULL),
                    ('SeriesSearch', NULL),
                    ('MissingEpisodeSearch', NULL),
                    ('EpisodeSearch', '2024-01-01 00:00:00'),
                    ('RssSync', NULL);
                "#,
            )
            .unwrap();
        assert_eq!(db.active_search_commands().unwrap(), 2);
    }

    #[test]
    fn test_aired_episodes_skip_future_and_unnumbered() {
        let db = sonarr_db();
        let ids: Vec<i64> = db
            .aired_episodes(now(), None)
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids.len(), 3);
        assert!(!ids.contains(&13));
        assert!(!ids.contains(&14));
    }

    #[test]
    fn test_aired_episodes_by_year() {
        let db = sonarr_db();
        let episodes = db.aired_episodes(now(), Some(2024)).unwrap();
        let mut ids: Vec<i64> = episodes.iter().map(|e| e.id).collect();
        ids.sort();
        assert_eq!(ids, vec![11, 12]);
    }

    #[test]
    fn test_todays_episodes() {
        let db = sonarr_db();
        let today = db.todays_episodes(now()).unwrap();
        assert_eq!(today.len(), 1);
        assert_eq!(today[0].id, 11);
    }

    #[test]
    fn test_episode_search_years() {
        let db = sonarr_db();
        assert_eq!(db.search_years(2024, false).unwrap(), vec![2024, 2023, 2022]);
        assert_eq!(db.search_years(2024, true).unwrap(), vec![2022, 2023, 2024]);
    }

    #[test]
    fn test_series_by_id_and_order() {
        let db = sonarr_db();
        let all = db.all_series().unwrap();
        assert_eq!(all[0].id, 2);
        let series = db.series_by_id(1).unwrap().unwrap();
        assert_eq!(series.imdb_id.as_deref(), Some("tt100"));
        assert!(db.series_by_id(99).unwrap().is_none());
    }

    #[test]
    fn test_requested_episodes_exclude_specials() {
        let db = sonarr_db();
        let mut ids = RequestIds::default();
        ids.tvdb.insert(100);
        let episodes = db.requested_episodes(&ids, false, now()).unwrap();
        let mut found: Vec<i64> = episodes.iter().map(|e| e.id).collect();
        found.sort();
        assert_eq!(found, vec![10, 11]);
    }

    #[test]
    fn test_movies_on_both_schema_versions() {
        for major in [4, 5] {
            let db = radarr_db(major);
            let movies = db.movies(None).unwrap();
            assert_eq!(movies.len(), 3);
            assert_eq!(movies[0].id, 102);
            assert_eq!(db.movies(Some(2010)).unwrap()[0].id, 101);
            let fight_club = db.movie_by_id(100).unwrap().unwrap();
            assert_eq!(fight_club.tmdb_id, Some(550));
            assert_eq!(fight_club.quality_profile_id, Some(1));
        }
    }

    #[test]
    fn test_movie_search_years_skip_zero() {
        let db = radarr_db(5);
        assert_eq!(db.search_years(2024, false).unwrap(), vec![2010, 1999]);
    }

    #[test]
    fn test_requested_movies() {
        let db = radarr_db(5);
        let mut ids = RequestIds::default();
        ids.imdb.insert("tt1375666".to_string());
        ids.tmdb.insert(550);
        let movies = db.requested_movies(&ids, 2024).unwrap();
        assert_eq!(movies.len(), 2);
    }

    #[test]
    fn test_kind_mismatch_is_unsupported() {
        let db = radarr_db(5);
        assert!(matches!(
            db.aired_episodes(now(), None),
            Err(ArrDbError::Unsupported(_))
        ));
    }

    #[test]
    fn test_open_read_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("radarr.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(&fixtures::arr_db_schema_sql(ArrKind::Radarr, 5))
                .unwrap();
        }
        let db = ArrDatabase::open(&path, select_schema(ArrKind::Radarr, 5)).unwrap();
        assert_eq!(db.active_search_commands().unwrap(), 0);
        let write = db
            .conn()
            .unwrap()
            .execute("INSERT INTO Commands (Name) VALUES ('x')", []);
        assert!(write.is_err());
    }

    #[test]
    fn test_all_entry_ids() {
        let db = sonarr_db();
        assert_eq!(db.all_entry_ids(true).unwrap().len(), 2);
        assert_eq!(db.all_entry_ids(false).unwrap().len(), 5);
    }
}
