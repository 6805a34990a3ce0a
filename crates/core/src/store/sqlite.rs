//! SQLite-backed LocalStateStore.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Datelike, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{CandidateFilter, ContentEntry, EntryKind, StoreError};
use crate::arr_db::sql_datetime;

const ENTRY_COLUMNS: &str = "entry_kind, entry_id, monitored, file_id, searched, upgrade, \
    quality_met, is_request, title, series_id, series_title, season_number, episode_number, \
    absolute_episode_number, scene_absolute_episode_number, air_date_utc, last_search_time, \
    year, tmdb_id";

/// Per-instance cache of the content manager's catalog plus queue bookkeeping.
pub struct LocalStateStore {
    conn: Mutex<Connection>,
}

impl LocalStateStore {
    /// Open (creating if needed) the database file at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS entries (
                entry_kind TEXT NOT NULL,
                entry_id INTEGER NOT NULL,
                monitored INTEGER NOT NULL DEFAULT 1,
                file_id INTEGER NOT NULL DEFAULT 0,
                searched INTEGER NOT NULL DEFAULT 0,
                upgrade INTEGER NOT NULL DEFAULT 0,
                quality_met INTEGER NOT NULL DEFAULT 0,
                is_request INTEGER NOT NULL DEFAULT 0,
                title TEXT,
                series_id INTEGER,
                series_title TEXT,
                season_number INTEGER,
                episode_number INTEGER,
                absolute_episode_number INTEGER,
                scene_absolute_episode_number INTEGER,
                air_date_utc TEXT,
                last_search_time TEXT,
                year INTEGER,
                tmdb_id INTEGER,
                PRIMARY KEY (entry_kind, entry_id)
            );

            CREATE TABLE IF NOT EXISTS queue (
                entry_id INTEGER PRIMARY KEY,
                completed INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS persistent_queue (
                entry_id INTEGER PRIMARY KEY
            );

            CREATE INDEX IF NOT EXISTS idx_entries_series ON entries(series_id);
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("connection lock poisoned".to_string()))
    }

    fn row_to_entry(row: &Row) -> rusqlite::Result<ContentEntry> {
        let kind = match row.get::<_, String>(0)?.as_str() {
            "series" => EntryKind::Series,
            "movie" => EntryKind::Movie,
            _ => EntryKind::Episode,
        };
        Ok(ContentEntry {
            kind,
            entry_id: row.get(1)?,
            monitored: row.get(2)?,
            file_id: row.get(3)?,
            searched: row.get(4)?,
            upgrade: row.get(5)?,
            quality_met: row.get(6)?,
            is_request: row.get(7)?,
            title: row.get(8)?,
            series_id: row.get(9)?,
            series_title: row.get(10)?,
            season_number: row.get(11)?,
            episode_number: row.get(12)?,
            absolute_episode_number: row.get(13)?,
            scene_absolute_episode_number: row.get(14)?,
            air_date_utc: row.get(15)?,
            last_search_time: row.get(16)?,
            year: row.get(17)?,
            tmdb_id: row.get(18)?,
        })
    }

    fn select(
        &self,
        where_clause: &str,
        order_by: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<ContentEntry>, StoreError> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM entries WHERE {} ORDER BY {}",
            ENTRY_COLUMNS, where_clause, order_by
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params, Self::row_to_entry)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Insert or refresh an entry.
    ///
    /// `searched` only moves to true, `is_request` is only ever raised and
    /// `upgrade` keeps whatever the existing row holds. Catalog refreshes know
    /// nothing about requests, so lowering `is_request` is left to
    /// [`clear_requests_except`](Self::clear_requests_except).
    pub fn upsert_entry(&self, entry: &ContentEntry) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT INTO entries ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, \
                 ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
                 ON CONFLICT(entry_kind, entry_id) DO UPDATE SET
                    monitored = excluded.monitored,
                    file_id = excluded.file_id,
                    searched = CASE WHEN excluded.searched THEN 1 ELSE entries.searched END,
                    quality_met = excluded.quality_met,
                    is_request = MAX(entries.is_request, excluded.is_request),
                    title = excluded.title,
                    series_id = excluded.series_id,
                    series_title = excluded.series_title,
                    season_number = excluded.season_number,
                    episode_number = excluded.episode_number,
                    absolute_episode_number = excluded.absolute_episode_number,
                    scene_absolute_episode_number = excluded.scene_absolute_episode_number,
                    air_date_utc = excluded.air_date_utc,
                    last_search_time = excluded.last_search_time,
                    year = excluded.year,
                    tmdb_id = excluded.tmdb_id",
                ENTRY_COLUMNS
            ),
            params![
                entry.kind.as_str(),
                entry.entry_id,
                entry.monitored,
                entry.file_id,
                entry.searched,
                entry.upgrade,
                entry.quality_met,
                entry.is_request,
                entry.title,
                entry.series_id,
                entry.series_title,
                entry.season_number,
                entry.episode_number,
                entry.absolute_episode_number,
                entry.scene_absolute_episode_number,
                entry.air_date_utc,
                entry.last_search_time,
                entry.year,
                entry.tmdb_id,
            ],
        )?;
        Ok(())
    }

    pub fn get_entry(
        &self,
        kind: EntryKind,
        entry_id: i64,
    ) -> Result<Option<ContentEntry>, StoreError> {
        let conn = self.conn()?;
        let entry = conn
            .query_row(
                &format!(
                    "SELECT {} FROM entries WHERE entry_kind = ?1 AND entry_id = ?2",
                    ENTRY_COLUMNS
                ),
                params![kind.as_str(), entry_id],
                Self::row_to_entry,
            )
            .optional()?;
        Ok(entry)
    }

    /// Flag one entry as searched and upgraded.
    pub fn mark_searched(&self, kind: EntryKind, entry_id: i64) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE entries SET searched = 1, upgrade = 1 WHERE entry_kind = ?1 AND entry_id = ?2",
            params![kind.as_str(), entry_id],
        )?;
        Ok(())
    }

    /// Clear `searched`/`upgrade` on every searched entry of `kind`.
    pub fn reset_searched(&self, kind: EntryKind) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        let count = conn.execute(
            "UPDATE entries SET searched = 0, upgrade = 0 WHERE entry_kind = ?1 AND searched = 1",
            params![kind.as_str()],
        )?;
        Ok(count)
    }

    /// Run `statement` (bound to `kind` as `?1`) with `ids` loaded into the
    /// temp table `live_ids`.
    fn execute_with_ids(&self, statement: &str, kind: EntryKind, ids: &[i64]) -> Result<usize, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute_batch(
            "CREATE TEMP TABLE IF NOT EXISTS live_ids (id INTEGER PRIMARY KEY); DELETE FROM live_ids;",
        )?;
        {
            let mut insert = tx.prepare("INSERT OR IGNORE INTO live_ids (id) VALUES (?1)")?;
            for id in ids {
                insert.execute(params![id])?;
            }
        }
        let count = tx.execute(statement, params![kind.as_str()])?;
        tx.commit()?;
        Ok(count)
    }

    /// Delete entries of `kind` whose id is not in `live_ids`.
    pub fn delete_missing(&self, kind: EntryKind, live_ids: &[i64]) -> Result<usize, StoreError> {
        self.execute_with_ids(
            "DELETE FROM entries WHERE entry_kind = ?1 AND entry_id NOT IN (SELECT id FROM live_ids)",
            kind,
            live_ids,
        )
    }

    /// Lower `is_request` on entries of `kind` that are no longer requested.
    pub fn clear_requests_except(&self, kind: EntryKind, requested: &[i64]) -> Result<usize, StoreError> {
        self.execute_with_ids(
            "UPDATE entries SET is_request = 0 WHERE entry_kind = ?1 AND is_request = 1 \
             AND entry_id NOT IN (SELECT id FROM live_ids)",
            kind,
            requested,
        )
    }

    /// Episodes still wanted, grouped by series: series title, season desc, air date desc.
    pub fn episode_candidates(
        &self,
        filter: CandidateFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<ContentEntry>, StoreError> {
        let cutoff = sql_datetime(now - Duration::hours(2));
        let clause = format!(
            "entry_kind = 'episode' AND {} AND {}",
            aired_clause(filter),
            wanted_clause(filter, true)
        );
        self.select(
            &clause,
            "series_title, season_number DESC, air_date_utc DESC",
            &[&cutoff],
        )
    }

    /// Wanted episodes that aired earlier today (UTC).
    pub fn todays_candidates(
        &self,
        filter: CandidateFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<ContentEntry>, StoreError> {
        let cutoff = sql_datetime(now - Duration::hours(2));
        let start_of_day = now.format("%Y-%m-%d 00:00:00").to_string();
        let clause = format!(
            "entry_kind = 'episode' AND {} AND {} AND air_date_utc >= ?2",
            aired_clause(filter),
            wanted_clause(filter, true)
        );
        self.select(
            &clause,
            "series_title, season_number DESC, air_date_utc DESC",
            &[&cutoff, &start_of_day],
        )
    }

    /// Series rows not yet searched (or not yet upgraded), by id.
    pub fn series_candidates(&self, upgrade_search: bool) -> Result<Vec<ContentEntry>, StoreError> {
        let clause = if upgrade_search {
            "entry_kind = 'series' AND upgrade = 0"
        } else {
            "entry_kind = 'series' AND searched = 0"
        };
        self.select(clause, "entry_id ASC", &[])
    }

    /// Movies still wanted, optionally restricted to one year, by title.
    pub fn movie_candidates(
        &self,
        filter: CandidateFilter,
        year: Option<i32>,
    ) -> Result<Vec<ContentEntry>, StoreError> {
        let wanted = wanted_clause(filter, true);
        match year {
            Some(year) => self.select(
                &format!("entry_kind = 'movie' AND year = ?1 AND {}", wanted),
                "title ASC",
                &[&year],
            ),
            None => self.select(
                &format!("entry_kind = 'movie' AND year IS NOT NULL AND {}", wanted),
                "title ASC",
                &[],
            ),
        }
    }

    /// Request-flagged entries that still lack a (good enough) file.
    pub fn request_candidates(
        &self,
        kind: EntryKind,
        filter: CandidateFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<ContentEntry>, StoreError> {
        let wanted = wanted_clause(filter, false);
        match kind {
            EntryKind::Movie => {
                let year = now.year();
                self.select(
                    &format!(
                        "entry_kind = 'movie' AND is_request = 1 AND year > 0 AND year <= ?1 AND {}",
                        wanted
                    ),
                    "title ASC",
                    &[&year],
                )
            }
            _ => {
                let cutoff = sql_datetime(now - Duration::hours(2));
                self.select(
                    &format!(
                        "entry_kind = 'episode' AND is_request = 1 AND {} AND {}",
                        aired_clause(filter),
                        wanted
                    ),
                    "series_title, season_number DESC, air_date_utc DESC",
                    &[&cutoff],
                )
            }
        }
    }

    /// Record an entry as queued, replacing any previous row.
    pub fn upsert_queue(&self, entry_id: i64) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO queue (entry_id, completed) VALUES (?1, 0)
             ON CONFLICT(entry_id) DO UPDATE SET completed = 0",
            params![entry_id],
        )?;
        Ok(())
    }

    pub fn mark_queue_completed(&self, entry_id: i64) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE queue SET completed = 1 WHERE entry_id = ?1",
            params![entry_id],
        )?;
        Ok(())
    }

    pub fn is_queued(&self, entry_id: i64) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM queue WHERE entry_id = ?1",
                params![entry_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Drop queue rows for entries no longer in the live download queue.
    pub fn prune_queue(&self, live_ids: &[i64]) -> Result<usize, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute_batch(
            "CREATE TEMP TABLE IF NOT EXISTS live_queue (id INTEGER PRIMARY KEY); DELETE FROM live_queue;",
        )?;
        {
            let mut insert = tx.prepare("INSERT OR IGNORE INTO live_queue (id) VALUES (?1)")?;
            for id in live_ids {
                insert.execute(params![id])?;
            }
        }
        let count = tx.execute(
            "DELETE FROM queue WHERE entry_id NOT IN (SELECT id FROM live_queue)",
            [],
        )?;
        tx.commit()?;
        Ok(count)
    }

    /// Remember that `entry_id` was searched at least once. Never overwrites.
    pub fn add_persistent(&self, entry_id: i64) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO persistent_queue (entry_id) VALUES (?1)",
            params![entry_id],
        )?;
        Ok(())
    }

    pub fn in_persistent(&self, entry_id: i64) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM persistent_queue WHERE entry_id = ?1",
                params![entry_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

/// Aired at least two hours before `?1`, numbered, specials optional.
fn aired_clause(filter: CandidateFilter) -> String {
    let mut clause = String::from(
        "air_date_utc IS NOT NULL AND air_date_utc < ?1 \
         AND (absolute_episode_number IS NOT NULL OR scene_absolute_episode_number IS NOT NULL)",
    );
    if !filter.include_specials {
        clause.push_str(" AND season_number != 0");
    }
    clause
}

fn wanted_clause(filter: CandidateFilter, require_unsearched: bool) -> &'static str {
    if filter.upgrade_search {
        "upgrade = 0"
    } else if filter.quality_unmet_search {
        "quality_met = 0"
    } else if require_unsearched {
        "searched = 0 AND file_id = 0"
    } else {
        "file_id = 0"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 18, 0, 0).unwrap()
    }

    fn episode(id: i64, series: &str, season: i64, air: &str) -> ContentEntry {
        let mut entry = ContentEntry::new(EntryKind::Episode, id);
        entry.series_id = Some(id / 100);
        entry.series_title = Some(series.to_string());
        entry.season_number = Some(season);
        entry.episode_number = Some(id % 100);
        entry.absolute_episode_number = Some(id % 100);
        entry.air_date_utc = Some(air.to_string());
        entry
    }

    fn movie(id: i64, title: &str, year: i64) -> ContentEntry {
        let mut entry = ContentEntry::new(EntryKind::Movie, id);
        entry.title = Some(title.to_string());
        entry.year = Some(year);
        entry
    }

    #[test]
    fn test_upsert_preserves_searched_and_upgrade() {
        let store = LocalStateStore::in_memory().unwrap();
        let mut entry = movie(1, "Alien", 1979);
        store.upsert_entry(&entry).unwrap();
        store.mark_searched(EntryKind::Movie, 1).unwrap();

        entry.title = Some("Alien (Director's Cut)".to_string());
        store.upsert_entry(&entry).unwrap();

        let stored = store.get_entry(EntryKind::Movie, 1).unwrap().unwrap();
        assert!(stored.searched);
        assert!(stored.upgrade);
        assert_eq!(stored.title.as_deref(), Some("Alien (Director's Cut)"));
    }

    #[test]
    fn test_is_request_only_raised() {
        let store = LocalStateStore::in_memory().unwrap();
        let mut entry = movie(1, "Alien", 1979);
        entry.is_request = true;
        store.upsert_entry(&entry).unwrap();
        entry.is_request = false;
        store.upsert_entry(&entry).unwrap();
        assert!(store.get_entry(EntryKind::Movie, 1).unwrap().unwrap().is_request);
    }

    #[test]
    fn test_same_id_different_kind_is_separate_row() {
        let store = LocalStateStore::in_memory().unwrap();
        store.upsert_entry(&movie(5, "A", 2000)).unwrap();
        store
            .upsert_entry(&ContentEntry::new(EntryKind::Series, 5))
            .unwrap();
        assert!(store.get_entry(EntryKind::Movie, 5).unwrap().is_some());
        assert!(store.get_entry(EntryKind::Series, 5).unwrap().is_some());
    }

    #[test]
    fn test_reset_searched() {
        let store = LocalStateStore::in_memory().unwrap();
        store.upsert_entry(&movie(1, "A", 2000)).unwrap();
        store.upsert_entry(&movie(2, "B", 2000)).unwrap();
        store.mark_searched(EntryKind::Movie, 1).unwrap();
        assert_eq!(store.reset_searched(EntryKind::Movie).unwrap(), 1);
        let entry = store.get_entry(EntryKind::Movie, 1).unwrap().unwrap();
        assert!(!entry.searched);
        assert!(!entry.upgrade);
    }

    #[test]
    fn test_delete_missing() {
        let store = LocalStateStore::in_memory().unwrap();
        for id in 1..=3 {
            store.upsert_entry(&movie(id, "M", 2000)).unwrap();
        }
        assert_eq!(store.delete_missing(EntryKind::Movie, &[1, 3]).unwrap(), 1);
        assert!(store.get_entry(EntryKind::Movie, 2).unwrap().is_none());
        assert_eq!(store.delete_missing(EntryKind::Movie, &[1, 3]).unwrap(), 0);
    }

    #[test]
    fn test_episode_candidate_order_and_filters() {
        let store = LocalStateStore::in_memory().unwrap();
        store.upsert_entry(&episode(101, "Beta", 1, "2024-01-01 00:00:00")).unwrap();
        store.upsert_entry(&episode(102, "Beta", 2, "2024-02-01 00:00:00")).unwrap();
        store.upsert_entry(&episode(201, "Alpha", 1, "2024-03-01 00:00:00")).unwrap();
        store.upsert_entry(&episode(202, "Alpha", 0, "2024-03-02 00:00:00")).unwrap();
        store.upsert_entry(&episode(203, "Alpha", 1, "2024-06-15 17:00:00")).unwrap();
        let mut has_file = episode(204, "Alpha", 1, "2024-03-05 00:00:00");
        has_file.file_id = 9;
        store.upsert_entry(&has_file).unwrap();

        let ids: Vec<i64> = store
            .episode_candidates(CandidateFilter::default(), now())
            .unwrap()
            .iter()
            .map(|e| e.entry_id)
            .collect();
        assert_eq!(ids, vec![201, 102, 101]);

        let with_specials = CandidateFilter {
            include_specials: true,
            ..Default::default()
        };
        assert_eq!(store.episode_candidates(with_specials, now()).unwrap().len(), 4);
    }

    #[test]
    fn test_todays_candidates() {
        let store = LocalStateStore::in_memory().unwrap();
        store.upsert_entry(&episode(101, "Show", 1, "2024-06-15 10:00:00")).unwrap();
        store.upsert_entry(&episode(102, "Show", 1, "2024-06-14 10:00:00")).unwrap();
        let today = store
            .todays_candidates(CandidateFilter::default(), now())
            .unwrap();
        assert_eq!(today.len(), 1);
        assert_eq!(today[0].entry_id, 101);
    }

    #[test]
    fn test_movie_candidates_by_year_and_quality() {
        let store = LocalStateStore::in_memory().unwrap();
        store.upsert_entry(&movie(1, "Zodiac", 2007)).unwrap();
        store.upsert_entry(&movie(2, "Alien", 1979)).unwrap();
        let mut good = movie(3, "Heat", 1995);
        good.file_id = 4;
        good.quality_met = true;
        store.upsert_entry(&good).unwrap();

        let all = store
            .movie_candidates(CandidateFilter::default(), None)
            .unwrap();
        assert_eq!(all[0].title.as_deref(), Some("Alien"));
        assert_eq!(all.len(), 2);

        let in_2007 = store
            .movie_candidates(CandidateFilter::default(), Some(2007))
            .unwrap();
        assert_eq!(in_2007.len(), 1);

        let unmet = CandidateFilter {
            quality_unmet_search: true,
            ..Default::default()
        };
        assert_eq!(store.movie_candidates(unmet, None).unwrap().len(), 2);
    }

    #[test]
    fn test_request_candidates_ignore_searched_flag() {
        let store = LocalStateStore::in_memory().unwrap();
        let mut requested = movie(1, "Dune", 2021);
        requested.is_request = true;
        requested.searched = true;
        store.upsert_entry(&requested).unwrap();
        store.upsert_entry(&movie(2, "Other", 2021)).unwrap();

        let found = store
            .request_candidates(EntryKind::Movie, CandidateFilter::default(), now())
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].entry_id, 1);
    }

    #[test]
    fn test_withdrawn_requests_are_cleared() {
        let store = LocalStateStore::in_memory().unwrap();
        for (id, title) in [(1, "Dune"), (2, "Arrival")] {
            let mut entry = movie(id, title, 2021);
            entry.is_request = true;
            store.upsert_entry(&entry).unwrap();
        }
        let mut pilot = episode(301, "Show", 1, "2024-01-01 00:00:00");
        pilot.is_request = true;
        store.upsert_entry(&pilot).unwrap();

        assert_eq!(store.clear_requests_except(EntryKind::Movie, &[2]).unwrap(), 1);
        assert!(!store.get_entry(EntryKind::Movie, 1).unwrap().unwrap().is_request);
        assert!(store.get_entry(EntryKind::Movie, 2).unwrap().unwrap().is_request);
        assert!(store.get_entry(EntryKind::Episode, 301).unwrap().unwrap().is_request);

        assert_eq!(store.clear_requests_except(EntryKind::Movie, &[]).unwrap(), 1);
        assert!(!store.get_entry(EntryKind::Movie, 2).unwrap().unwrap().is_request);
    }

    #[test]
    fn test_request_candidates_stop_at_current_year() {
        let store = LocalStateStore::in_memory().unwrap();
        for (id, year) in [(1, 2024), (2, 2025)] {
            let mut entry = movie(id, "Requested", year);
            entry.is_request = true;
            store.upsert_entry(&entry).unwrap();
        }
        let found = store
            .request_candidates(EntryKind::Movie, CandidateFilter::default(), now())
            .unwrap();
        let ids: Vec<i64> = found.iter().map(|e| e.entry_id).collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn test_queue_lifecycle() {
        let store = LocalStateStore::in_memory().unwrap();
        store.upsert_queue(1).unwrap();
        store.upsert_queue(2).unwrap();
        store.mark_queue_completed(1).unwrap();
        assert!(store.is_queued(1).unwrap());
        assert_eq!(store.prune_queue(&[2]).unwrap(), 1);
        assert!(!store.is_queued(1).unwrap());
        assert!(store.is_queued(2).unwrap());
    }

    #[test]
    fn test_persistent_queue_is_insert_if_absent() {
        let store = LocalStateStore::in_memory().unwrap();
        store.add_persistent(7).unwrap();
        store.add_persistent(7).unwrap();
        assert!(store.in_persistent(7).unwrap());
        assert!(!store.in_persistent(8).unwrap());
        store.prune_queue(&[]).unwrap();
        assert!(store.in_persistent(7).unwrap());
    }

    #[test]
    fn test_open_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Sonarr.db");
        {
            let store = LocalStateStore::open(&path).unwrap();
            store.add_persistent(1).unwrap();
        }
        let store = LocalStateStore::open(&path).unwrap();
        assert!(store.in_persistent(1).unwrap());
    }
}
