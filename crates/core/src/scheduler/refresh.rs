//! Refreshing the LocalStateStore from the content manager's database.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use tracing::{debug, trace};

use super::MissingContentScheduler;
use crate::arr::{EpisodeMetadata, MovieMetadata, SeriesMetadata};
use crate::arr_db::{ArrEpisode, ArrMovie, ArrSeries};
use crate::config::ArrKind;
use crate::delay::{tolerate, LoopError};
use crate::store::{ContentEntry, EntryKind};

/// Normalise a database timestamp to `%Y-%m-%d %H:%M:%S`.
pub(crate) fn normalize_datetime(raw: &str) -> String {
    raw.chars()
        .take(19)
        .map(|c| if c == 'T' { ' ' } else { c })
        .collect()
}

fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let normalized = normalize_datetime(raw);
    NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(normalized.get(..10)?, "%Y-%m-%d")
                .ok()?
                .and_hms_opt(0, 0, 0)
        })
}

fn released_by(date: Option<&str>, now: DateTime<Utc>) -> bool {
    date.and_then(parse_datetime)
        .is_some_and(|d| d <= now.naive_utc())
}

/// Whether a movie has reached the availability its profile waits for.
///
/// Future or unknown years are never searched, past years always are. For
/// the current year the minimum availability decides: 1 (announced) always,
/// 2 (in cinemas) once the cinema date passed, or the home release when no
/// cinema date is known, 3 (released) once a home release date passed.
/// Movies with no dates at all are kept for 2 and 3.
pub fn meets_minimum_availability(movie: &ArrMovie, now: DateTime<Utc>) -> bool {
    let current_year = i64::from(now.year());
    if movie.year == 0 || movie.year > current_year {
        return false;
    }
    if movie.year < current_year {
        return true;
    }

    let cinema = movie.in_cinemas.as_deref();
    let digital = movie.digital_release.as_deref();
    let physical = movie.physical_release.as_deref();
    let no_dates = cinema.is_none() && digital.is_none() && physical.is_none();
    let home_release = released_by(digital, now) || released_by(physical, now);

    match movie.minimum_availability {
        1 => true,
        2 => match cinema {
            Some(_) => released_by(cinema, now),
            None => no_dates || home_release,
        },
        3 => no_dates || home_release,
        _ => false,
    }
}

pub(crate) fn episode_entry(
    episode: &ArrEpisode,
    metadata: &EpisodeMetadata,
    quality_unmet_search: bool,
) -> ContentEntry {
    let mut entry = ContentEntry::new(EntryKind::Episode, episode.id);
    entry.monitored = episode.monitored;
    entry.file_id = episode.episode_file_id;
    entry.searched = episode.episode_file_id != 0 && !quality_unmet_search;
    entry.quality_met = !metadata.quality_cutoff_not_met;
    entry.title = episode.title.clone();
    entry.series_id = Some(episode.series_id);
    entry.series_title = metadata.series.title.clone();
    entry.season_number = Some(episode.season_number);
    entry.episode_number = Some(episode.episode_number);
    entry.absolute_episode_number = episode.absolute_episode_number;
    entry.scene_absolute_episode_number = episode.scene_absolute_episode_number;
    entry.air_date_utc = episode.air_date_utc.as_deref().map(normalize_datetime);
    entry.last_search_time = episode.last_search_time.as_deref().map(normalize_datetime);
    entry
}

pub(crate) fn movie_entry(
    movie: &ArrMovie,
    metadata: &MovieMetadata,
    quality_unmet_search: bool,
) -> ContentEntry {
    let mut entry = ContentEntry::new(EntryKind::Movie, movie.id);
    entry.monitored = movie.monitored;
    entry.file_id = movie.movie_file_id;
    entry.searched = movie.movie_file_id != 0 && !quality_unmet_search;
    entry.quality_met = !metadata.quality_cutoff_not_met;
    entry.title = movie.title.clone().or_else(|| metadata.title.clone());
    entry.year = Some(movie.year);
    entry.tmdb_id = movie.tmdb_id;
    entry
}

pub(crate) fn series_entry(
    series: &ArrSeries,
    metadata: &SeriesMetadata,
    include_specials: bool,
) -> ContentEntry {
    let mut entry = ContentEntry::new(EntryKind::Series, series.id);
    entry.monitored = series.monitored;
    entry.searched = metadata.is_fully_downloaded(include_specials);
    entry.title = series.title.clone().or_else(|| metadata.title.clone());
    entry
}

impl MissingContentScheduler {
    /// Mirror the content manager's catalog into the store.
    pub async fn db_update(&self, now: DateTime<Utc>) -> Result<(), LoopError> {
        match self.kind {
            ArrKind::Sonarr => {
                if self.config.prioritize_todays_releases {
                    let todays = self.arr_db.todays_episodes(now)?;
                    for episode in &todays {
                        self.upsert_episode(episode, false).await?;
                    }
                }
                if self.config.search_by_series {
                    self.update_series().await?;
                } else {
                    self.update_episodes(now).await?;
                }
            }
            ArrKind::Radarr => self.update_movies(now).await?,
        }
        debug!(instance = %self.instance, "Finished updating the local catalog");
        Ok(())
    }

    async fn update_episodes(&self, now: DateTime<Utc>) -> Result<(), LoopError> {
        let aired = self.arr_db.aired_episodes(now, self.years.current())?;
        let series_ids: Vec<i64> = aired
            .iter()
            .map(|e| e.series_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let episodes = self.arr_db.episodes_for_series(&series_ids)?;
        for episode in &episodes {
            self.upsert_episode(episode, false).await?;
        }
        let live = self.arr_db.all_entry_ids(false)?;
        tolerate(self.store.delete_missing(EntryKind::Episode, &live), "delete_missing")?;
        Ok(())
    }

    async fn update_series(&self) -> Result<(), LoopError> {
        for series in self.arr_db.all_series()? {
            if !series.monitored {
                continue;
            }
            let Some(metadata) = tolerate(self.arr.get_series(series.id).await, "get_series")?
            else {
                continue;
            };
            let entry = series_entry(&series, &metadata, self.config.also_search_specials);
            trace!(instance = %self.instance, entry = %entry.describe(), "Updating series");
            tolerate(self.store.upsert_entry(&entry), "upsert_entry")?;
        }
        let live = self.arr_db.all_entry_ids(true)?;
        tolerate(self.store.delete_missing(EntryKind::Series, &live), "delete_missing")?;
        Ok(())
    }

    async fn update_movies(&self, now: DateTime<Utc>) -> Result<(), LoopError> {
        for movie in self.arr_db.movies(self.years.current())? {
            if meets_minimum_availability(&movie, now) {
                self.upsert_movie(&movie, false).await?;
            } else {
                trace!(
                    instance = %self.instance,
                    title = movie.title.as_deref().unwrap_or("?"),
                    minimum_availability = movie.minimum_availability,
                    "Skipping unavailable movie"
                );
            }
        }
        let live = self.arr_db.all_entry_ids(false)?;
        tolerate(self.store.delete_missing(EntryKind::Movie, &live), "delete_missing")?;
        Ok(())
    }

    pub(crate) async fn upsert_episode(
        &self,
        episode: &ArrEpisode,
        is_request: bool,
    ) -> Result<(), LoopError> {
        if !episode.monitored {
            return Ok(());
        }
        let Some(metadata) = tolerate(self.arr.get_episode(episode.id).await, "get_episode")? else {
            return Ok(());
        };
        let mut entry = episode_entry(episode, &metadata, self.config.quality_unmet_search);
        entry.is_request = is_request;
        trace!(instance = %self.instance, entry = %entry.describe(), "Updating episode");
        tolerate(self.store.upsert_entry(&entry), "upsert_entry")?;
        if entry.searched {
            tolerate(self.store.mark_queue_completed(entry.entry_id), "mark_queue_completed")?;
        }
        Ok(())
    }

    pub(crate) async fn upsert_movie(&self, movie: &ArrMovie, is_request: bool) -> Result<(), LoopError> {
        if !movie.monitored {
            return Ok(());
        }
        let Some(metadata) = tolerate(self.arr.get_movie(movie.id).await, "get_movie")? else {
            return Ok(());
        };
        let mut entry = movie_entry(movie, &metadata, self.config.quality_unmet_search);
        entry.is_request = is_request;
        trace!(instance = %self.instance, entry = %entry.describe(), "Updating movie");
        tolerate(self.store.upsert_entry(&entry), "upsert_entry")?;
        if entry.searched {
            tolerate(self.store.mark_queue_completed(entry.entry_id), "mark_queue_completed")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn movie(year: i64, availability: i64) -> ArrMovie {
        ArrMovie {
            id: 1,
            monitored: true,
            movie_file_id: 0,
            minimum_availability: availability,
            quality_profile_id: Some(1),
            added: None,
            tmdb_id: Some(10),
            imdb_id: None,
            title: Some("Film".into()),
            year,
            in_cinemas: None,
            digital_release: None,
            physical_release: None,
        }
    }

    #[test]
    fn test_year_bounds() {
        assert!(!meets_minimum_availability(&movie(0, 1), now()));
        assert!(!meets_minimum_availability(&movie(2025, 1), now()));
        assert!(meets_minimum_availability(&movie(2020, 3), now()));
    }

    #[test]
    fn test_announced_always_kept() {
        let mut m = movie(2024, 1);
        m.in_cinemas = Some("2024-12-01T00:00:00Z".into());
        assert!(meets_minimum_availability(&m, now()));
    }

    #[test]
    fn test_in_cinemas_waits_for_cinema_date() {
        let mut m = movie(2024, 2);
        assert!(meets_minimum_availability(&m, now()));

        m.in_cinemas = Some("2024-07-01T00:00:00Z".into());
        assert!(!meets_minimum_availability(&m, now()));
        m.in_cinemas = Some("2024-05-01T00:00:00Z".into());
        assert!(meets_minimum_availability(&m, now()));

        m.in_cinemas = None;
        m.digital_release = Some("2024-08-01 00:00:00".into());
        assert!(!meets_minimum_availability(&m, now()));
        m.physical_release = Some("2024-06-01".into());
        assert!(meets_minimum_availability(&m, now()));
    }

    #[test]
    fn test_released_needs_home_release() {
        let mut m = movie(2024, 3);
        assert!(meets_minimum_availability(&m, now()));

        m.in_cinemas = Some("2024-01-01T00:00:00Z".into());
        assert!(!meets_minimum_availability(&m, now()));

        m.digital_release = Some("2024-06-14T00:00:00Z".into());
        assert!(meets_minimum_availability(&m, now()));
    }

    #[test]
    fn test_unknown_availability_skipped() {
        assert!(!meets_minimum_availability(&movie(2024, 0), now()));
    }

    #[test]
    fn test_normalize_datetime() {
        assert_eq!(normalize_datetime("2024-06-15T10:30:00Z"), "2024-06-15 10:30:00");
        assert_eq!(normalize_datetime("2024-06-15 10:30:00.123"), "2024-06-15 10:30:00");
    }

    #[test]
    fn test_episode_entry_flags() {
        let episode = ArrEpisode {
            id: 5,
            series_id: 2,
            season_number: 1,
            episode_number: 3,
            title: Some("Three".into()),
            episode_file_id: 9,
            absolute_episode_number: Some(3),
            scene_absolute_episode_number: None,
            monitored: true,
            air_date_utc: Some("2024-01-01T02:00:00Z".into()),
            last_search_time: None,
        };
        let metadata = EpisodeMetadata {
            id: 5,
            series_id: Some(2),
            series: crate::arr::SeriesRef {
                title: Some("Show".into()),
            },
            quality_cutoff_not_met: true,
        };

        let entry = episode_entry(&episode, &metadata, false);
        assert!(entry.searched);
        assert!(!entry.quality_met);
        assert_eq!(entry.series_title.as_deref(), Some("Show"));
        assert_eq!(entry.air_date_utc.as_deref(), Some("2024-01-01 02:00:00"));

        // quality-unmet search keeps files with a poor quality wanted
        assert!(!episode_entry(&episode, &metadata, true).searched);
    }
}
