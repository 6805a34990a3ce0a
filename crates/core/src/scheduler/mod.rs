//! The missing-content search scheduler.
//!
//! One scheduler runs per managed instance with missing search enabled. Each
//! pass refreshes the live queue and the local catalog, searches request
//! entries and today's releases, then walks the remaining candidates while
//! honouring the limit on outstanding search commands.

mod refresh;
mod years;

pub use refresh::meets_minimum_availability;
pub use years::YearWindow;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use tokio::time::Instant;
use tracing::{debug, info, trace};

use crate::arr::{ArrClient, ArrCommand};
use crate::arr_db::ArrDatabase;
use crate::config::{ArrKind, EntrySearchConfig};
use crate::connectivity::ArrLiveness;
use crate::delay::{tolerate, DelayKind, DelaySignal, LoopError};
use crate::instance::Cycle;
use crate::metrics;
use crate::queue::{self, QueueIndex};
use crate::requests::RequestReconciler;
use crate::retry::RetryPolicy;
use crate::status::{SchedulerPhase, StatusBoard};
use crate::store::{CandidateFilter, ContentEntry, EntryKind, LocalStateStore};

const TODAY_TAG: &str = "[PRIORITY SEARCH - TODAY]";

/// Searches missing or upgradeable entries for one instance.
pub struct MissingContentScheduler {
    instance: String,
    kind: ArrKind,
    config: EntrySearchConfig,
    arr: Arc<dyn ArrClient>,
    arr_db: Arc<ArrDatabase>,
    store: Arc<LocalStateStore>,
    requests: Option<RequestReconciler>,
    status: StatusBoard,
    retry: RetryPolicy,
    liveness: ArrLiveness,
    years: YearWindow,
    queue: QueueIndex,
    loop_completed: bool,
    last_request_search: Option<Instant>,
    searched_series: HashSet<i64>,
}

impl MissingContentScheduler {
    pub fn new(
        instance: impl Into<String>,
        kind: ArrKind,
        config: EntrySearchConfig,
        arr: Arc<dyn ArrClient>,
        arr_db: Arc<ArrDatabase>,
        store: Arc<LocalStateStore>,
        status: StatusBoard,
    ) -> Self {
        let years = YearWindow::new(
            config.search_by_year && !config.search_by_series,
            Duration::from_secs(config.loop_timer_mins * 60),
        );
        Self {
            instance: instance.into(),
            kind,
            liveness: ArrLiveness::new(arr.clone()),
            config,
            arr,
            arr_db,
            store,
            requests: None,
            status,
            retry: RetryPolicy::default(),
            years,
            queue: QueueIndex::default(),
            loop_completed: false,
            last_request_search: None,
            searched_series: HashSet::new(),
        }
    }

    pub fn with_requests(mut self, requests: RequestReconciler) -> Self {
        self.requests = Some(requests);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn loop_completed(&self) -> bool {
        self.loop_completed
    }

    pub fn current_year(&self) -> Option<i32> {
        self.years.current()
    }

    fn filter(&self) -> CandidateFilter {
        CandidateFilter {
            include_specials: self.config.also_search_specials,
            upgrade_search: self.config.do_upgrade_search,
            quality_unmet_search: self.config.quality_unmet_search,
        }
    }

    fn main_kind(&self) -> EntryKind {
        match self.kind {
            ArrKind::Radarr => EntryKind::Movie,
            ArrKind::Sonarr if self.config.search_by_series => EntryKind::Series,
            ArrKind::Sonarr => EntryKind::Episode,
        }
    }

    fn request_tag(&self, request: bool, todays: bool) -> &'static str {
        match (&self.requests, request, todays) {
            (Some(reconciler), true, _) => reconciler.source_kind().log_tag(),
            (_, _, true) => TODAY_TAG,
            _ => "",
        }
    }

    async fn set_phase(&self, phase: SchedulerPhase) {
        self.status.set_phase(&self.instance, phase).await;
    }

    /// Clear `Searched` flags after a completed loop when configured to.
    /// Returns how many entries were reset.
    pub fn reset_searched_state(&mut self) -> Result<usize, LoopError> {
        let completed = std::mem::take(&mut self.loop_completed);
        if !(completed && self.config.search_again_on_completion) {
            return Ok(0);
        }
        let mut reset = 0;
        let kinds: &[EntryKind] = match self.kind {
            ArrKind::Sonarr => &[EntryKind::Episode, EntryKind::Series],
            ArrKind::Radarr => &[EntryKind::Movie],
        };
        for kind in kinds {
            reset += tolerate(self.store.reset_searched(*kind), "reset_searched")?.unwrap_or(0);
        }
        info!(instance = %self.instance, reset, "Loop completed, searching everything again");
        Ok(reset)
    }

    /// Fetch the live queue and mirror it into the store.
    pub async fn refresh_queue(&mut self) -> Result<(), LoopError> {
        let records = queue::fetch_queue(self.arr.as_ref(), &self.retry).await?;
        self.queue = QueueIndex::build(&records, &[]);
        tolerate(queue::sync_store(&self.store, &self.queue), "sync_queue")?;
        Ok(())
    }

    fn already_queued(&self, entry: &ContentEntry) -> Result<bool, LoopError> {
        if entry.kind == EntryKind::Series {
            return Ok(false);
        }
        if self.queue.is_queued(entry.entry_id) {
            return Ok(true);
        }
        Ok(tolerate(self.store.is_queued(entry.entry_id), "is_queued")?.unwrap_or(false))
    }

    fn command_for(&self, entry: &ContentEntry) -> ArrCommand {
        match entry.kind {
            EntryKind::Episode => ArrCommand::EpisodeSearch {
                episode_ids: vec![entry.entry_id],
            },
            EntryKind::Series if self.config.do_upgrade_search || self.config.quality_unmet_search => {
                ArrCommand::SeriesSearch {
                    series_id: entry.entry_id,
                }
            }
            EntryKind::Series => ArrCommand::MissingEpisodeSearch {
                series_id: entry.entry_id,
            },
            EntryKind::Movie => ArrCommand::MoviesSearch {
                movie_ids: vec![entry.entry_id],
            },
        }
    }

    /// Try to search one entry.
    ///
    /// `Ok(false)` means the search limit is reached and the caller should
    /// wait and try the same entry again. Everything else is `Ok(true)`.
    pub async fn maybe_do_search(
        &mut self,
        entry: Option<&ContentEntry>,
        request: bool,
        todays: bool,
        bypass_limit: bool,
    ) -> Result<bool, LoopError> {
        let Some(entry) = entry else {
            return Ok(true);
        };
        if !self.config.search_missing {
            return Ok(true);
        }
        if !self.liveness.is_alive().await {
            return Err(DelaySignal::secs(DelayKind::Arr, 300).into());
        }
        let tag = self.request_tag(request, todays);
        let priority = request || todays;
        let bypass = bypass_limit || priority;

        if !priority && self.already_queued(entry)? {
            debug!(instance = %self.instance, "{}Skipping: Already Searched: {}", tag, entry.describe());
            tolerate(self.store.mark_searched(entry.kind, entry.entry_id), "mark_searched")?;
            return Ok(true);
        }

        let active = self.arr_db.active_search_commands()?;
        debug!(instance = %self.instance, "{}{} active search commands", tag, active);
        if !bypass && active >= i64::from(self.config.search_limit) {
            trace!(instance = %self.instance, "{}Idle: Too many commands in queue: {}", tag, entry.describe());
            return Ok(false);
        }

        let persistent_key = match entry.kind {
            EntryKind::Episode => entry.series_id.unwrap_or(entry.entry_id),
            EntryKind::Series | EntryKind::Movie => entry.entry_id,
        };
        tolerate(self.store.add_persistent(persistent_key), "add_persistent")?;
        tolerate(self.store.upsert_queue(entry.entry_id), "upsert_queue")?;

        if !self.queue.is_queued(entry.entry_id) {
            let command = self.command_for(entry);
            let arr = self.arr.clone();
            let posted = self.retry.run("search", || arr.post_command(&command)).await;
            if tolerate(posted, "search")?.is_none() {
                return Ok(true);
            }
            let reason = if request {
                "request"
            } else if todays {
                "today"
            } else if entry.kind == EntryKind::Series {
                "series"
            } else {
                "missing"
            };
            metrics::SEARCHES.with_label_values(&[reason]).inc();
            self.status.record_search(&self.instance).await;
        }
        tolerate(self.store.mark_searched(entry.kind, entry.entry_id), "mark_searched")?;
        info!(instance = %self.instance, "{}Searching for: {}", tag, entry.describe());
        Ok(true)
    }

    /// Retry `entry` until the scheduler accepts it, sleeping in between.
    async fn search_until_handled(
        &mut self,
        entry: &ContentEntry,
        request: bool,
        todays: bool,
        bypass: bool,
    ) -> Result<(), LoopError> {
        while !self.maybe_do_search(Some(entry), request, todays, bypass).await? {
            self.set_phase(SchedulerPhase::Throttled).await;
            debug!(instance = %self.instance, "Waiting for active search commands");
            tokio::time::sleep(Duration::from_secs(self.config.throttle_sleep_secs)).await;
            self.set_phase(SchedulerPhase::Searching).await;
        }
        Ok(())
    }

    /// Flag request entries and search them, at most every
    /// `search_requests_every_secs`.
    pub async fn run_request_search(&mut self, now: DateTime<Utc>) -> Result<usize, LoopError> {
        let every = Duration::from_secs(self.config.search_requests_every_secs);
        if self
            .last_request_search
            .is_some_and(|last| last.elapsed() < every)
        {
            return Ok(0);
        }
        let Some(reconciler) = self.requests.as_mut() else {
            return Ok(0);
        };
        self.last_request_search = Some(Instant::now());
        let Some(ids) = tolerate(reconciler.collect_ids(now).await, "request_ids")? else {
            return Ok(0);
        };
        let kind = match self.kind {
            ArrKind::Sonarr => EntryKind::Episode,
            ArrKind::Radarr => EntryKind::Movie,
        };
        if ids.is_empty() {
            self.store.clear_requests_except(kind, &[])?;
            return Ok(0);
        }

        let mut requested = Vec::new();
        match self.kind {
            ArrKind::Sonarr => {
                let episodes =
                    self.arr_db
                        .requested_episodes(&ids, self.config.also_search_specials, now)?;
                for episode in &episodes {
                    self.upsert_episode(episode, true).await?;
                    requested.push(episode.id);
                }
            }
            ArrKind::Radarr => {
                for movie in self.arr_db.requested_movies(&ids, now.year())? {
                    self.upsert_movie(&movie, true).await?;
                    requested.push(movie.id);
                }
            }
        }
        let cleared = self.store.clear_requests_except(kind, &requested)?;
        if cleared > 0 {
            debug!(instance = %self.instance, cleared, "Cleared withdrawn requests");
        }
        let candidates = self.store.request_candidates(kind, self.filter(), now)?;
        for entry in &candidates {
            self.search_until_handled(entry, true, false, true).await?;
        }
        Ok(candidates.len())
    }

    fn in_current_year(&self, entry: &ContentEntry) -> bool {
        match self.years.current() {
            Some(year) => entry
                .air_date_utc
                .as_deref()
                .and_then(|d| d.get(..4))
                .and_then(|y| y.parse::<i32>().ok())
                == Some(year),
            None => true,
        }
    }

    /// Search today's releases, then every other candidate.
    async fn search_candidates(&mut self, now: DateTime<Utc>) -> Result<(), LoopError> {
        let filter = self.filter();
        if self.kind == ArrKind::Sonarr && self.config.prioritize_todays_releases {
            for entry in self.store.todays_candidates(filter, now)? {
                self.search_until_handled(&entry, false, true, true).await?;
            }
        }

        self.searched_series.clear();
        match self.main_kind() {
            EntryKind::Movie => {
                for entry in self.store.movie_candidates(filter, self.years.current())? {
                    self.search_until_handled(&entry, false, false, false).await?;
                }
            }
            EntryKind::Series => {
                for entry in self.store.series_candidates(filter.upgrade_search)? {
                    self.search_until_handled(&entry, false, false, false).await?;
                }
            }
            EntryKind::Episode => {
                let candidates: Vec<ContentEntry> = self
                    .store
                    .episode_candidates(filter, now)?
                    .into_iter()
                    .filter(|e| self.in_current_year(e))
                    .collect();
                for entry in &candidates {
                    let series = entry.series_id.unwrap_or(entry.entry_id);
                    let bypass = self.searched_series.contains(&series)
                        || tolerate(self.store.in_persistent(series), "in_persistent")?
                            .unwrap_or(false);
                    self.search_until_handled(entry, false, false, bypass).await?;
                    self.searched_series.insert(series);
                }
            }
        }
        Ok(())
    }

    /// One full pass of the search loop.
    pub async fn run_pass(&mut self, now: DateTime<Utc>) -> Result<(), LoopError> {
        self.set_phase(SchedulerPhase::Refreshing).await;
        self.reset_searched_state()?;
        if self.years.needs_load() {
            let years = self
                .arr_db
                .search_years(now.year(), self.config.search_in_reverse)?;
            debug!(instance = %self.instance, ?years, "Loaded search years");
            self.years.load(years);
        }
        if let Some(year) = self.years.current() {
            debug!(instance = %self.instance, year, "Current year");
        }

        self.refresh_queue().await?;
        self.db_update(now).await?;

        self.set_phase(SchedulerPhase::Searching).await;
        self.run_request_search(now).await?;
        self.search_candidates(now).await?;

        if self.years.finish_pass() {
            info!(instance = %self.instance, "Loop completed, restarting it");
            self.years.restart();
            self.loop_completed = true;
        }
        self.set_phase(SchedulerPhase::Idle).await;
        Ok(())
    }
}

#[async_trait]
impl Cycle for MissingContentScheduler {
    fn label(&self) -> &'static str {
        "search"
    }

    fn instance(&self) -> &str {
        &self.instance
    }

    async fn cycle(&mut self) -> Result<(), LoopError> {
        self.run_pass(Utc::now()).await
    }
}
