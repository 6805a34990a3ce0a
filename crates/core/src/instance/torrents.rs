//! The per-instance torrent loop.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, info, trace};

use super::{Cycle, LoopServices};
use crate::arr::{ArrClient, ArrCommand};
use crate::classifier::{
    classify, Classification, ClassifyContext, FileDecision, FileFilter, TorrentAction,
};
use crate::config::{ArrInstanceConfig, Settings, TorrentPolicyConfig};
use crate::connectivity::{ArrLiveness, InternetProbe};
use crate::delay::{tolerate, DelayKind, DelaySignal, LoopError};
use crate::executor::{ActionSets, BatchActionExecutor, TorrentMemory};
use crate::metrics;
use crate::queue::{self, QueueIndex};
use crate::retry::RetryPolicy;
use crate::seeding::SeedingPolicyEngine;
use crate::shared_cache::SharedTorrentCache;
use crate::status::StatusBoard;
use crate::store::LocalStateStore;
use crate::torrent_client::{TorrentClient, TorrentFilters, TorrentInfo, TorrentState};

/// Sleep when the watched category is empty.
const NO_DOWNLOADS_SLEEP_SECS: u64 = 5;

/// Fires every `interval`, and immediately on first use. A zero interval
/// never fires.
#[derive(Debug, Clone)]
pub struct CommandTimer {
    interval: Duration,
    last: Option<Instant>,
}

impl CommandTimer {
    pub fn from_minutes(minutes: u64) -> Self {
        Self {
            interval: Duration::from_secs(minutes * 60),
            last: None,
        }
    }

    /// Whether the timer fired. Firing restarts it.
    pub fn due(&mut self) -> bool {
        if self.interval.is_zero() {
            return false;
        }
        let fired = self.last.is_none_or(|last| last.elapsed() >= self.interval);
        if fired {
            self.last = Some(Instant::now());
        }
        fired
    }
}

/// Classifies and acts on every torrent in one instance's category.
pub struct TorrentLoop {
    instance: String,
    category: String,
    policy: TorrentPolicyConfig,
    failed_category: String,
    recheck_category: String,
    blocklist_messages: Vec<String>,
    no_internet_sleep_secs: u64,
    delay_secs: u64,
    client: Arc<dyn TorrentClient>,
    arr: Arc<dyn ArrClient>,
    store: Arc<LocalStateStore>,
    internet: Arc<dyn InternetProbe>,
    shared: Arc<SharedTorrentCache>,
    status: StatusBoard,
    liveness: ArrLiveness,
    seeding: SeedingPolicyEngine,
    filter: FileFilter,
    executor: BatchActionExecutor,
    memory: TorrentMemory,
    queue: QueueIndex,
    retry: RetryPolicy,
    rss_sync: CommandTimer,
    refresh_downloads: CommandTimer,
}

impl TorrentLoop {
    pub fn new(
        config: &ArrInstanceConfig,
        settings: &Settings,
        services: &LoopServices,
        arr: Arc<dyn ArrClient>,
        store: Arc<LocalStateStore>,
        executor: BatchActionExecutor,
    ) -> Result<Self, regex_lite::Error> {
        let policy = config.torrent.clone();
        let debounce = policy.ignore_torrents_younger_than.max(0) as u64;
        Ok(Self {
            instance: config.name.clone(),
            category: config.category().to_string(),
            filter: FileFilter::new(&policy)?,
            seeding: SeedingPolicyEngine::new(services.client.clone(), &policy),
            memory: TorrentMemory::new(debounce),
            policy,
            failed_category: settings.failed_category.clone(),
            recheck_category: settings.recheck_category.clone(),
            blocklist_messages: config.arr_error_codes_to_blocklist.clone(),
            no_internet_sleep_secs: settings.no_internet_sleep_secs,
            delay_secs: settings.delay_sleep_secs,
            client: services.client.clone(),
            liveness: ArrLiveness::new(arr.clone()),
            arr,
            store,
            internet: services.internet.clone(),
            shared: services.shared.clone(),
            status: services.status.clone(),
            executor,
            queue: QueueIndex::default(),
            retry: RetryPolicy::default(),
            rss_sync: CommandTimer::from_minutes(config.rss_sync_timer),
            refresh_downloads: CommandTimer::from_minutes(config.refresh_downloads_timer),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    async fn post_timed_commands(&mut self) -> Result<(), LoopError> {
        let mut due = Vec::new();
        if self.rss_sync.due() {
            due.push(ArrCommand::RssSync);
        }
        if self.refresh_downloads.due() {
            due.push(ArrCommand::RefreshMonitoredDownloads);
        }
        for command in due {
            let arr = self.arr.as_ref();
            let posted = self
                .retry
                .run(command.name(), || arr.post_command(&command))
                .await;
            if tolerate(posted, command.name())?.is_some() {
                debug!(instance = %self.instance, command = command.name(), "Posted timed command");
            }
        }
        Ok(())
    }

    async fn refresh_queue(&mut self) -> Result<(), LoopError> {
        let fetched = queue::fetch_queue(self.arr.as_ref(), &self.retry).await;
        if let Some(records) = tolerate(fetched, "get_queue")? {
            self.queue = QueueIndex::build(&records, &self.blocklist_messages);
            tolerate(queue::sync_store(&self.store, &self.queue), "sync_queue")?;
            trace!(instance = %self.instance, queued = self.queue.len(), "Queue refreshed");
        }
        Ok(())
    }

    async fn process_torrent(
        &mut self,
        batch: &mut ActionSets,
        torrent: &TorrentInfo,
        now: i64,
    ) -> Result<(), LoopError> {
        let hash = torrent.hash.as_str();
        self.shared.record_name(hash, &torrent.name);
        if torrent.category != self.recheck_category {
            self.shared.record_category(hash, &torrent.category);
        }

        let trackers = tolerate(self.client.torrent_trackers(hash).await, "torrent_trackers")?
            .unwrap_or_default();
        tolerate(
            self.seeding.reconcile_trackers(torrent, &trackers).await,
            "reconcile_trackers",
        )?;
        let seeding = self.seeding.should_leave_alone(torrent, &trackers);
        tolerate(
            self.seeding.sync_seeding_tag(torrent, seeding.leave_alone).await,
            "seeding_tag",
        )?;

        if torrent.state == TorrentState::QueuedDownload {
            self.memory.note_queued(hash, now);
        }

        let ctx = ClassifyContext {
            torrent,
            now,
            seeding,
            policy: &self.policy,
            failed_category: &self.failed_category,
            recheck_category: &self.recheck_category,
            files_filtered: self.memory.files_filtered(hash),
            special_cased: self.memory.special_cased(hash),
            recently_touched: self.memory.recently_touched(hash),
            sent_to_import: self.memory.sent_to_import(hash),
            queued_at: self.memory.queued_at(hash, torrent.added_on),
        };
        let Classification { branch, action } = classify(&ctx);
        metrics::BRANCHES.with_label_values(&[branch.as_str()]).inc();
        trace!(
            instance = %self.instance,
            name = %torrent.name,
            hash,
            state = torrent.state.as_str(),
            branch = branch.as_str(),
            action = action.as_str(),
            "Classified torrent"
        );

        match action {
            TorrentAction::FilterFiles { special_case } => {
                self.filter_files(batch, torrent, special_case).await?
            }
            other => batch.record(torrent, other),
        }
        Ok(())
    }

    async fn filter_files(
        &mut self,
        batch: &mut ActionSets,
        torrent: &TorrentInfo,
        special_case: bool,
    ) -> Result<(), LoopError> {
        let hash = torrent.hash.as_str();
        let Some(files) = tolerate(self.client.torrent_files(hash).await, "torrent_files")? else {
            return Ok(());
        };
        match self.filter.decide(&files) {
            FileDecision::NotReady => return Ok(()),
            FileDecision::Keep => {}
            FileDecision::Deprioritize(ids) => {
                debug!(instance = %self.instance, hash, files = ids.len(), "Excluding files");
                batch.deprioritize(hash, ids);
            }
            FileDecision::DeleteAll => {
                info!(
                    instance = %self.instance,
                    name = %torrent.name,
                    hash,
                    "Every file is excluded, deleting torrent"
                );
                batch.record(torrent, TorrentAction::Delete);
            }
        }
        self.memory.mark_files_filtered(hash);
        if special_case {
            self.memory.mark_special_cased(hash);
        }
        Ok(())
    }
}

#[async_trait]
impl Cycle for TorrentLoop {
    fn label(&self) -> &'static str {
        "torrents"
    }

    fn instance(&self) -> &str {
        &self.instance
    }

    async fn cycle(&mut self) -> Result<(), LoopError> {
        if !self.internet.is_online().await {
            return Err(DelaySignal::secs(DelayKind::Internet, self.no_internet_sleep_secs).into());
        }
        self.post_timed_commands().await?;
        if !self.liveness.is_alive().await {
            return Err(DelaySignal::secs(DelayKind::Arr, self.delay_secs).into());
        }
        self.refresh_queue().await?;

        let torrents = self
            .client
            .list_torrents(&TorrentFilters::category(self.category.clone()))
            .await?;
        let started = Utc::now();
        self.status
            .record_torrent_cycle(&self.instance, started, torrents.len())
            .await;
        let live: HashSet<&str> = torrents.iter().map(|t| t.hash.as_str()).collect();
        self.memory.retain_live(&live);
        if torrents.is_empty() {
            return Err(DelaySignal::secs(DelayKind::NoDownloads, NO_DOWNLOADS_SLEEP_SECS).into());
        }

        let now = started.timestamp();
        let mut batch = ActionSets::new();
        for torrent in &torrents {
            self.process_torrent(&mut batch, torrent, now).await?;
        }

        if batch.is_empty() {
            return Ok(());
        }
        let report = self.executor.drain(batch, &mut self.memory, &self.queue).await?;
        debug!(instance = %self.instance, ?report, "Applied torrent actions");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArrKind;
    use crate::executor::FailureHandler;
    use crate::status::InstanceStatus;
    use crate::testing::{fixtures, ClientCall, MockArrClient, MockInternetProbe, MockTorrentClient};

    struct Harness {
        client: Arc<MockTorrentClient>,
        arr: Arc<MockArrClient>,
        internet: Arc<MockInternetProbe>,
        status: StatusBoard,
        torrents: TorrentLoop,
    }

    async fn harness() -> Harness {
        let client = Arc::new(MockTorrentClient::new());
        let arr = Arc::new(MockArrClient::new());
        let internet = Arc::new(MockInternetProbe::new());
        let store = Arc::new(LocalStateStore::in_memory().unwrap());
        let shared = Arc::new(SharedTorrentCache::new());
        let status = StatusBoard::new();
        status
            .register("sonarr", InstanceStatus::new(ArrKind::Sonarr, "sonarr", false))
            .await;

        let services = LoopServices {
            client: client.clone(),
            internet: internet.clone(),
            shared: shared.clone(),
            status: status.clone(),
        };
        let config: ArrInstanceConfig = toml::from_str(
            r#"
            name = "sonarr"
            kind = "sonarr"
            managed = true
            "#,
        )
        .unwrap();
        let failure = FailureHandler::new("sonarr", ArrKind::Sonarr, arr.clone(), store.clone(), false);
        let executor =
            BatchActionExecutor::new(ArrKind::Sonarr, "Move", client.clone(), failure, shared);
        let torrents = TorrentLoop::new(
            &config,
            &Settings::default(),
            &services,
            arr.clone(),
            store,
            executor,
        )
        .unwrap();
        Harness {
            client,
            arr,
            internet,
            status,
            torrents,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_commands_fire_first_cycle_then_wait() {
        let mut timer = CommandTimer::from_minutes(15);
        assert!(timer.due());
        assert!(!timer.due());
        tokio::time::advance(Duration::from_secs(15 * 60)).await;
        assert!(timer.due());

        let mut disabled = CommandTimer::from_minutes(0);
        assert!(!disabled.due());
    }

    #[tokio::test]
    async fn test_offline_internet_delays() {
        let mut h = harness().await;
        h.internet.set_online(false);
        let err = h.torrents.cycle().await.unwrap_err();
        assert_eq!(err.as_delay(0).map(|d| d.kind), Some(DelayKind::Internet));
    }

    #[tokio::test]
    async fn test_empty_category_delays() {
        let mut h = harness().await;
        let err = h.torrents.cycle().await.unwrap_err();
        assert_eq!(
            err.as_delay(0),
            Some(DelaySignal::secs(DelayKind::NoDownloads, NO_DOWNLOADS_SLEEP_SECS))
        );
        assert_eq!(h.arr.commands_named("RssSync").await.len(), 1);
        assert_eq!(h.arr.commands_named("RefreshMonitoredDownloads").await.len(), 1);
        assert!(h.status.get("sonarr").await.unwrap().last_torrent_cycle.is_some());
    }

    #[tokio::test]
    async fn test_unreachable_client_is_a_qbit_delay() {
        let mut h = harness().await;
        h.client
            .set_next_error(crate::torrent_client::TorrentClientError::ConnectionFailed(
                "refused".into(),
            ))
            .await;
        let err = h.torrents.cycle().await.unwrap_err();
        assert_eq!(err.as_delay(300).map(|d| d.kind), Some(DelayKind::Qbit));
    }

    #[tokio::test]
    async fn test_paused_download_is_resumed() {
        let mut h = harness().await;
        let mut torrent = fixtures::torrent("abc", TorrentState::PausedDownload);
        torrent.added_on = 0;
        h.client.add_torrent(torrent).await;
        h.client
            .set_files("abc", vec![fixtures::file(0, "Show.S01E01.mkv")])
            .await;

        // the first cycle runs the early file check
        h.torrents.cycle().await.unwrap();
        h.torrents.cycle().await.unwrap();

        let calls = h.client.calls().await;
        assert!(calls.contains(&ClientCall::Resume {
            hashes: vec!["abc".into()],
        }));
    }

    #[tokio::test]
    async fn test_torrent_leaving_moving_state_is_imported_next_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("Show.S01E01");
        std::fs::create_dir(&folder).unwrap();
        std::fs::write(folder.join("Show.S01E01.mkv"), b"x").unwrap();

        let mut h = harness().await;
        let mut torrent = fixtures::torrent("abc", TorrentState::Moving);
        torrent.name = "Show.S01E01".into();
        torrent.content_path = Some(folder.display().to_string());
        h.client.add_torrent(torrent.clone()).await;

        h.torrents.cycle().await.unwrap();
        assert!(!h.torrents.memory.recently_touched("abc"));

        torrent.state = TorrentState::StalledUpload;
        torrent.progress = 1.0;
        torrent.amount_left = 0;
        torrent.completion_on = Utc::now().timestamp() - 3600;
        h.client.add_torrent(torrent).await;

        h.torrents.cycle().await.unwrap();

        assert!(h.client.calls().await.contains(&ClientCall::Pause {
            hashes: vec!["abc".into()],
        }));
        assert_eq!(h.arr.commands_named("DownloadedEpisodesScan").await.len(), 1);
        assert!(h.torrents.memory.sent_to_import("abc"));
    }

    #[tokio::test]
    async fn test_memory_forgets_torrents_removed_outside_the_loop() {
        let mut h = harness().await;
        h.client
            .add_torrent(fixtures::torrent("abc", TorrentState::Downloading))
            .await;
        h.client
            .set_files("abc", vec![fixtures::file(0, "Show.S01E01.mkv")])
            .await;
        h.torrents.cycle().await.unwrap();
        assert!(h.torrents.memory.files_filtered("abc"));

        h.client.remove_torrent("abc").await;
        let _ = h.torrents.cycle().await;
        assert!(!h.torrents.memory.files_filtered("abc"));
        assert!(!h.torrents.memory.special_cased("abc"));
    }

    #[tokio::test]
    async fn test_excluded_files_are_deprioritized() {
        let mut h = harness().await;
        h.torrents.filter = FileFilter::new(&TorrentPolicyConfig {
            file_name_exclusion_regex: vec!["sample".into()],
            ..TorrentPolicyConfig::default()
        })
        .unwrap();
        h.client
            .add_torrent(fixtures::torrent("abc", TorrentState::Downloading))
            .await;
        h.client
            .set_files(
                "abc",
                vec![
                    fixtures::file(0, "Show.S01E01.mkv"),
                    fixtures::file(1, "Show.S01E01.sample.mkv"),
                ],
            )
            .await;

        h.torrents.cycle().await.unwrap();

        assert!(h.client.calls().await.contains(&ClientCall::SetFilePriority {
            hash: "abc".into(),
            file_ids: vec![1],
            priority: 0,
        }));
        assert!(h.torrents.memory.files_filtered("abc"));
    }
}
