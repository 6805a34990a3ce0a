//! Applying one cycle's worth of torrent actions.
//!
//! The classifier only decides; everything that talks to the download client
//! or the content manager on a torrent's behalf happens in [`BatchActionExecutor::drain`].

mod actions;
mod cleanup;
mod failure;
mod memory;

pub use actions::{ActionSets, ImportJob};
pub use cleanup::{content_folder, CleanupOutcome, FolderCleaner};
pub use failure::FailureHandler;
pub use memory::TorrentMemory;

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::arr::ArrCommand;
use crate::config::ArrKind;
use crate::delay::{tolerate, LoopError};
use crate::metrics;
use crate::queue::QueueIndex;
use crate::retry::RetryPolicy;
use crate::shared_cache::SharedTorrentCache;
use crate::torrent_client::TorrentClient;

/// Counts of what one drain did, for logs and tests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DrainReport {
    pub resumed: usize,
    pub paused: usize,
    pub rechecked: usize,
    pub deprioritized: usize,
    pub imports: usize,
    pub blocklisted: usize,
    pub deleted: usize,
    pub cleanup: Option<CleanupOutcome>,
}

/// Drains [`ActionSets`] against one instance's download client and manager.
pub struct BatchActionExecutor {
    kind: ArrKind,
    import_mode: String,
    client: Arc<dyn TorrentClient>,
    failure: FailureHandler,
    shared: Arc<SharedTorrentCache>,
    cleaner: Option<FolderCleaner>,
    retry: RetryPolicy,
}

impl BatchActionExecutor {
    pub fn new(
        kind: ArrKind,
        import_mode: impl Into<String>,
        client: Arc<dyn TorrentClient>,
        failure: FailureHandler,
        shared: Arc<SharedTorrentCache>,
    ) -> Self {
        Self {
            kind,
            import_mode: import_mode.into(),
            client,
            failure,
            shared,
            cleaner: None,
            retry: RetryPolicy::default(),
        }
    }

    /// Enable completed-folder cleanup after imports.
    pub fn with_cleaner(mut self, cleaner: FolderCleaner) -> Self {
        self.cleaner = Some(cleaner);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn instance(&self) -> &str {
        self.failure.instance()
    }

    /// Apply every collected action. Connectivity failures abort the drain
    /// and surface; other failures are logged and the drain continues.
    pub async fn drain(
        &self,
        batch: ActionSets,
        memory: &mut TorrentMemory,
        queue: &QueueIndex,
    ) -> Result<DrainReport, LoopError> {
        let mut report = DrainReport::default();
        let ActionSets {
            pause,
            resume,
            recheck,
            delete,
            remove_from_client,
            change_priority,
            imports,
        } = batch;

        if !resume.is_empty() {
            let hashes: Vec<String> = resume.into_iter().collect();
            if tolerate(self.client.resume(&hashes).await, "resume")?.is_some() {
                for hash in &hashes {
                    memory.touch(hash);
                }
                report.resumed = hashes.len();
                metrics::ACTIONS
                    .with_label_values(&["resume"])
                    .inc_by(hashes.len() as u64);
            }
        }

        if !pause.is_empty() {
            let hashes: Vec<String> = pause.into_iter().collect();
            if tolerate(self.client.pause(&hashes).await, "pause")?.is_some() {
                report.paused = hashes.len();
                metrics::ACTIONS
                    .with_label_values(&["pause"])
                    .inc_by(hashes.len() as u64);
            }
        }

        if !recheck.is_empty() {
            let hashes: Vec<String> = recheck.into_iter().collect();
            if tolerate(self.client.recheck(&hashes).await, "recheck")?.is_some() {
                for hash in &hashes {
                    memory.touch(hash);
                }
                report.rechecked = hashes.len();
                metrics::ACTIONS
                    .with_label_values(&["recheck"])
                    .inc_by(hashes.len() as u64);
            }
        }

        for (hash, ids) in change_priority {
            if ids.is_empty() {
                continue;
            }
            debug!(instance = %self.instance(), hash, files = ids.len(), "Skipping excluded files");
            let result = self.client.set_file_priority(&hash, &ids, 0).await;
            if tolerate(result, "set_file_priority")?.is_some() {
                report.deprioritized += ids.len();
            }
        }

        let imported = self.send_imports(imports, memory).await?;
        report.imports = imported.len();

        let mut targets: BTreeSet<String> = delete;
        targets.extend(
            queue
                .bad_items()
                .iter()
                .map(|item| item.download_id.to_lowercase()),
        );
        self.fail_and_remove(&targets, &remove_from_client, memory, queue, &mut report)
            .await?;

        if let Some(cleaner) = &self.cleaner {
            let bad_paths: Vec<PathBuf> = queue.bad_items().iter().map(|b| b.path.clone()).collect();
            let outcome = cleaner.clean(&imported, &bad_paths).await;
            if outcome.root_empty {
                memory.clear_import_paths();
            }
            let no_media: BTreeSet<String> = outcome
                .no_media
                .iter()
                .filter(|hash| !targets.contains(*hash) && !remove_from_client.contains(*hash))
                .cloned()
                .collect();
            self.fail_and_remove(&no_media, &BTreeSet::new(), memory, queue, &mut report)
                .await?;
            report.cleanup = Some(outcome);
        }

        Ok(report)
    }

    /// Blocklist `failed`, then delete it together with `remove` from the client.
    async fn fail_and_remove(
        &self,
        failed: &BTreeSet<String>,
        remove: &BTreeSet<String>,
        memory: &mut TorrentMemory,
        queue: &QueueIndex,
        report: &mut DrainReport,
    ) -> Result<(), LoopError> {
        for hash in failed {
            let name = self.shared.name(hash);
            if self.failure.blocklist(hash, &name, queue).await? {
                report.blocklisted += 1;
            }
            memory.forget_queued(hash);
        }

        let removals: Vec<String> = failed.union(remove).cloned().collect();
        if removals.is_empty() {
            return Ok(());
        }
        info!(instance = %self.instance(), count = removals.len(), "Deleting torrents");
        if tolerate(self.client.delete(&removals, true).await, "delete")?.is_some() {
            report.deleted += removals.len();
            metrics::ACTIONS
                .with_label_values(&["delete"])
                .inc_by(removals.len() as u64);
        }
        for hash in &removals {
            memory.forget(hash);
            self.shared.forget(hash);
        }
        Ok(())
    }

    /// Ask the manager to import finished downloads. Returns the `(hash,
    /// folder)` pairs that were sent.
    async fn send_imports(
        &self,
        imports: Vec<ImportJob>,
        memory: &mut TorrentMemory,
    ) -> Result<Vec<(String, PathBuf)>, LoopError> {
        let mut sent = Vec::new();
        for job in imports {
            if memory.sent_to_import(&job.hash) {
                continue;
            }
            let folder = content_folder(&job.content_path, &job.name);
            if !folder.exists() {
                warn!(
                    instance = %self.instance(),
                    name = %job.name,
                    path = %folder.display(),
                    "Completed download path missing, retrying later"
                );
                memory.touch(&job.hash);
                continue;
            }
            if memory.import_path_sent(&folder) {
                continue;
            }

            let path = folder.display().to_string();
            let download_client_id = job.hash.to_uppercase();
            let import_mode = self.import_mode.clone();
            let command = match self.kind {
                ArrKind::Sonarr => ArrCommand::DownloadedEpisodesScan {
                    path,
                    download_client_id,
                    import_mode,
                },
                ArrKind::Radarr => ArrCommand::DownloadedMoviesScan {
                    path,
                    download_client_id,
                    import_mode,
                },
            };
            let client = self.failure.arr();
            let posted = self
                .retry
                .run("import", || client.post_command(&command))
                .await;
            if tolerate(posted, "import")?.is_none() {
                continue;
            }
            info!(instance = %self.instance(), name = %job.name, "Sent to import");
            metrics::ACTIONS.with_label_values(&["import"]).inc();
            memory.mark_sent_to_import(&job.hash, folder.clone());
            sent.push((job.hash, folder));
        }
        Ok(sent)
    }
}
