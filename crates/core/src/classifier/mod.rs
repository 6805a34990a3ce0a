//! Per-torrent state classifier.
//!
//! Classification is a pure function of one torrent snapshot plus the
//! process-local cache flags captured in a [`ClassifyContext`]. Branches are
//! data: [`BRANCH_ORDER`] is walked top to bottom and the first branch whose
//! guard matches decides the action.

mod files;

pub use files::{FileDecision, FileFilter};

use serde::Serialize;

use crate::config::{RemovalPolicy, TorrentPolicyConfig};
use crate::seeding::LeaveAlone;
use crate::torrent_client::{TorrentInfo, TorrentState};

/// Seconds a completed torrent must sit before it is imported.
const COMPLETION_SETTLE_SECS: i64 = 60;

/// What the executor should do with one torrent this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TorrentAction {
    None,
    /// Delete with files and blocklist the release.
    Delete,
    Recheck,
    Pause,
    Resume,
    /// Delete with files without blocklisting.
    RemoveFromClient,
    /// Inspect the file list and deprioritise excluded files.
    FilterFiles { special_case: bool },
    /// Pause, hand the folder to the content manager for import, then clean up.
    Complete,
}

impl TorrentAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TorrentAction::None => "none",
            TorrentAction::Delete => "delete",
            TorrentAction::Recheck => "recheck",
            TorrentAction::Pause => "pause",
            TorrentAction::Resume => "resume",
            TorrentAction::RemoveFromClient => "remove_from_client",
            TorrentAction::FilterFiles { .. } => "filter_files",
            TorrentAction::Complete => "complete",
        }
    }
}

/// One guard in the first-match-wins chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Branch {
    SeedLimitRemoval,
    FailedCategory,
    RecheckCategory,
    IgnoredState,
    FirstFileCheck,
    RecentlyTouched,
    QueuedUpload,
    Stalled,
    NearlyDone,
    PausedIncomplete,
    SentToImport,
    Errored,
    Completed,
    MissingFiles,
    SeedingDone,
    Slow,
    Downloading,
    Unresolved,
}

/// Evaluation order. The slow-download guard runs before the unavailable
/// check inside [`Branch::Downloading`].
pub const BRANCH_ORDER: [Branch; 18] = [
    Branch::SeedLimitRemoval,
    Branch::FailedCategory,
    Branch::RecheckCategory,
    Branch::IgnoredState,
    Branch::FirstFileCheck,
    Branch::RecentlyTouched,
    Branch::QueuedUpload,
    Branch::Stalled,
    Branch::NearlyDone,
    Branch::PausedIncomplete,
    Branch::SentToImport,
    Branch::Errored,
    Branch::Completed,
    Branch::MissingFiles,
    Branch::SeedingDone,
    Branch::Slow,
    Branch::Downloading,
    Branch::Unresolved,
];

/// Everything a branch may look at.
#[derive(Debug, Clone, Copy)]
pub struct ClassifyContext<'a> {
    pub torrent: &'a TorrentInfo,
    /// Unix seconds.
    pub now: i64,
    pub seeding: LeaveAlone,
    pub policy: &'a TorrentPolicyConfig,
    pub failed_category: &'a str,
    pub recheck_category: &'a str,
    /// The file list was already filtered for this hash.
    pub files_filtered: bool,
    /// The early file check already ran for this hash.
    pub special_cased: bool,
    /// Inside the debounce window after a resume or recheck.
    pub recently_touched: bool,
    pub sent_to_import: bool,
    /// Last time the torrent sat in the client's download queue, else `added_on`.
    pub queued_at: i64,
}

impl ClassifyContext<'_> {
    fn past_grace_window(&self) -> bool {
        self.queued_at < self.now - self.policy.ignore_torrents_younger_than
    }

    fn leave_alone(&self) -> bool {
        self.seeding.leave_alone || self.torrent.state == TorrentState::ForcedUpload
    }

    fn has_content_path(&self) -> bool {
        self.torrent
            .content_path
            .as_deref()
            .is_some_and(|p| !p.is_empty())
    }
}

impl Branch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Branch::SeedLimitRemoval => "seed_limit_removal",
            Branch::FailedCategory => "failed_category",
            Branch::RecheckCategory => "recheck_category",
            Branch::IgnoredState => "ignored_state",
            Branch::FirstFileCheck => "first_file_check",
            Branch::RecentlyTouched => "recently_touched",
            Branch::QueuedUpload => "queued_upload",
            Branch::Stalled => "stalled",
            Branch::NearlyDone => "nearly_done",
            Branch::PausedIncomplete => "paused_incomplete",
            Branch::SentToImport => "sent_to_import",
            Branch::Errored => "errored",
            Branch::Completed => "completed",
            Branch::MissingFiles => "missing_files",
            Branch::SeedingDone => "seeding_done",
            Branch::Slow => "slow",
            Branch::Downloading => "downloading",
            Branch::Unresolved => "unresolved",
        }
    }

    /// Whether this branch claims the torrent.
    pub fn matches(&self, ctx: &ClassifyContext<'_>) -> bool {
        let t = ctx.torrent;
        match self {
            Branch::SeedLimitRemoval => {
                ctx.seeding.force_remove && !ctx.seeding.leave_alone && t.amount_left == 0
            }
            Branch::FailedCategory => t.category == ctx.failed_category,
            Branch::RecheckCategory => t.category == ctx.recheck_category,
            Branch::IgnoredState => t.state.is_ignored(),
            Branch::FirstFileCheck => {
                t.state.is_downloading()
                    && t.state != TorrentState::MetadataDownload
                    && !ctx.special_cased
                    && !ctx.files_filtered
            }
            Branch::RecentlyTouched => ctx.recently_touched,
            Branch::QueuedUpload => t.state == TorrentState::QueuedUpload,
            Branch::Stalled => matches!(
                t.state,
                TorrentState::MetadataDownload | TorrentState::StalledDownload
            ),
            Branch::NearlyDone => {
                t.progress >= ctx.policy.maximum_deletable_percentage
                    && !t.state.is_complete()
                    && ctx.files_filtered
            }
            Branch::PausedIncomplete => {
                t.state == TorrentState::PausedDownload && t.amount_left != 0
            }
            Branch::SentToImport => ctx.sent_to_import && ctx.files_filtered,
            Branch::Errored => t.state == TorrentState::Error,
            Branch::Completed => {
                t.added_on > 0
                    && t.completion_on > 0
                    && t.amount_left == 0
                    && t.state != TorrentState::PausedUpload
                    && t.state.is_complete()
                    && ctx.has_content_path()
                    && t.completion_on < ctx.now - COMPLETION_SETTLE_SECS
            }
            Branch::MissingFiles => t.state == TorrentState::MissingFiles,
            Branch::SeedingDone => {
                t.state.is_uploading()
                    && t.seeding_time > 1
                    && t.amount_left == 0
                    && t.added_on > 0
                    && ctx.has_content_path()
                    && ctx.policy.seeding_mode.remove_torrent != RemovalPolicy::Disabled
                    && ctx.files_filtered
            }
            Branch::Slow => {
                t.state != TorrentState::PausedDownload
                    && t.state.is_downloading()
                    && ctx.past_grace_window()
                    && 0 < ctx.seeding.max_eta
                    && ctx.seeding.max_eta < t.eta
                    && !ctx.policy.do_not_remove_slow
            }
            Branch::Downloading => t.state.is_downloading(),
            Branch::Unresolved => true,
        }
    }

    /// The action taken once this branch matched.
    pub fn action(&self, ctx: &ClassifyContext<'_>) -> TorrentAction {
        let t = ctx.torrent;
        match self {
            Branch::SeedLimitRemoval | Branch::FailedCategory | Branch::Slow => {
                TorrentAction::Delete
            }
            Branch::RecheckCategory | Branch::Errored => TorrentAction::Recheck,
            Branch::IgnoredState
            | Branch::RecentlyTouched
            | Branch::SentToImport
            | Branch::Unresolved => TorrentAction::None,
            Branch::FirstFileCheck => TorrentAction::FilterFiles { special_case: true },
            Branch::QueuedUpload | Branch::SeedingDone => {
                if ctx.leave_alone() {
                    TorrentAction::None
                } else {
                    TorrentAction::Pause
                }
            }
            Branch::Stalled => {
                if ctx.past_grace_window() {
                    TorrentAction::Delete
                } else {
                    TorrentAction::None
                }
            }
            Branch::NearlyDone => {
                let max_eta = ctx.seeding.max_eta;
                if max_eta > 0 && t.last_activity < ctx.now - max_eta {
                    TorrentAction::Delete
                } else {
                    TorrentAction::None
                }
            }
            Branch::PausedIncomplete => TorrentAction::Resume,
            Branch::Completed => {
                if ctx.leave_alone() {
                    TorrentAction::None
                } else {
                    TorrentAction::Complete
                }
            }
            Branch::MissingFiles => TorrentAction::RemoveFromClient,
            Branch::Downloading => {
                if ctx.past_grace_window() && t.availability < 1.0 && ctx.files_filtered {
                    TorrentAction::Delete
                } else if ctx.files_filtered {
                    TorrentAction::None
                } else {
                    TorrentAction::FilterFiles {
                        special_case: false,
                    }
                }
            }
        }
    }
}

/// Result of classifying one torrent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub branch: Branch,
    pub action: TorrentAction,
}

/// Walk [`BRANCH_ORDER`] and return the first matching branch's decision.
pub fn classify(ctx: &ClassifyContext<'_>) -> Classification {
    classify_with(&BRANCH_ORDER, ctx)
}

/// Same as [`classify`] with a caller-supplied order.
pub fn classify_with(order: &[Branch], ctx: &ClassifyContext<'_>) -> Classification {
    for branch in order {
        if branch.matches(ctx) {
            return Classification {
                branch: *branch,
                action: branch.action(ctx),
            };
        }
    }
    Classification {
        branch: Branch::Unresolved,
        action: TorrentAction::None,
    }
}
