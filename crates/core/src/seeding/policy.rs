use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::config::{RemovalPolicy, SeedingModeConfig, TorrentPolicyConfig, TrackerRule};
use crate::expiring_set::ExpiringSet;
use crate::torrent_client::{
    TorrentClient, TorrentClientError, TorrentInfo, TorrentState, TrackerEntry,
};

/// Sentinel for a limit nobody configured.
pub const UNSET: i64 = -5;

/// Tag carried by torrents that are still allowed to seed.
pub const ALLOWED_SEEDING_TAG: &str = "reconcilarr-allowed_seeding";

/// Tracker reconciliation runs at most once per torrent in this window.
const TRACKER_DEBOUNCE_SECS: u64 = 600;

/// Effective per-torrent limits after tracker and category defaults.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedLimits {
    pub ratio_limit: f64,
    /// Seconds.
    pub seeding_time_limit: i64,
    pub dl_limit: i64,
    pub up_limit: i64,
    pub super_seeding: bool,
    pub max_eta: i64,
}

/// Outcome of [`SeedingPolicyEngine::should_leave_alone`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaveAlone {
    pub leave_alone: bool,
    pub max_eta: i64,
    pub force_remove: bool,
}

pub(super) fn normalize_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_lowercase()
}

fn positive_or(value: Option<i64>, fallback: i64) -> i64 {
    match value {
        Some(v) if v > 0 => v,
        _ if fallback > 0 => fallback,
        _ => UNSET,
    }
}

fn positive_ratio_or(value: Option<f64>, fallback: f64) -> f64 {
    match value {
        Some(v) if v > 0.0 => v,
        _ if fallback > 0.0 => fallback,
        _ => UNSET as f64,
    }
}

/// Per-instance seeding policy.
pub struct SeedingPolicyEngine {
    pub(super) client: Arc<dyn TorrentClient>,
    pub(super) rules: Vec<TrackerRule>,
    pub(super) global: SeedingModeConfig,
    pub(super) maximum_eta: i64,
    pub(super) add_if_missing: BTreeSet<String>,
    pub(super) remove_if_exists: HashSet<String>,
    pub(super) tracker_delay: ExpiringSet<String>,
}

impl SeedingPolicyEngine {
    pub fn new(client: Arc<dyn TorrentClient>, policy: &TorrentPolicyConfig) -> Self {
        let rules: Vec<TrackerRule> = policy
            .trackers
            .iter()
            .cloned()
            .map(|mut rule| {
                rule.uri = normalize_url(&rule.uri);
                rule
            })
            .collect();
        let add_if_missing = rules
            .iter()
            .filter(|r| r.add_tracker_if_missing && !r.remove_if_exists)
            .map(|r| r.uri.clone())
            .collect();
        let remove_if_exists = rules
            .iter()
            .filter(|r| r.remove_if_exists)
            .map(|r| r.uri.clone())
            .collect();

        Self {
            client,
            rules,
            global: policy.seeding_mode.clone(),
            maximum_eta: policy.maximum_eta,
            add_if_missing,
            remove_if_exists,
            tracker_delay: ExpiringSet::with_secs(TRACKER_DEBOUNCE_SECS),
        }
    }

    pub fn removal_policy(&self) -> RemovalPolicy {
        self.global.remove_torrent
    }

    /// Configured trackers the torrent lacks and should receive.
    pub(super) fn missing_trackers(&self, trackers: &[TrackerEntry]) -> Vec<String> {
        let current: HashSet<String> = trackers.iter().map(|t| normalize_url(&t.url)).collect();
        self.add_if_missing
            .iter()
            .filter(|uri| !current.contains(*uri))
            .cloned()
            .collect()
    }

    /// Highest-priority rule among the torrent's trackers (including the ones
    /// about to be added), plus the union of tags of every matching rule not
    /// in `removed`. Ties keep the rule listed first.
    pub(super) fn most_important_rule(
        &self,
        trackers: &[TrackerEntry],
        removed: &HashSet<String>,
    ) -> (Option<&TrackerRule>, BTreeSet<String>) {
        let mut present: HashSet<String> =
            trackers.iter().map(|t| normalize_url(&t.url)).collect();
        present.extend(self.missing_trackers(trackers));

        let matching: Vec<&TrackerRule> = self
            .rules
            .iter()
            .filter(|r| !r.remove_if_exists && present.contains(&r.uri))
            .collect();

        let tags = matching
            .iter()
            .filter(|r| !removed.contains(&r.uri))
            .flat_map(|r| r.add_tags.iter().cloned())
            .collect();

        let mut best: Option<&TrackerRule> = None;
        for rule in matching {
            if best.map_or(true, |b| rule.priority > b.priority) {
                best = Some(rule);
            }
        }
        (best, tags)
    }

    /// Limits from the most important rule, falling back to category defaults.
    pub fn resolve(&self, torrent: &TorrentInfo, trackers: &[TrackerEntry]) -> ResolvedLimits {
        let (rule, _) = self.most_important_rule(trackers, &HashSet::new());
        let global = &self.global;
        ResolvedLimits {
            ratio_limit: positive_ratio_or(
                rule.and_then(|r| r.max_upload_ratio),
                global.max_upload_ratio,
            ),
            seeding_time_limit: positive_or(
                rule.and_then(|r| r.max_seeding_time),
                global.max_seeding_time,
            ),
            dl_limit: positive_or(
                rule.and_then(|r| r.download_rate_limit),
                global.download_rate_limit_per_torrent,
            ),
            up_limit: positive_or(
                rule.and_then(|r| r.upload_rate_limit),
                global.upload_rate_limit_per_torrent,
            ),
            super_seeding: rule
                .and_then(|r| r.super_seed_mode)
                .unwrap_or(torrent.super_seeding),
            max_eta: rule
                .and_then(|r| r.maximum_eta)
                .unwrap_or(self.maximum_eta),
        }
    }

    /// Decide whether the torrent keeps seeding.
    ///
    /// The comparison limits are the larger of the resolved limit and the
    /// torrent's own live limit, so a limit raised by hand is never tightened.
    pub fn should_leave_alone(&self, torrent: &TorrentInfo, trackers: &[TrackerEntry]) -> LeaveAlone {
        let resolved = self.resolve(torrent, trackers);
        if torrent.super_seeding || torrent.state == TorrentState::ForcedUpload {
            return LeaveAlone {
                leave_alone: true,
                max_eta: resolved.max_eta,
                force_remove: false,
            };
        }

        let live_ratio = if torrent.ratio_limit > 0.0 {
            torrent.ratio_limit
        } else {
            UNSET as f64
        };
        let live_time = if torrent.seeding_time_limit > 0 {
            torrent.seeding_time_limit * 60
        } else {
            UNSET
        };
        let ratio_limit = resolved.ratio_limit.max(live_ratio);
        let time_limit = resolved.seeding_time_limit.max(live_time);

        let ratio_met = torrent.ratio >= ratio_limit;
        let time_met = torrent.seeding_time >= time_limit;

        let force_remove = match self.global.remove_torrent {
            RemovalPolicy::Disabled => false,
            RemovalPolicy::Ratio => ratio_met,
            RemovalPolicy::Time => time_met,
            RemovalPolicy::Either => ratio_met || time_met,
            RemovalPolicy::Both => ratio_met && time_met,
        };

        let mut leave_alone = !force_remove && !(ratio_met || time_met);
        if resolved.super_seeding {
            leave_alone = true;
        }

        trace!(
            hash = %torrent.hash,
            ratio_limit,
            time_limit,
            leave_alone,
            force_remove,
            "Resolved seeding decision"
        );

        LeaveAlone {
            leave_alone,
            max_eta: resolved.max_eta,
            force_remove,
        }
    }

    /// Keep the allowed-seeding tag in step with `leave_alone`. Only calls the
    /// client when the tag has to change.
    pub async fn sync_seeding_tag(
        &self,
        torrent: &TorrentInfo,
        leave_alone: bool,
    ) -> Result<(), TorrentClientError> {
        let tagged = torrent.has_tag(ALLOWED_SEEDING_TAG);
        let tag = [ALLOWED_SEEDING_TAG.to_string()];
        if leave_alone && !tagged {
            debug!(hash = %torrent.hash, "Tagging torrent as allowed to seed");
            self.client.add_tags(&torrent.hash, &tag).await
        } else if !leave_alone && tagged {
            debug!(hash = %torrent.hash, "Removing allowed-seeding tag");
            self.client.remove_tags(&torrent.hash, &tag).await
        } else {
            Ok(())
        }
    }
}
