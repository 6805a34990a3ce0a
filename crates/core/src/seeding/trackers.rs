use std::collections::HashSet;

use tracing::{debug, trace};

use super::policy::{normalize_url, SeedingPolicyEngine};
use crate::torrent_client::{ShareLimits, TorrentClientError, TorrentInfo, TrackerEntry};

/// Share limit value telling the client to follow its global setting.
const USE_GLOBAL_LIMIT: i64 = -2;

impl SeedingPolicyEngine {
    /// Bring a torrent's trackers, limits and tags in line with the rules.
    ///
    /// Debounced per hash; returns `false` without touching the client when
    /// the torrent was reconciled within the window.
    pub async fn reconcile_trackers(
        &mut self,
        torrent: &TorrentInfo,
        trackers: &[TrackerEntry],
    ) -> Result<bool, TorrentClientError> {
        if self.tracker_delay.contains(torrent.hash.as_str()) {
            return Ok(false);
        }
        self.tracker_delay.add(torrent.hash.clone());

        let missing = self.missing_trackers(trackers);
        if !missing.is_empty() {
            debug!(hash = %torrent.hash, trackers = ?missing, "Adding missing trackers");
            self.client.add_trackers(&torrent.hash, &missing).await?;
        }

        let bad_messages = &self.global.remove_tracker_with_message;
        let removed: HashSet<String> = trackers
            .iter()
            .filter(|t| !t.is_pseudo())
            .filter(|t| {
                let dead = self.global.remove_dead_trackers
                    && bad_messages.iter().any(|m| *m == t.msg);
                dead || self.remove_if_exists.contains(&normalize_url(&t.url))
            })
            .map(|t| t.url.clone())
            .collect();
        if !removed.is_empty() {
            trace!(hash = %torrent.hash, trackers = ?removed, "Removing trackers");
            let urls: Vec<String> = removed.iter().cloned().collect();
            match self.client.remove_trackers(&torrent.hash, &urls).await {
                Ok(()) | Err(TorrentClientError::Http { status: 409, .. }) => {}
                Err(e) => return Err(e),
            }
        }

        let removed_normalized: HashSet<String> = removed.iter().map(|u| normalize_url(u)).collect();
        let (rule, tags) = self.most_important_rule(trackers, &removed_normalized);
        let rule = rule.cloned();
        let global = &self.global;

        let ratio = rule
            .as_ref()
            .and_then(|r| r.max_upload_ratio)
            .unwrap_or(global.max_upload_ratio);
        let seeding_time = rule
            .as_ref()
            .and_then(|r| r.max_seeding_time)
            .unwrap_or(global.max_seeding_time);
        let desired_ratio = (ratio > 0.0).then_some(ratio);
        let desired_minutes = (seeding_time > 0).then(|| (seeding_time + 59) / 60);

        let ratio_differs = desired_ratio.is_some_and(|r| (torrent.ratio_limit - r).abs() > f64::EPSILON);
        let time_differs = desired_minutes.is_some_and(|m| torrent.seeding_time_limit != m);
        if ratio_differs || time_differs {
            let limits = ShareLimits {
                ratio_limit: desired_ratio.unwrap_or(USE_GLOBAL_LIMIT as f64),
                seeding_time_limit: desired_minutes.unwrap_or(USE_GLOBAL_LIMIT),
            };
            debug!(hash = %torrent.hash, ?limits, "Applying share limits");
            self.client.set_share_limits(&torrent.hash, limits).await?;
        }

        let download = rule
            .as_ref()
            .and_then(|r| r.download_rate_limit)
            .unwrap_or(global.download_rate_limit_per_torrent);
        if let Some(limit) = rate_limit_change(download, torrent.dl_limit) {
            self.client.set_download_limit(&torrent.hash, limit).await?;
        }

        let upload = rule
            .as_ref()
            .and_then(|r| r.upload_rate_limit)
            .unwrap_or(global.upload_rate_limit_per_torrent);
        if let Some(limit) = rate_limit_change(upload, torrent.up_limit) {
            self.client.set_upload_limit(&torrent.hash, limit).await?;
        }

        if let Some(super_seed) = rule.as_ref().and_then(|r| r.super_seed_mode) {
            if super_seed != torrent.super_seeding {
                self.client.set_super_seeding(&torrent.hash, super_seed).await?;
            }
        }

        let new_tags: Vec<String> = tags
            .into_iter()
            .filter(|tag| !torrent.has_tag(tag))
            .collect();
        if !new_tags.is_empty() {
            debug!(hash = %torrent.hash, tags = ?new_tags, "Adding tracker tags");
            self.client.add_tags(&torrent.hash, &new_tags).await?;
        }

        Ok(true)
    }
}

/// Positive limits are applied when they differ; negative means unlimited
/// (-1) and is applied only if the torrent is currently capped; zero leaves
/// the torrent untouched.
fn rate_limit_change(desired: i64, live: i64) -> Option<i64> {
    if desired > 0 && desired != live {
        Some(desired)
    } else if desired < 0 && live > 0 {
        Some(-1)
    } else {
        None
    }
}
