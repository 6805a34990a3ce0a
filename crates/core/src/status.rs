//! Live, per-instance status shared with the status endpoint.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::config::ArrKind;
use crate::delay::DelayKind;

/// Where a search loop currently is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerPhase {
    #[default]
    Idle,
    Refreshing,
    Searching,
    Throttled,
}

/// Snapshot of one instance's loops.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceStatus {
    pub kind: ArrKind,
    pub category: String,
    pub search_enabled: bool,
    pub phase: SchedulerPhase,
    pub last_torrent_cycle: Option<DateTime<Utc>>,
    /// Torrents in the category during the last cycle.
    pub torrents_seen: usize,
    pub searches_issued: u64,
    pub last_delay: Option<String>,
}

impl InstanceStatus {
    pub fn new(kind: ArrKind, category: impl Into<String>, search_enabled: bool) -> Self {
        Self {
            kind,
            category: category.into(),
            search_enabled,
            phase: SchedulerPhase::Idle,
            last_torrent_cycle: None,
            torrents_seen: 0,
            searches_issued: 0,
            last_delay: None,
        }
    }
}

/// Instance name → status. Cloning shares the same board.
#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
    inner: Arc<RwLock<BTreeMap<String, InstanceStatus>>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, name: &str, status: InstanceStatus) {
        self.inner.write().await.insert(name.to_string(), status);
    }

    async fn update<F: FnOnce(&mut InstanceStatus)>(&self, name: &str, f: F) {
        if let Some(status) = self.inner.write().await.get_mut(name) {
            f(status);
        }
    }

    pub async fn set_phase(&self, name: &str, phase: SchedulerPhase) {
        self.update(name, |s| s.phase = phase).await;
    }

    pub async fn record_torrent_cycle(&self, name: &str, at: DateTime<Utc>, torrents: usize) {
        self.update(name, |s| {
            s.last_torrent_cycle = Some(at);
            s.torrents_seen = torrents;
        })
        .await;
    }

    pub async fn record_search(&self, name: &str) {
        self.update(name, |s| s.searches_issued += 1).await;
    }

    pub async fn record_delay(&self, name: &str, kind: DelayKind) {
        self.update(name, |s| s.last_delay = Some(kind.as_str().to_string()))
            .await;
    }

    pub async fn get(&self, name: &str) -> Option<InstanceStatus> {
        self.inner.read().await.get(name).cloned()
    }

    pub async fn snapshot(&self) -> BTreeMap<String, InstanceStatus> {
        self.inner.read().await.clone()
    }
}
