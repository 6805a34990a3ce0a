//! Prometheus metrics for the decision engine.
//!
//! The server registers [`all_metrics`] in its registry and serves them at
//! `/metrics`.

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts};

// =============================================================================
// Torrent loop
// =============================================================================

/// Actions applied to torrents, by kind.
pub static ACTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "reconcilarr_torrent_actions_total",
            "Torrent actions applied by the executor",
        ),
        &["action"], // "pause", "resume", "recheck", "delete", "remove", "reprioritize", "import", "blocklist"
    )
    .unwrap()
});

/// Classifier branch hits.
pub static BRANCHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "reconcilarr_classifier_branches_total",
            "Classifier branches matched",
        ),
        &["branch"],
    )
    .unwrap()
});

// =============================================================================
// Search loop
// =============================================================================

/// Search commands issued, by reason.
pub static SEARCHES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reconcilarr_searches_total", "Search commands issued"),
        &["reason"], // "missing", "today", "request", "series", "re_search"
    )
    .unwrap()
});

// =============================================================================
// Both loops
// =============================================================================

/// Backoff delays taken, by kind.
pub static DELAYS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reconcilarr_delays_total", "Loop backoff delays"),
        &["kind"],
    )
    .unwrap()
});

/// Duration of one loop cycle.
pub static CYCLE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "reconcilarr_cycle_duration_seconds",
            "Duration of one loop cycle",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0]),
        &["loop"], // "torrents", "search", "special"
    )
    .unwrap()
});

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(ACTIONS.clone()),
        Box::new(BRANCHES.clone()),
        Box::new(SEARCHES.clone()),
        Box::new(DELAYS.clone()),
        Box::new(CYCLE_DURATION.clone()),
    ]
}
