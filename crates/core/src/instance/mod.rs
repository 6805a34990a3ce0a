//! Per-instance loops and the process-level wiring that builds them.
//!
//! Every loop implements [`Cycle`]; [`run_forever`] drives it, turning
//! connectivity failures into the classified sleeps described in
//! [`crate::delay`].

mod builder;
mod special;
mod torrents;

pub use builder::{build_instance, build_instance_with, ArrInstance, BuildError};
pub use special::SpecialCategoryLoop;
pub use torrents::{CommandTimer, TorrentLoop};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::error;

use crate::config::Settings;
use crate::connectivity::InternetProbe;
use crate::delay::LoopError;
use crate::metrics;
use crate::shared_cache::SharedTorrentCache;
use crate::status::StatusBoard;
use crate::torrent_client::TorrentClient;

/// Process-wide handles every loop shares.
#[derive(Clone)]
pub struct LoopServices {
    pub client: Arc<dyn TorrentClient>,
    pub internet: Arc<dyn InternetProbe>,
    pub shared: Arc<SharedTorrentCache>,
    pub status: StatusBoard,
}

/// One iteration of a long-running loop.
#[async_trait]
pub trait Cycle: Send {
    /// Metric label for cycle durations.
    fn label(&self) -> &'static str;

    fn instance(&self) -> &str;

    async fn cycle(&mut self) -> Result<(), LoopError>;
}

/// How long loops sleep between cycles and after outages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopTimings {
    pub loop_sleep: Duration,
    /// Length of connectivity backoffs that carry no length of their own.
    pub delay: Duration,
}

impl From<&Settings> for LoopTimings {
    fn from(settings: &Settings) -> Self {
        Self {
            loop_sleep: Duration::from_secs(settings.loop_sleep_secs),
            delay: Duration::from_secs(settings.delay_sleep_secs),
        }
    }
}

/// Run one cycle and sleep as its outcome dictates. Returns the sleep length.
pub async fn run_once<C>(cycle: &mut C, timings: LoopTimings, status: &StatusBoard) -> Duration
where
    C: Cycle + ?Sized,
{
    let timer = metrics::CYCLE_DURATION
        .with_label_values(&[cycle.label()])
        .start_timer();
    let result = cycle.cycle().await;
    timer.observe_duration();

    let pause = match result {
        Ok(()) => timings.loop_sleep,
        Err(e) => match e.as_delay(timings.delay.as_secs()) {
            Some(signal) => {
                signal.log(cycle.instance());
                metrics::DELAYS
                    .with_label_values(&[signal.kind.as_str()])
                    .inc();
                status.record_delay(cycle.instance(), signal.kind).await;
                signal.length
            }
            None => {
                error!(
                    instance = %cycle.instance(),
                    loop_name = cycle.label(),
                    error = %e,
                    "Cycle failed"
                );
                timings.loop_sleep
            }
        },
    };
    tokio::time::sleep(pause).await;
    pause
}

/// Drive `cycle` until the process exits.
pub async fn run_forever<C: Cycle>(mut cycle: C, timings: LoopTimings, status: StatusBoard) {
    loop {
        run_once(&mut cycle, timings, &status).await;
    }
}
