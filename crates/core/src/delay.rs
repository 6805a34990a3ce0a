//! Loop-level error taxonomy.
//!
//! Connectivity losses unwind to the top of a loop as a [`DelaySignal`] and put
//! the loop to sleep. Everything else is logged where it happens and the loop
//! carries on with the next torrent or entry.

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, warn};

use crate::arr::ArrError;
use crate::arr_db::ArrDbError;
use crate::requests::RequestError;
use crate::store::StoreError;
use crate::torrent_client::TorrentClientError;

/// Why a loop is backing off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DelayKind {
    /// The download client did not answer.
    Qbit,
    /// No general internet connectivity.
    Internet,
    /// The content manager did not answer.
    Arr,
    /// Forced delay after an environment hiccup.
    Delay,
    /// The watched category holds no torrents.
    NoDownloads,
}

impl DelayKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DelayKind::Qbit => "qbit",
            DelayKind::Internet => "internet",
            DelayKind::Arr => "arr",
            DelayKind::Delay => "delay",
            DelayKind::NoDownloads => "no_downloads",
        }
    }
}

impl fmt::Display for DelayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified request to sleep before starting the next cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelaySignal {
    pub kind: DelayKind,
    pub length: Duration,
}

impl DelaySignal {
    pub fn new(kind: DelayKind, length: Duration) -> Self {
        Self { kind, length }
    }

    pub fn secs(kind: DelayKind, secs: u64) -> Self {
        Self::new(kind, Duration::from_secs(secs))
    }

    /// Emit the log line matching this delay's kind.
    pub fn log(&self, instance: &str) {
        let length = self.length.as_secs();
        match self.kind {
            DelayKind::Qbit => error!(
                instance,
                "Failed to connect to the download client, sleeping for {}s", length
            ),
            DelayKind::Internet => error!(
                instance,
                "Failed to connect to the internet, sleeping for {}s", length
            ),
            DelayKind::Arr => error!(
                instance,
                "Failed to connect to the content manager, sleeping for {}s", length
            ),
            DelayKind::Delay => error!(
                instance,
                "Forced delay due to a temporary issue with the environment, sleeping for {}s",
                length
            ),
            DelayKind::NoDownloads => {
                debug!(instance, "No downloads in category, sleeping for {}s", length)
            }
        }
    }
}

impl fmt::Display for DelaySignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}s)", self.kind, self.length.as_secs())
    }
}

/// Errors surfacing out of one torrent or search cycle.
#[derive(Debug, Error)]
pub enum LoopError {
    #[error("delay requested: {0}")]
    Delay(DelaySignal),

    #[error("download client: {0}")]
    TorrentClient(#[from] TorrentClientError),

    #[error("content manager: {0}")]
    Arr(#[from] ArrError),

    #[error("content manager database: {0}")]
    ArrDb(#[from] ArrDbError),

    #[error("state store: {0}")]
    Store(#[from] StoreError),

    #[error("request service: {0}")]
    Request(#[from] RequestError),
}

impl From<DelaySignal> for LoopError {
    fn from(signal: DelaySignal) -> Self {
        LoopError::Delay(signal)
    }
}

impl LoopError {
    /// Map connectivity failures to a delay of `secs`; other errors stay unclassified.
    pub fn as_delay(&self, secs: u64) -> Option<DelaySignal> {
        match self {
            LoopError::Delay(signal) => Some(*signal),
            LoopError::TorrentClient(e) if e.is_connectivity() => {
                Some(DelaySignal::secs(DelayKind::Qbit, secs))
            }
            LoopError::Arr(e) if e.is_connectivity() => Some(DelaySignal::secs(DelayKind::Arr, secs)),
            _ => None,
        }
    }

    /// Whether this error must unwind to the top of the loop.
    pub fn is_connectivity(&self) -> bool {
        self.as_delay(0).is_some()
    }
}

/// Keep going past a failed call unless it lost connectivity.
///
/// Connectivity losses are returned as errors so the loop can back off;
/// anything else is logged and turned into `Ok(None)`.
pub fn tolerate<T, E>(result: Result<T, E>, what: &str) -> Result<Option<T>, LoopError>
where
    E: Into<LoopError>,
{
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            let e = e.into();
            if e.is_connectivity() {
                Err(e)
            } else {
                warn!(what, error = %e, "Call failed, continuing");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connectivity_errors_become_delays() {
        let err = LoopError::from(TorrentClientError::ConnectionFailed("refused".into()));
        assert_eq!(
            err.as_delay(300),
            Some(DelaySignal::secs(DelayKind::Qbit, 300))
        );

        let err = LoopError::from(ArrError::Connection("no route".into()));
        assert_eq!(err.as_delay(300).map(|d| d.kind), Some(DelayKind::Arr));
    }

    #[test]
    fn test_explicit_delay_keeps_its_length() {
        let err = LoopError::from(DelaySignal::secs(DelayKind::NoDownloads, 5));
        assert_eq!(err.as_delay(300).map(|d| d.length), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_tolerate() {
        let ok: Result<u8, StoreError> = Ok(1);
        assert_eq!(tolerate(ok, "ok").unwrap(), Some(1));

        let soft: Result<u8, StoreError> = Err(StoreError::Database("locked".into()));
        assert_eq!(tolerate(soft, "soft").unwrap(), None);

        let hard: Result<u8, TorrentClientError> = Err(TorrentClientError::Timeout);
        assert!(tolerate(hard, "hard").unwrap_err().is_connectivity());
    }

    #[test]
    fn test_other_errors_are_not_delays() {
        let err = LoopError::from(StoreError::Database("locked".into()));
        assert!(err.as_delay(300).is_none());
        let err = LoopError::from(ArrError::Http {
            status: 500,
            body: "boom".into(),
        });
        assert!(err.as_delay(300).is_none());
    }
}
