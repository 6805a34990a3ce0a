//! Media validity probing for completed-folder cleanup.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::expiring_set::ExpiringSet;

/// How long a positive probe result is trusted.
const PROBE_CACHE_SECS: u64 = 3600;

/// Decides whether a file on disk is playable media.
#[async_trait]
pub trait MediaProbe: Send + Sync {
    async fn is_media(&self, path: &Path) -> bool;
}

/// Treats every file as media. Used when no ffprobe binary is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAllProbe;

#[async_trait]
impl MediaProbe for AcceptAllProbe {
    async fn is_media(&self, _path: &Path) -> bool {
        true
    }
}

/// Runs `ffprobe` and accepts files that report a container format and at
/// least one stream.
pub struct FfprobeProbe {
    binary: PathBuf,
    accepted: Mutex<ExpiringSet<PathBuf>>,
}

impl FfprobeProbe {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            accepted: Mutex::new(ExpiringSet::with_secs(PROBE_CACHE_SECS)),
        }
    }

    fn parse(stdout: &[u8]) -> bool {
        #[derive(Deserialize)]
        struct ProbeOutput {
            format: Option<ProbeFormat>,
            #[serde(default)]
            streams: Vec<serde_json::Value>,
        }

        #[derive(Deserialize)]
        struct ProbeFormat {
            format_name: Option<String>,
        }

        match serde_json::from_slice::<ProbeOutput>(stdout) {
            Ok(probe) => {
                probe
                    .format
                    .and_then(|f| f.format_name)
                    .is_some_and(|name| !name.is_empty())
                    && !probe.streams.is_empty()
            }
            Err(_) => false,
        }
    }
}

#[async_trait]
impl MediaProbe for FfprobeProbe {
    async fn is_media(&self, path: &Path) -> bool {
        if self.accepted.lock().await.contains(path) {
            trace!(path = %path.display(), "Probe result cached");
            return true;
        }

        let output = Command::new(&self.binary)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .output()
            .await;

        let valid = match output {
            Ok(output) if output.status.success() => Self::parse(&output.stdout),
            Ok(output) => {
                debug!(path = %path.display(), code = ?output.status.code(), "ffprobe rejected file");
                false
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "ffprobe could not run");
                false
            }
        };

        if valid {
            self.accepted.lock().await.add(path.to_path_buf());
        }
        valid
    }
}
