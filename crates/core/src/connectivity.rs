//! Reachability checks for the internet at large and for a content manager.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::arr::ArrClient;
use crate::expiring_set::ExpiringSet;

/// Positive results are trusted for this long.
const ALIVE_CACHE_SECS: u64 = 10;

/// General internet connectivity.
#[async_trait]
pub trait InternetProbe: Send + Sync {
    async fn is_online(&self) -> bool;
}

/// Online when any of the configured URLs answers at all.
pub struct HttpInternetProbe {
    client: Client,
    urls: Vec<String>,
    online: Mutex<ExpiringSet<()>>,
}

impl HttpInternetProbe {
    pub fn new(urls: Vec<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            urls,
            online: Mutex::new(ExpiringSet::with_secs(ALIVE_CACHE_SECS)),
        })
    }
}

#[async_trait]
impl InternetProbe for HttpInternetProbe {
    async fn is_online(&self) -> bool {
        if self.urls.is_empty() {
            return true;
        }
        let mut online = self.online.lock().await;
        if online.contains(&()) {
            return true;
        }
        for url in &self.urls {
            match self.client.head(url).send().await {
                Ok(_) => {
                    trace!(url, "Internet check succeeded");
                    online.add(());
                    return true;
                }
                Err(e) => debug!(url, error = %e, "Internet check failed"),
            }
        }
        false
    }
}

/// Cached liveness of one content manager.
///
/// Any HTTP answer proves the service is up, even an error status. Only a
/// connection failure or timeout counts as down.
pub struct ArrLiveness {
    arr: Arc<dyn ArrClient>,
    alive: ExpiringSet<()>,
}

impl ArrLiveness {
    pub fn new(arr: Arc<dyn ArrClient>) -> Self {
        Self {
            arr,
            alive: ExpiringSet::with_secs(ALIVE_CACHE_SECS),
        }
    }

    pub async fn is_alive(&mut self) -> bool {
        if self.alive.contains(&()) {
            return true;
        }
        let alive = match self.arr.system_status().await {
            Ok(_) => true,
            Err(e) if e.is_connectivity() => {
                debug!(error = %e, "Content manager unreachable");
                false
            }
            Err(_) => true,
        };
        if alive {
            self.alive.add(());
        }
        alive
    }

    /// Forget the cached answer.
    pub fn invalidate(&mut self) {
        self.alive.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arr::ArrError;
    use crate::testing::MockArrClient;

    #[tokio::test(start_paused = true)]
    async fn test_liveness_is_cached() {
        let arr = Arc::new(MockArrClient::new());
        let mut liveness = ArrLiveness::new(arr.clone());
        assert!(liveness.is_alive().await);

        arr.set_reachable(false).await;
        assert!(liveness.is_alive().await);

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(!liveness.is_alive().await);
    }

    #[tokio::test]
    async fn test_http_error_counts_as_alive() {
        let arr = Arc::new(MockArrClient::new());
        arr.set_next_error(ArrError::Http {
            status: 500,
            body: "boom".into(),
        })
        .await;
        let mut liveness = ArrLiveness::new(arr);
        assert!(liveness.is_alive().await);
    }

    #[tokio::test]
    async fn test_no_urls_means_online() {
        let probe = HttpInternetProbe::new(Vec::new(), Duration::from_secs(1)).unwrap();
        assert!(probe.is_online().await);
    }
}
