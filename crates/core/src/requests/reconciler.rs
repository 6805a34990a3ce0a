//! Turns pending requests into the id set used to flag request-driven entries.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, warn};

use super::{MediaType, RequestError, RequestIds, RequestSource, RequestSourceKind};
use crate::config::ArrKind;

/// Pulls requests from one source and caches release dates across passes.
pub struct RequestReconciler {
    source: Arc<dyn RequestSource>,
    kind: ArrKind,
    release_cache: HashMap<(MediaType, i64), NaiveDate>,
}

impl RequestReconciler {
    pub fn new(source: Arc<dyn RequestSource>, kind: ArrKind) -> Self {
        Self {
            source,
            kind,
            release_cache: HashMap::new(),
        }
    }

    pub fn source_kind(&self) -> RequestSourceKind {
        self.source.kind()
    }

    /// Ids of every released, approved request.
    ///
    /// A missing release date counts as today. A failed date lookup is logged
    /// and the request kept; only a date strictly after today skips it.
    pub async fn collect_ids(&mut self, now: DateTime<Utc>) -> Result<RequestIds, RequestError> {
        let requests = self.source.pending_requests(self.kind).await?;
        let today = now.date_naive();
        let mut ids = RequestIds::default();

        for request in &requests {
            if let Some(lookup_id) = request.lookup_id() {
                let key = (request.media_type, lookup_id);
                let released = match self.release_cache.get(&key) {
                    Some(date) => *date <= today,
                    None => match self.source.release_date(request).await {
                        Ok(date) => {
                            let date = date.unwrap_or(today);
                            if date > today {
                                debug!(id = lookup_id, %date, "Skipping unreleased request");
                                false
                            } else {
                                self.release_cache.insert(key, date);
                                true
                            }
                        }
                        Err(e) => {
                            warn!(
                                source = self.source.kind().as_str(),
                                id = lookup_id,
                                error = %e,
                                "Failed to query release date"
                            );
                            true
                        }
                    },
                };
                if !released {
                    continue;
                }
            }
            ids.collect(self.kind, request);
        }

        debug!(
            source = self.source.kind().as_str(),
            requests = requests.len(),
            ids = ids.len(),
            "Collected request ids"
        );
        Ok(ids)
    }

    pub fn cached_release_dates(&self) -> usize {
        self.release_cache.len()
    }
}
