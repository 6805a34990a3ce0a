//! Mock request aggregator for testing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;

use crate::config::ArrKind;
use crate::requests::{
    MediaType, PendingRequest, RequestError, RequestSource, RequestSourceKind,
};

/// Serves canned pending requests and release dates keyed by lookup id.
#[derive(Debug)]
pub struct MockRequestSource {
    kind: RequestSourceKind,
    requests: Arc<RwLock<Vec<PendingRequest>>>,
    release_dates: Arc<RwLock<HashMap<i64, NaiveDate>>>,
    release_date_calls: Arc<RwLock<usize>>,
    next_error: Arc<RwLock<Option<RequestError>>>,
}

impl MockRequestSource {
    pub fn new(kind: RequestSourceKind) -> Self {
        Self {
            kind,
            requests: Arc::new(RwLock::new(Vec::new())),
            release_dates: Arc::new(RwLock::new(HashMap::new())),
            release_date_calls: Arc::new(RwLock::new(0)),
            next_error: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn set_requests(&self, requests: Vec<PendingRequest>) {
        *self.requests.write().await = requests;
    }

    pub async fn set_release_date(&self, lookup_id: i64, date: NaiveDate) {
        self.release_dates.write().await.insert(lookup_id, date);
    }

    pub async fn release_date_calls(&self) -> usize {
        *self.release_date_calls.read().await
    }

    pub async fn set_next_error(&self, error: RequestError) {
        *self.next_error.write().await = Some(error);
    }
}

#[async_trait]
impl RequestSource for MockRequestSource {
    fn kind(&self) -> RequestSourceKind {
        self.kind
    }

    async fn pending_requests(&self, arr: ArrKind) -> Result<Vec<PendingRequest>, RequestError> {
        if let Some(e) = self.next_error.write().await.take() {
            return Err(e);
        }
        let wanted = MediaType::for_arr(arr);
        Ok(self
            .requests
            .read()
            .await
            .iter()
            .filter(|r| r.media_type == wanted)
            .cloned()
            .collect())
    }

    async fn release_date(
        &self,
        request: &PendingRequest,
    ) -> Result<Option<NaiveDate>, RequestError> {
        *self.release_date_calls.write().await += 1;
        let Some(id) = request.lookup_id() else {
            return Ok(None);
        };
        Ok(self.release_dates.read().await.get(&id).copied())
    }
}
