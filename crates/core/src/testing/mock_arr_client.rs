//! Mock content manager for testing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::arr::{
    ArrClient, ArrCommand, ArrError, EpisodeMetadata, MovieMetadata, QueueRecord, SeriesMetadata,
    SeriesRef, SystemStatus,
};

/// A recorded `DELETE /queue/{id}` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueDeletion {
    pub id: i64,
    pub remove_from_client: bool,
    pub blocklist: bool,
}

/// In-memory [`ArrClient`] that records commands and queue deletions.
#[derive(Debug)]
pub struct MockArrClient {
    version: Arc<RwLock<String>>,
    reachable: Arc<RwLock<bool>>,
    queue: Arc<RwLock<Vec<QueueRecord>>>,
    episodes: Arc<RwLock<HashMap<i64, EpisodeMetadata>>>,
    movies: Arc<RwLock<HashMap<i64, MovieMetadata>>>,
    series: Arc<RwLock<HashMap<i64, SeriesMetadata>>>,
    commands: Arc<RwLock<Vec<ArrCommand>>>,
    deletions: Arc<RwLock<Vec<QueueDeletion>>>,
    next_error: Arc<RwLock<Option<ArrError>>>,
}

impl Default for MockArrClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockArrClient {
    pub fn new() -> Self {
        Self {
            version: Arc::new(RwLock::new("4.0.0.0".to_string())),
            reachable: Arc::new(RwLock::new(true)),
            queue: Arc::new(RwLock::new(Vec::new())),
            episodes: Arc::new(RwLock::new(HashMap::new())),
            movies: Arc::new(RwLock::new(HashMap::new())),
            series: Arc::new(RwLock::new(HashMap::new())),
            commands: Arc::new(RwLock::new(Vec::new())),
            deletions: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn set_version(&self, version: &str) {
        *self.version.write().await = version.to_string();
    }

    /// While unreachable every call fails with a connection error.
    pub async fn set_reachable(&self, reachable: bool) {
        *self.reachable.write().await = reachable;
    }

    pub async fn set_queue(&self, records: Vec<QueueRecord>) {
        *self.queue.write().await = records;
    }

    pub async fn add_episode(&self, episode: EpisodeMetadata) {
        self.episodes.write().await.insert(episode.id, episode);
    }

    pub async fn add_movie(&self, movie: MovieMetadata) {
        self.movies.write().await.insert(movie.id, movie);
    }

    pub async fn add_series(&self, series: SeriesMetadata) {
        self.series.write().await.insert(series.id, series);
    }

    pub async fn set_next_error(&self, error: ArrError) {
        *self.next_error.write().await = Some(error);
    }

    pub async fn commands(&self) -> Vec<ArrCommand> {
        self.commands.read().await.clone()
    }

    /// Commands of one name, in posting order.
    pub async fn commands_named(&self, name: &str) -> Vec<ArrCommand> {
        self.commands
            .read()
            .await
            .iter()
            .filter(|c| c.name() == name)
            .cloned()
            .collect()
    }

    pub async fn deletions(&self) -> Vec<QueueDeletion> {
        self.deletions.read().await.clone()
    }

    pub async fn clear_calls(&self) {
        self.commands.write().await.clear();
        self.deletions.write().await.clear();
    }

    async fn check(&self) -> Result<(), ArrError> {
        if !*self.reachable.read().await {
            return Err(ArrError::Connection("mock unreachable".to_string()));
        }
        match self.next_error.write().await.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ArrClient for MockArrClient {
    async fn system_status(&self) -> Result<SystemStatus, ArrError> {
        self.check().await?;
        Ok(SystemStatus {
            version: self.version.read().await.clone(),
            app_name: None,
        })
    }

    async fn get_queue(&self, page: u32, page_size: u32) -> Result<Vec<QueueRecord>, ArrError> {
        self.check().await?;
        let queue = self.queue.read().await;
        let start = (page.saturating_sub(1) * page_size) as usize;
        Ok(queue
            .iter()
            .skip(start)
            .take(page_size as usize)
            .cloned()
            .collect())
    }

    async fn delete_queue(
        &self,
        id: i64,
        remove_from_client: bool,
        blocklist: bool,
    ) -> Result<(), ArrError> {
        self.check().await?;
        let mut queue = self.queue.write().await;
        if !queue.iter().any(|r| r.id == id) {
            return Err(ArrError::NotFound(format!("queue/{}", id)));
        }
        queue.retain(|r| r.id != id);
        self.deletions.write().await.push(QueueDeletion {
            id,
            remove_from_client,
            blocklist,
        });
        Ok(())
    }

    async fn post_command(&self, command: &ArrCommand) -> Result<(), ArrError> {
        self.check().await?;
        self.commands.write().await.push(command.clone());
        Ok(())
    }

    async fn get_episode(&self, id: i64) -> Result<EpisodeMetadata, ArrError> {
        self.check().await?;
        Ok(self
            .episodes
            .read()
            .await
            .get(&id)
            .cloned()
            .unwrap_or(EpisodeMetadata {
                id,
                series_id: None,
                series: SeriesRef::default(),
                quality_cutoff_not_met: false,
            }))
    }

    async fn get_movie(&self, id: i64) -> Result<MovieMetadata, ArrError> {
        self.check().await?;
        self.movies
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| ArrError::NotFound(format!("movie/{}", id)))
    }

    async fn get_series(&self, id: i64) -> Result<SeriesMetadata, ArrError> {
        self.check().await?;
        self.series
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| ArrError::NotFound(format!("series/{}", id)))
    }
}
