use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use switchyard_web::BoxError;
use tokio::task::JoinHandle;
use tracing::debug;

/// Persists encoded session data by token.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The data stored under `token`, or `None` if it is unknown or expired.
    async fn find(&self, token: &str) -> Result<Option<Vec<u8>>, BoxError>;

    /// Stores `data` under `token` until `expiry`, replacing any previous data.
    async fn commit(&self, token: &str, data: Vec<u8>, expiry: DateTime<Utc>) -> Result<(), BoxError>;

    async fn delete(&self, token: &str) -> Result<(), BoxError>;
}

#[derive(Debug, Clone)]
struct Entry {
    data: Vec<u8>,
    expiry: DateTime<Utc>,
}

/// In-process [`SessionStore`]. Expired entries are dropped lazily on lookup and by
/// [`MemoryStore::cleanup`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every expired entry.
    pub fn cleanup(&self) {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expiry > now);
        debug!(removed = before.saturating_sub(self.entries.len()), "expired sessions removed");
    }

    /// Runs [`cleanup`](Self::cleanup) every `period` on a background task.
    pub fn spawn_cleanup(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                store.cleanup();
            }
        })
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn find(&self, token: &str) -> Result<Option<Vec<u8>>, BoxError> {
        let now = Utc::now();
        match self.entries.get(token) {
            Some(entry) if entry.expiry > now => return Ok(Some(entry.data.clone())),
            Some(_) => {}
            None => return Ok(None),
        }
        self.entries.remove_if(token, |_, entry| entry.expiry <= now);
        Ok(None)
    }

    async fn commit(&self, token: &str, data: Vec<u8>, expiry: DateTime<Utc>) -> Result<(), BoxError> {
        self.entries.insert(token.to_owned(), Entry { data, expiry });
        Ok(())
    }

    async fn delete(&self, token: &str) -> Result<(), BoxError> {
        self.entries.remove(token);
        Ok(())
    }
}

#[async_trait]
impl<S: SessionStore + ?Sized> SessionStore for Arc<S> {
    async fn find(&self, token: &str) -> Result<Option<Vec<u8>>, BoxError> {
        (**self).find(token).await
    }

    async fn commit(&self, token: &str, data: Vec<u8>, expiry: DateTime<Utc>) -> Result<(), BoxError> {
        (**self).commit(token, data, expiry).await
    }

    async fn delete(&self, token: &str) -> Result<(), BoxError> {
        (**self).delete(token).await
    }
}
