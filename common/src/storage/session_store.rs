use std::{
    collections::HashMap,
    sync::Arc,
    time::Duration,
};

use tokio::{sync::RwLock, time::Instant};
use tracing::debug;

use crate::{
    error::AppError,
    utils::{
        config::AppConfig,
        ingest_limits::{validate_session_documents, IngestBounds},
    },
};

#[derive(Clone)]
struct SessionEntry {
    documents: Arc<Vec<String>>,
    last_access: Instant,
}

/// Per-session raw document texts, isolated by session identifier.
///
/// Entries idle for longer than `ttl` are treated as absent and are purged on
/// the next write. When `max_sessions` is reached the least recently used
/// session is evicted.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionEntry>>>,
    ttl: Duration,
    max_sessions: usize,
    bounds: IngestBounds,
}

impl SessionStore {
    pub fn new(ttl: Duration, max_sessions: usize, bounds: IngestBounds) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl,
            max_sessions: max_sessions.max(1),
            bounds,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        Ok(Self::new(
            Duration::from_secs(config.session_ttl_secs),
            config.session_max_entries,
            IngestBounds::from_config(config)?,
        ))
    }

    /// Replaces the documents stored for `session_id`.
    pub async fn replace(&self, session_id: &str, documents: Vec<String>) -> Result<(), AppError> {
        validate_session_documents(documents.len(), self.bounds)?;

        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, entry| !self.is_expired(entry, now));

        if !sessions.contains_key(session_id) && sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, entry)| entry.last_access)
                .map(|(id, _)| id.clone());
            if let Some(oldest) = oldest {
                debug!(session_id = %oldest, "evicting least recently used session");
                sessions.remove(&oldest);
            }
        }

        debug!(
            session_id,
            document_count = documents.len(),
            "storing session documents"
        );
        sessions.insert(
            session_id.to_owned(),
            SessionEntry {
                documents: Arc::new(documents),
                last_access: now,
            },
        );
        Ok(())
    }

    /// Returns the live documents for `session_id` and refreshes its access time.
    pub async fn documents(&self, session_id: &str) -> Option<Arc<Vec<String>>> {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        if self.is_expired(sessions.get(session_id)?, now) {
            sessions.remove(session_id);
            return None;
        }
        let entry = sessions.get_mut(session_id)?;
        entry.last_access = now;
        Some(Arc::clone(&entry.documents))
    }

    /// Number of sessions that have not yet expired.
    pub async fn active_count(&self) -> usize {
        let now = Instant::now();
        self.sessions
            .read()
            .await
            .values()
            .filter(|entry| !self.is_expired(entry, now))
            .count()
    }

    fn is_expired(&self, entry: &SessionEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.last_access) > self.ttl
    }
}
