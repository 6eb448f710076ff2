//! Registry of live import sessions.
//!
//! Sessions live in memory only; each one is keyed by a random UUID handed to
//! the client on upload. Handlers lock a single session at a time.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rolodex_core::error::CoreError;
use rolodex_core::session::ImportSession;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

/// Shared handle to one session.
pub type SessionHandle = Arc<Mutex<ImportSession>>;

/// Thread-safe via interior `RwLock`; wrap in `Arc` and share through
/// `AppState`.
#[derive(Default)]
pub struct SessionManager {
    sessions: RwLock<HashMap<Uuid, SessionHandle>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session and return its id.
    pub async fn insert(&self, session: ImportSession) -> Uuid {
        let id = Uuid::new_v4();
        self.sessions
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(session)));
        id
    }

    pub async fn get(&self, id: Uuid) -> Result<SessionHandle, CoreError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound {
                entity: "Import",
                id: id.to_string(),
            })
    }

    /// Discard a session. A session with a running commit is kept.
    pub async fn remove(&self, id: Uuid) -> Result<(), CoreError> {
        let handle = self.get(id).await?;
        if handle.lock().await.is_committing() {
            return Err(CoreError::Conflict(
                "Cannot discard an import while its commit is running".to_string(),
            ));
        }
        self.sessions.write().await.remove(&id);
        Ok(())
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop sessions idle for at least `max_idle`, except those committing.
    ///
    /// Returns the number of sessions removed.
    pub async fn sweep_idle(&self, max_idle: Duration) -> usize {
        let now = chrono::Utc::now();
        let max_idle = chrono::Duration::from_std(max_idle).unwrap_or(chrono::Duration::MAX);

        let snapshot: Vec<(Uuid, SessionHandle)> = self
            .sessions
            .read()
            .await
            .iter()
            .map(|(id, handle)| (*id, Arc::clone(handle)))
            .collect();

        let mut expired = Vec::new();
        for (id, handle) in snapshot {
            let session = handle.lock().await;
            if !session.is_committing() && now - session.updated_at() >= max_idle {
                expired.push(id);
            }
        }

        if !expired.is_empty() {
            let mut sessions = self.sessions.write().await;
            for id in &expired {
                sessions.remove(id);
            }
        }
        expired.len()
    }
}
