//! Cached list of known sessions
//!
//! [`SessionDirectory`] is a read-mostly cache over `GET /sessions`. It is
//! never patched: [`SessionDirectory::refresh`] replaces the whole list, and
//! a failed refresh keeps the last list that loaded successfully.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::Result;
use crate::transport::Transport;
use crate::types::Session;

/// Shared cache of session summaries, most recent first
///
/// Clones share the same cache.
#[derive(Debug, Clone)]
pub struct SessionDirectory {
    transport: Arc<dyn Transport>,
    sessions: Arc<RwLock<Vec<Session>>>,
}

impl SessionDirectory {
    /// Create an empty directory backed by `transport`
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            sessions: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Cached sessions, most recent first
    pub async fn list(&self) -> Vec<Session> {
        self.sessions.read().await.clone()
    }

    /// Re-fetch the session list and replace the cache
    ///
    /// # Errors
    ///
    /// Returns the transport error; the cached list is left as it was.
    pub async fn refresh(&self) -> Result<Vec<Session>> {
        let fresh = self.transport.list_sessions().await?;
        tracing::debug!(count = fresh.len(), "Session directory refreshed");

        let mut cache = self.sessions.write().await;
        *cache = fresh.clone();
        Ok(fresh)
    }

    /// Delete a session on the backend, then drop it from the cache
    ///
    /// Removing an id that is already gone succeeds. Resetting the active
    /// conversation when `session_id` was active is the caller's job.
    ///
    /// # Errors
    ///
    /// Returns the transport error; the cached list is left as it was.
    pub async fn remove(&self, session_id: i64) -> Result<()> {
        self.transport.delete_session(session_id).await?;
        self.sessions.write().await.retain(|s| s.id != session_id);
        tracing::info!(session_id, "Session deleted");
        Ok(())
    }
}
