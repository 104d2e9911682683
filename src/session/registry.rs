//! Process-wide session registry
//!
//! One table of active relay sessions, keyed by session id, used for
//! diagnostics and forced cleanup. Sessions register at start and deregister
//! through their single teardown path; the registry never owns session state,
//! it only watches it.

use super::relay::SessionStatus;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Notify};
use tracing::info;

struct SessionEntry {
    started_at: DateTime<Utc>,
    status: watch::Receiver<SessionStatus>,
    close: Arc<Notify>,
}

/// Diagnostic view of one registered session
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: String,
    pub started_at: DateTime<Utc>,
    #[serde(flatten)]
    pub status: SessionStatus,
}

/// Process-scoped table of active sessions.
///
/// Clonable handle; safe for concurrent insert/remove/lookup from arbitrary
/// session lifecycles.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<tokio::sync::RwLock<HashMap<String, SessionEntry>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session and return the signal it should watch for forced
    /// cleanup requests.
    pub async fn register(
        &self,
        id: &str,
        status: watch::Receiver<SessionStatus>,
    ) -> Arc<Notify> {
        let close = Arc::new(Notify::new());
        let entry = SessionEntry {
            started_at: Utc::now(),
            status,
            close: Arc::clone(&close),
        };
        let mut sessions = self.sessions.write().await;
        sessions.insert(id.to_string(), entry);
        info!("Session {} registered ({} active)", id, sessions.len());
        close
    }

    /// Remove a session; harmless if it was never registered
    pub async fn deregister(&self, id: &str) {
        let mut sessions = self.sessions.write().await;
        if sessions.remove(id).is_some() {
            info!("Session {} deregistered ({} active)", id, sessions.len());
        }
    }

    /// Snapshot of all active sessions
    pub async fn list(&self) -> Vec<SessionInfo> {
        let sessions = self.sessions.read().await;
        sessions
            .iter()
            .map(|(id, entry)| SessionInfo {
                id: id.clone(),
                started_at: entry.started_at,
                status: entry.status.borrow().clone(),
            })
            .collect()
    }

    /// Snapshot of one session, if registered
    pub async fn get(&self, id: &str) -> Option<SessionInfo> {
        let sessions = self.sessions.read().await;
        sessions.get(id).map(|entry| SessionInfo {
            id: id.to_string(),
            started_at: entry.started_at,
            status: entry.status.borrow().clone(),
        })
    }

    /// Ask a session to drain and close. Returns whether it was found.
    pub async fn request_close(&self, id: &str) -> bool {
        let sessions = self.sessions.read().await;
        match sessions.get(id) {
            Some(entry) => {
                info!("Forced close requested for session {}", id);
                entry.close.notify_one();
                true
            }
            None => false,
        }
    }

    /// Number of active sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no sessions are active
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
