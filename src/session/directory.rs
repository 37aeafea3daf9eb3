use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::info;

use super::status::{SessionRequest, SessionStatus, SessionStatusGraph};
use crate::error::MonitorError;
use crate::kernel::observation::SessionId;

/// What the engine needs from the external session manager.
#[async_trait]
pub trait SessionDirectory: Send + Sync {
    async fn status(&self, session_id: &str) -> Option<SessionStatus>;

    /// Whether the candidate agreed to integrity monitoring.
    async fn consent_granted(&self, session_id: &str) -> bool;
}

#[derive(Debug, Clone, Default)]
struct SessionRecord {
    status: SessionStatus,
    consent: bool,
}

/// Session directory kept in memory. Used by the replay driver and tests.
#[derive(Debug, Default)]
pub struct InMemorySessionDirectory {
    sessions: RwLock<HashMap<SessionId, SessionRecord>>,
}

impl InMemorySessionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, session_id: &str, consent: bool) {
        self.sessions.write().await.insert(
            session_id.to_string(),
            SessionRecord {
                status: SessionStatus::Scheduled,
                consent,
            },
        );
    }

    pub async fn set_consent(&self, session_id: &str, consent: bool) -> Result<(), MonitorError> {
        let mut sessions = self.sessions.write().await;
        let record = sessions
            .get_mut(session_id)
            .ok_or_else(|| MonitorError::UnknownSession(session_id.to_string()))?;
        record.consent = consent;
        Ok(())
    }

    /// Apply a status request. Illegal requests leave the status unchanged
    /// and return it.
    pub async fn request(&self, session_id: &str, request: SessionRequest) -> Result<SessionStatus, MonitorError> {
        let mut sessions = self.sessions.write().await;
        let record = sessions
            .get_mut(session_id)
            .ok_or_else(|| MonitorError::UnknownSession(session_id.to_string()))?;

        if let Some(next) = SessionStatusGraph::transition(record.status, request) {
            info!(session = %session_id, from = ?record.status, to = ?next, "Session status changed");
            record.status = next;
        }
        Ok(record.status)
    }
}

#[async_trait]
impl SessionDirectory for InMemorySessionDirectory {
    async fn status(&self, session_id: &str) -> Option<SessionStatus> {
        self.sessions.read().await.get(session_id).map(|r| r.status)
    }

    async fn consent_granted(&self, session_id: &str) -> bool {
        self.sessions.read().await.get(session_id).is_some_and(|r| r.consent)
    }
}
