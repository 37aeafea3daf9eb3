//! Error taxonomy for the integrity engine.

use thiserror::Error;

use crate::kernel::channel::SignalChannel;
use crate::kernel::observation::SessionId;
use crate::kernel::time::Timestamp;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MonitorError {
    /// Dropped and counted; never fatal.
    #[error("out-of-order observation for {session_id}/{channel}: {timestamp:?} is older than {last_accepted:?} beyond tolerance")]
    OutOfOrderObservation {
        session_id: SessionId,
        channel: SignalChannel,
        timestamp: Timestamp,
        last_accepted: Timestamp,
    },

    #[error("monitoring not started for session {0}")]
    MonitoringNotStarted(SessionId),

    #[error("monitoring stopped for session {0}")]
    MonitoringStopped(SessionId),

    /// Retryable once the session has actually ended.
    #[error("session {0} has not ended")]
    SessionNotEnded(SessionId),

    /// Internal defect. Fatal to the session's monitoring context only.
    #[error("registry invariant violated for session {session_id}: {detail}")]
    RegistryInvariantViolation { session_id: SessionId, detail: String },

    #[error("consent not granted for session {0}")]
    ConsentNotGranted(SessionId),

    #[error("unknown session {0}")]
    UnknownSession(SessionId),

    #[error("persistence failed: {0}")]
    Persistence(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl MonitorError {
    /// Observation-level errors are swallowed by ingestion; everything else
    /// is surfaced to the caller.
    pub fn is_observation_level(&self) -> bool {
        matches!(
            self,
            MonitorError::OutOfOrderObservation { .. }
                | MonitorError::MonitoringStopped(_)
                | MonitorError::MonitoringNotStarted(_)
                | MonitorError::RegistryInvariantViolation { .. }
        )
    }
}
