use serde::{Deserialize, Serialize};

use crate::kernel::channel::{Severity, SignalChannel};
use crate::kernel::observation::SessionId;
use crate::report::types::RiskLevel;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TelemetryEvent {
    MonitoringStarted {
        session_id: SessionId,
    },

    MonitoringStopped {
        session_id: SessionId,
        duration_ms: u64,
    },

    ObservationDropped {
        session_id: SessionId,
        channel: SignalChannel,
        reason: DropReason,
    },

    SignalRaised {
        session_id: SessionId,
        channel: SignalChannel,
        severity: Severity,
    },

    SignalEscalated {
        session_id: SessionId,
        channel: SignalChannel,
        severity: Severity,
    },

    SignalResolved {
        session_id: SessionId,
        channel: SignalChannel,
        duration_ms: u64,
        truncated: bool,
    },

    ReportGenerated {
        session_id: SessionId,
        risk: RiskLevel,
    },

    /// Registry invariant broke; the session continues without integrity tracking.
    ContextFaulted {
        session_id: SessionId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropReason {
    OutOfOrder,
    AfterStop,
    NotStarted,
    Faulted,
}
