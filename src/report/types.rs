use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::kernel::channel::{Severity, SignalChannel};
use crate::kernel::observation::SessionId;
use crate::kernel::signal::Signal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Immutable summary of one ended session. Advisory only: it informs the
/// interviewer and never decides an outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub session_id: SessionId,
    /// Resolved signals ordered by `started_at`.
    pub signals: Vec<Signal>,
    /// Length of the monitoring window (seconds).
    pub total_duration: f64,
    /// Summed signal durations per channel (seconds). Every channel is present.
    pub per_channel_duration: BTreeMap<SignalChannel, f64>,
    /// Wall-clock time covered by at least one signal (seconds).
    pub signal_duration: f64,
    /// `signal_duration / total_duration`, within [0, 1].
    pub signal_percentage: f64,
    pub max_severity: Option<Severity>,
    pub risk_level: RiskLevel,
    pub generated_at: DateTime<Utc>,
}

impl IntegrityReport {
    pub fn signal_count(&self, channel: SignalChannel) -> usize {
        self.signals.iter().filter(|s| s.channel == channel).count()
    }

    /// Rows for the external signals table, keyed by (session, channel, started_at).
    pub fn signal_rows(&self) -> Vec<SignalRow> {
        self.signals.iter().map(SignalRow::from).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRow {
    pub session_id: SessionId,
    pub channel: SignalChannel,
    pub started_at_ms: u64,
    pub severity: Severity,
    pub resolved: bool,
    pub duration_seconds: Option<f64>,
    pub truncated: bool,
}

impl From<&Signal> for SignalRow {
    fn from(signal: &Signal) -> Self {
        Self {
            session_id: signal.session_id.clone(),
            channel: signal.channel,
            started_at_ms: signal.started_at.ms,
            severity: signal.severity,
            resolved: signal.resolved,
            duration_seconds: signal.duration_seconds,
            truncated: signal.is_truncated(),
        }
    }
}
