use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::channel::{Severity, SignalChannel};
use super::observation::SessionId;
use super::time::{millis_to_secs, Timestamp};

pub type SignalId = Uuid;

pub const TRUNCATED_KEY: &str = "truncated";

/// A raised (and eventually resolved) instance of a channel's condition.
///
/// `ended_at` is set iff `resolved`; `duration_seconds` is always derived from
/// `ended_at - started_at` in whole milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: SignalId,
    pub session_id: SessionId,
    pub channel: SignalChannel,
    pub severity: Severity,
    pub started_at: Timestamp,
    pub ended_at: Option<Timestamp>,
    pub resolved: bool,
    pub duration_seconds: Option<f64>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Signal {
    pub fn open(session_id: SessionId, channel: SignalChannel, severity: Severity, started_at: Timestamp) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            channel,
            severity,
            started_at,
            ended_at: None,
            resolved: false,
            duration_seconds: None,
            metadata: HashMap::new(),
        }
    }

    /// Close the signal. `ended_at` earlier than `started_at` is clamped.
    pub fn resolve(&mut self, ended_at: Timestamp, truncated: bool) {
        let ended_at = ended_at.max(self.started_at);
        self.ended_at = Some(ended_at);
        self.resolved = true;
        self.duration_seconds = Some(millis_to_secs(ended_at.since(self.started_at)));
        if truncated {
            self.metadata.insert(TRUNCATED_KEY.to_string(), serde_json::Value::Bool(true));
        }
    }

    pub fn duration_ms(&self) -> Option<u64> {
        self.ended_at.map(|end| end.since(self.started_at))
    }

    pub fn is_truncated(&self) -> bool {
        matches!(self.metadata.get(TRUNCATED_KEY), Some(serde_json::Value::Bool(true)))
    }
}

/// What a debouncer tells the registry. The registry owns the signals;
/// the debouncer only reports lifecycle edges.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalTransition {
    Raised(Signal),
    Escalated {
        signal_id: SignalId,
        channel: SignalChannel,
        severity: Severity,
        at: Timestamp,
    },
    Resolved {
        signal_id: SignalId,
        channel: SignalChannel,
        started_at: Timestamp,
        ended_at: Timestamp,
        truncated: bool,
    },
}

impl SignalTransition {
    pub fn channel(&self) -> SignalChannel {
        match self {
            SignalTransition::Raised(signal) => signal.channel,
            SignalTransition::Escalated { channel, .. } => *channel,
            SignalTransition::Resolved { channel, .. } => *channel,
        }
    }

    pub fn signal_id(&self) -> SignalId {
        match self {
            SignalTransition::Raised(signal) => signal.id,
            SignalTransition::Escalated { signal_id, .. } => *signal_id,
            SignalTransition::Resolved { signal_id, .. } => *signal_id,
        }
    }
}
