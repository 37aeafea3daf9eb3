use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::channel::SignalChannel;
use super::time::Timestamp;

pub type SessionId = String;

/// A classified, timestamped fact about one channel of one session.
/// Produced by the external classifiers; never mutated here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub session_id: SessionId,
    pub channel: SignalChannel,
    pub timestamp: Timestamp,
    /// Whether the channel's condition holds at `timestamp`
    /// (e.g. "no face visible" for FaceAbsence).
    pub active: bool,
    #[serde(default)]
    pub magnitude: Option<f64>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Observation {
    pub fn new(session_id: &str, channel: SignalChannel, timestamp: Timestamp, active: bool) -> Self {
        Self {
            session_id: session_id.to_string(),
            channel,
            timestamp,
            active,
            magnitude: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_magnitude(mut self, magnitude: f64) -> Self {
        self.magnitude = Some(magnitude);
        self
    }
}
