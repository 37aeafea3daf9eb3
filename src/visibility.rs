//! Read boundary for integrity data.
//!
//! Candidates get nothing, whatever the registry holds. The check happens
//! here, before any registry access, so every consumer inherits it.

use serde::Serialize;
use std::sync::Arc;

use crate::kernel::channel::SignalChannel;
use crate::kernel::signal::Signal;
use crate::registry::SignalRegistry;
use crate::report::{IntegrityReport, ReportAggregator};

pub const ADVISORY_MARKER: &str = "advisory";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequesterRole {
    Interviewer,
    Candidate,
}

/// A signal as shown to an interviewer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdvisorySignal {
    #[serde(flatten)]
    pub signal: Signal,
    pub marker: &'static str,
    pub explanation: &'static str,
    /// Still ongoing.
    pub live: bool,
}

pub fn explanation(channel: SignalChannel) -> &'static str {
    match channel {
        SignalChannel::FaceAbsence => "The candidate's face was not visible to the camera for a sustained period.",
        SignalChannel::MultiFace => "More than one face was visible in the candidate's video.",
        SignalChannel::GazeDeviation => "The candidate's gaze was directed away from the screen for a sustained period.",
        SignalChannel::UnusualAudio => "Audio patterns other than the candidate's own speech were detected.",
        SignalChannel::TabSwitch => "The interview window lost focus.",
    }
}

#[derive(Clone)]
pub struct VisibilityGate {
    registry: Arc<SignalRegistry>,
    aggregator: Arc<ReportAggregator>,
}

impl VisibilityGate {
    pub fn new(registry: Arc<SignalRegistry>, aggregator: Arc<ReportAggregator>) -> Self {
        Self { registry, aggregator }
    }

    /// Active and resolved signals of the session in `started_at` order,
    /// each marked advisory. Empty for anyone but the interviewer.
    pub async fn read_signals(&self, session_id: &str, role: RequesterRole) -> Vec<AdvisorySignal> {
        if role != RequesterRole::Interviewer {
            return Vec::new();
        }

        let Some(state) = self.registry.snapshot(session_id).await else {
            return Vec::new();
        };

        state
            .history()
            .into_iter()
            .map(|signal| AdvisorySignal {
                marker: ADVISORY_MARKER,
                explanation: explanation(signal.channel),
                live: !signal.resolved,
                signal,
            })
            .collect()
    }

    pub async fn read_report(&self, session_id: &str, role: RequesterRole) -> Option<Arc<IntegrityReport>> {
        if role != RequesterRole::Interviewer {
            return None;
        }
        self.aggregator.cached(session_id).await
    }
}
