use serde::Serialize;
use tracing::{debug, warn};

use super::channel::{ChannelConfig, Severity, SignalChannel};
use super::observation::{Observation, SessionId};
use super::signal::{Signal, SignalId, SignalTransition};
use super::time::Timestamp;
use crate::error::MonitorError;

/// Explicit lifecycle of one channel of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DebounceState {
    /// Condition not observed.
    Idle,
    /// Condition observed, not yet sustained past the activation threshold.
    Pending { since: Timestamp },
    /// Signal raised. `since` is when the condition first appeared.
    Active {
        signal_id: SignalId,
        since: Timestamp,
        last_seen: Timestamp,
        severity: Severity,
    },
    /// Condition went away; waiting out the debounce window before resolving.
    Clearing {
        signal_id: SignalId,
        since: Timestamp,
        since_clear: Timestamp,
        severity: Severity,
    },
}

impl Default for DebounceState {
    fn default() -> Self {
        Self::Idle
    }
}

/// Per (session, channel) state machine turning raw observations into
/// raised/escalated/resolved signal transitions.
///
/// Time only moves forward: an observation older than the last accepted one
/// by more than `lateness_tolerance_ms` is dropped; one within tolerance is
/// evaluated at the last accepted timestamp.
///
/// Severity is escalation-only while a signal is open.
#[derive(Debug)]
pub struct SignalDebouncer {
    session_id: SessionId,
    channel: SignalChannel,
    config: ChannelConfig,
    lateness_tolerance_ms: u64,

    state: DebounceState,
    last_accepted: Option<Timestamp>,
    dropped: u64,
    closed: bool,
}

impl SignalDebouncer {
    pub fn new(session_id: SessionId, channel: SignalChannel, config: ChannelConfig, lateness_tolerance_ms: u64) -> Self {
        Self {
            session_id,
            channel,
            config,
            lateness_tolerance_ms,
            state: DebounceState::Idle,
            last_accepted: None,
            dropped: 0,
            closed: false,
        }
    }

    pub fn state(&self) -> DebounceState {
        self.state
    }

    pub fn channel(&self) -> SignalChannel {
        self.channel
    }

    /// Observations rejected for arriving too late.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Feed one observation. Returns the lifecycle edges it caused, in the
    /// order they must be applied (at most a resolve followed by a raise).
    pub fn observe(&mut self, observation: &Observation) -> Result<Vec<SignalTransition>, MonitorError> {
        if self.closed {
            return Err(MonitorError::MonitoringStopped(self.session_id.clone()));
        }

        let now = match self.last_accepted {
            Some(last) if observation.timestamp < last => {
                if last.since(observation.timestamp) > self.lateness_tolerance_ms {
                    self.dropped += 1;
                    warn!(
                        session = %self.session_id,
                        channel = %self.channel,
                        timestamp = observation.timestamp.ms,
                        last_accepted = last.ms,
                        "Dropping out-of-order observation"
                    );
                    return Err(MonitorError::OutOfOrderObservation {
                        session_id: self.session_id.clone(),
                        channel: self.channel,
                        timestamp: observation.timestamp,
                        last_accepted: last,
                    });
                }
                // Late but tolerated: evaluate at the last accepted instant.
                last
            }
            _ => observation.timestamp,
        };
        self.last_accepted = Some(now);

        Ok(self.step(now, observation.active, observation.magnitude))
    }

    fn step(&mut self, now: Timestamp, active: bool, magnitude: Option<f64>) -> Vec<SignalTransition> {
        use DebounceState::*;

        match (self.state, active) {
            (Idle, false) => Vec::new(),
            (Idle, true) => self.begin(now, magnitude).into_iter().collect(),

            (Pending { since }, true) => {
                if now.since(since) >= self.config.activation_threshold_ms {
                    vec![self.raise(since, now, magnitude)]
                } else {
                    Vec::new()
                }
            }
            (Pending { since }, false) => {
                debug!(channel = %self.channel, blip_ms = now.since(since), "Transient blip discarded");
                self.state = Idle;
                Vec::new()
            }

            (Active { signal_id, since, severity, .. }, true) => {
                self.state = Active { signal_id, since, last_seen: now, severity };
                self.escalate(now, magnitude).into_iter().collect()
            }
            (Active { signal_id, since, severity, .. }, false) => {
                self.state = Clearing { signal_id, since, since_clear: now, severity };
                Vec::new()
            }

            (Clearing { signal_id, since, since_clear, severity }, true) => {
                if now.since(since_clear) < self.config.debounce_window_ms {
                    // Flicker absorbed: same signal, no gap in its duration.
                    self.state = Active { signal_id, since, last_seen: now, severity };
                    self.escalate(now, magnitude).into_iter().collect()
                } else {
                    // The gap was long enough; the old signal ended when the
                    // condition cleared and a new episode begins now.
                    let mut transitions = vec![self.resolved(signal_id, since, since_clear, false)];
                    self.state = Idle;
                    transitions.extend(self.begin(now, magnitude));
                    transitions
                }
            }
            (Clearing { signal_id, since, since_clear, .. }, false) => {
                if now.since(since_clear) >= self.config.debounce_window_ms {
                    self.state = Idle;
                    vec![self.resolved(signal_id, since, since_clear, false)]
                } else {
                    Vec::new()
                }
            }
        }
    }

    /// Start a new episode from `Idle`. A zero threshold raises on the spot.
    fn begin(&mut self, now: Timestamp, magnitude: Option<f64>) -> Option<SignalTransition> {
        if self.config.activation_threshold_ms == 0 {
            Some(self.raise(now, now, magnitude))
        } else {
            self.state = DebounceState::Pending { since: now };
            None
        }
    }

    fn raise(&mut self, since: Timestamp, now: Timestamp, magnitude: Option<f64>) -> SignalTransition {
        let severity = self.config.severity.evaluate(now.since(since), magnitude);
        let signal = Signal::open(self.session_id.clone(), self.channel, severity, since);
        self.state = DebounceState::Active {
            signal_id: signal.id,
            since,
            last_seen: now,
            severity,
        };
        debug!(channel = %self.channel, ?severity, started_at = since.ms, "Signal raised");
        SignalTransition::Raised(signal)
    }

    fn escalate(&mut self, now: Timestamp, magnitude: Option<f64>) -> Option<SignalTransition> {
        if let DebounceState::Active { signal_id, since, last_seen, severity } = self.state {
            let recomputed = self.config.severity.evaluate(now.since(since), magnitude);
            if recomputed > severity {
                self.state = DebounceState::Active { signal_id, since, last_seen, severity: recomputed };
                return Some(SignalTransition::Escalated {
                    signal_id,
                    channel: self.channel,
                    severity: recomputed,
                    at: now,
                });
            }
        }
        None
    }

    fn resolved(&self, signal_id: SignalId, started_at: Timestamp, ended_at: Timestamp, truncated: bool) -> SignalTransition {
        SignalTransition::Resolved {
            signal_id,
            channel: self.channel,
            started_at,
            ended_at,
            truncated,
        }
    }

    /// Close the channel at session end. Open episodes are resolved at `end`
    /// and flagged as truncated; the debouncer rejects everything afterwards.
    ///
    /// A pending episode that already met its threshold is raised and closed
    /// in one go; one that did not is discarded. A clearing episode whose
    /// debounce window had already run out ends where the condition cleared.
    pub fn force_resolve(&mut self, end: Timestamp) -> Vec<SignalTransition> {
        use DebounceState::*;

        self.closed = true;
        let mut transitions = Vec::new();

        match self.state {
            Idle => {}
            Pending { since } => {
                if end.since(since) >= self.config.activation_threshold_ms {
                    let raised = self.raise(since, end, None);
                    let signal_id = raised.signal_id();
                    transitions.push(raised);
                    transitions.push(self.resolved(signal_id, since, end, true));
                }
            }
            Active { signal_id, since, .. } => {
                transitions.push(self.resolved(signal_id, since, end, true));
            }
            Clearing { signal_id, since, since_clear, .. } => {
                if end.since(since_clear) >= self.config.debounce_window_ms {
                    transitions.push(self.resolved(signal_id, since, since_clear, false));
                } else {
                    transitions.push(self.resolved(signal_id, since, end, true));
                }
            }
        }

        self.state = Idle;
        transitions
    }
}
