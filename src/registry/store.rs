use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::error::MonitorError;
use crate::kernel::channel::SignalChannel;
use crate::kernel::observation::SessionId;
use crate::kernel::signal::{Signal, SignalId, SignalTransition};
use crate::kernel::time::Timestamp;

/// Everything the registry knows about one session. Cloned out whole for
/// readers, so a reader never sees a half-applied transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartitionState {
    pub session_id: SessionId,
    /// Insertion order (raise order).
    signals: Vec<Signal>,
    /// Channel -> index into `signals` of its unresolved signal.
    open: HashMap<SignalChannel, usize>,
    pub opened_at: Timestamp,
    pub closed_at: Option<Timestamp>,
    /// Latest accepted observation or transition instant.
    pub last_activity: Timestamp,
    pub fault: Option<String>,
}

impl PartitionState {
    fn new(session_id: SessionId, opened_at: Timestamp) -> Self {
        Self {
            session_id,
            signals: Vec::new(),
            open: HashMap::new(),
            opened_at,
            closed_at: None,
            last_activity: opened_at,
            fault: None,
        }
    }

    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    pub fn active(&self) -> Vec<Signal> {
        let mut active: Vec<Signal> = self.open.values().filter_map(|&i| self.signals.get(i).cloned()).collect();
        active.sort_by_key(|s| s.channel);
        active
    }

    /// All signals, ordered by `started_at` (raise order breaks ties).
    pub fn history(&self) -> Vec<Signal> {
        let mut history = self.signals.clone();
        history.sort_by_key(|s| s.started_at);
        history
    }

    pub fn resolved(&self) -> Vec<Signal> {
        self.history().into_iter().filter(|s| s.resolved).collect()
    }

    pub fn is_faulted(&self) -> bool {
        self.fault.is_some()
    }

    fn apply(&mut self, transition: SignalTransition) -> Result<(), String> {
        match transition {
            SignalTransition::Raised(signal) => {
                if signal.session_id != self.session_id {
                    return Err(format!("signal {} belongs to session {}", signal.id, signal.session_id));
                }
                if signal.resolved {
                    return Err(format!("signal {} raised already resolved", signal.id));
                }
                if let Some(&existing) = self.open.get(&signal.channel) {
                    let existing_id = self.signals.get(existing).map(|s| s.id.to_string()).unwrap_or_default();
                    return Err(format!(
                        "channel {} already has unresolved signal {}; refusing {}",
                        signal.channel, existing_id, signal.id
                    ));
                }
                self.last_activity = self.last_activity.max(signal.started_at);
                self.open.insert(signal.channel, self.signals.len());
                self.signals.push(signal);
            }
            SignalTransition::Escalated { signal_id, channel, severity, at } => {
                let idx = self.open_index(channel, signal_id)?;
                let signal = &mut self.signals[idx];
                signal.severity = signal.severity.max(severity);
                self.last_activity = self.last_activity.max(at);
            }
            SignalTransition::Resolved { signal_id, channel, ended_at, truncated, .. } => {
                let idx = self.open_index(channel, signal_id)?;
                self.open.remove(&channel);
                self.signals[idx].resolve(ended_at, truncated);
                self.last_activity = self.last_activity.max(ended_at);
            }
        }
        Ok(())
    }

    fn open_index(&self, channel: SignalChannel, signal_id: SignalId) -> Result<usize, String> {
        match self.open.get(&channel) {
            Some(&idx) if self.signals.get(idx).is_some_and(|s| s.id == signal_id) => Ok(idx),
            Some(&idx) => Err(format!(
                "channel {} has unresolved signal {:?}, transition names {}",
                channel,
                self.signals.get(idx).map(|s| s.id),
                signal_id
            )),
            None => Err(format!("channel {} has no unresolved signal, transition names {}", channel, signal_id)),
        }
    }

    /// Close every still-open signal at `ended_at`, flagged truncated.
    fn force_resolve_open(&mut self, ended_at: Timestamp) -> Vec<SignalId> {
        let mut closed = Vec::new();
        for (_, idx) in self.open.drain() {
            if let Some(signal) = self.signals.get_mut(idx) {
                signal.resolve(ended_at, true);
                closed.push(signal.id);
            }
        }
        closed
    }
}

/// One session's slice of the registry. Its write lock is the session's
/// exclusive-access token: every mutation for the session goes through it.
#[derive(Debug)]
pub struct Partition {
    state: RwLock<PartitionState>,
}

impl Partition {
    pub async fn snapshot(&self) -> PartitionState {
        self.state.read().await.clone()
    }
}

#[derive(Debug, Default)]
pub struct SignalRegistry {
    partitions: RwLock<HashMap<SessionId, Arc<Partition>>>,
}

impl SignalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the session's partition. Opening an existing one is a no-op.
    pub async fn open_partition(&self, session_id: &str, at: Timestamp) -> Arc<Partition> {
        let mut partitions = self.partitions.write().await;
        partitions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                info!(session = %session_id, "Registry partition opened");
                Arc::new(Partition {
                    state: RwLock::new(PartitionState::new(session_id.to_string(), at)),
                })
            })
            .clone()
    }

    pub async fn partition(&self, session_id: &str) -> Option<Arc<Partition>> {
        self.partitions.read().await.get(session_id).cloned()
    }

    async fn require(&self, session_id: &str) -> Result<Arc<Partition>, MonitorError> {
        self.partition(session_id)
            .await
            .ok_or_else(|| MonitorError::MonitoringNotStarted(session_id.to_string()))
    }

    /// Apply one transition under the session's write lock.
    ///
    /// Invariant: at most one unresolved signal per channel. A transition that
    /// would break it faults the partition; later writes for the session are
    /// rejected while reads keep serving the last consistent state.
    pub async fn apply(&self, session_id: &str, transition: SignalTransition) -> Result<(), MonitorError> {
        let partition = self.require(session_id).await?;
        let mut state = partition.state.write().await;

        if let Some(fault) = &state.fault {
            return Err(MonitorError::RegistryInvariantViolation {
                session_id: session_id.to_string(),
                detail: format!("partition faulted earlier: {}", fault),
            });
        }
        // Closed by stop or by an early report; the window is frozen.
        if state.closed_at.is_some() {
            return Err(MonitorError::MonitoringStopped(session_id.to_string()));
        }

        let described = format!("{:?}", transition);
        if let Err(detail) = state.apply(transition) {
            state.fault = Some(detail.clone());
            error!(
                session = %session_id,
                transition = %described,
                state = ?*state,
                "Registry invariant violated; integrity monitoring degraded for this session"
            );
            return Err(MonitorError::RegistryInvariantViolation {
                session_id: session_id.to_string(),
                detail,
            });
        }

        debug!(session = %session_id, transition = %described, "Transition applied");
        Ok(())
    }

    /// Record that an observation at `at` was accepted for the session, so a
    /// window closed without an explicit stop ends at the last thing seen.
    pub async fn touch(&self, session_id: &str, at: Timestamp) {
        let Some(partition) = self.partition(session_id).await else {
            return;
        };
        let mut state = partition.state.write().await;
        if state.closed_at.is_none() {
            state.last_activity = state.last_activity.max(at);
        }
    }

    pub async fn get_active(&self, session_id: &str) -> Vec<Signal> {
        match self.partition(session_id).await {
            Some(p) => p.state.read().await.active(),
            None => Vec::new(),
        }
    }

    pub async fn get_history(&self, session_id: &str) -> Vec<Signal> {
        match self.partition(session_id).await {
            Some(p) => p.state.read().await.history(),
            None => Vec::new(),
        }
    }

    pub async fn snapshot(&self, session_id: &str) -> Option<PartitionState> {
        match self.partition(session_id).await {
            Some(p) => Some(p.snapshot().await),
            None => None,
        }
    }

    /// Mark the monitoring window closed. The first close wins.
    pub async fn close(&self, session_id: &str, at: Timestamp) -> Result<(), MonitorError> {
        let partition = self.require(session_id).await?;
        let mut state = partition.state.write().await;
        if state.closed_at.is_none() {
            state.closed_at = Some(at.max(state.opened_at));
        }
        Ok(())
    }

    /// Resolve anything left open and return the final snapshot. The monitoring
    /// window is closed at `closed_at`, or at the latest activity if it was never closed.
    pub async fn finalize(&self, session_id: &str) -> Result<PartitionState, MonitorError> {
        let partition = self.require(session_id).await?;
        let mut state = partition.state.write().await;

        let end = match state.closed_at {
            Some(end) => end,
            None => {
                let end = state.last_activity;
                state.closed_at = Some(end);
                end
            }
        };

        let forced = state.force_resolve_open(end);
        if !forced.is_empty() {
            info!(session = %session_id, count = forced.len(), "Force-resolved open signals at report time");
        }

        Ok(state.clone())
    }

    /// Drop the session's partition once its report is persisted.
    pub async fn release(&self, session_id: &str) -> Option<PartitionState> {
        let partition = self.partitions.write().await.remove(session_id)?;
        let state = partition.state.read().await.clone();
        Some(state)
    }

    pub async fn session_count(&self) -> usize {
        self.partitions.read().await.len()
    }
}
