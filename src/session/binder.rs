use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::directory::SessionDirectory;
use super::status::SessionStatus;
use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::kernel::channel::SignalChannel;
use crate::kernel::debouncer::SignalDebouncer;
use crate::kernel::observation::{Observation, SessionId};
use crate::kernel::signal::SignalTransition;
use crate::kernel::telemetry::event::{DropReason, TelemetryEvent};
use crate::kernel::telemetry::metrics::TelemetrySnapshot;
use crate::kernel::telemetry::recorder::TelemetryRecorder;
use crate::kernel::time::Timestamp;
use crate::registry::SignalRegistry;
use crate::report::{IntegrityReport, ReportAggregator, ReportSink};
use crate::visibility::VisibilityGate;

/// Live monitoring state of one session: five independent channel state
/// machines plus a stop token.
struct MonitoringContext {
    session_id: SessionId,
    started_at: Timestamp,
    /// Set once by the first stop; every later stop reuses it.
    stopped_at: OnceLock<Timestamp>,
    stop: CancellationToken,
    faulted: AtomicBool,
    channels: HashMap<SignalChannel, Mutex<SignalDebouncer>>,
}

impl MonitoringContext {
    fn new(session_id: &str, started_at: Timestamp, config: &MonitorConfig) -> Self {
        let channels = SignalChannel::ALL
            .iter()
            .map(|&channel| {
                let debouncer = SignalDebouncer::new(
                    session_id.to_string(),
                    channel,
                    config.channel(channel),
                    config.lateness_tolerance_ms,
                );
                (channel, Mutex::new(debouncer))
            })
            .collect();

        Self {
            session_id: session_id.to_string(),
            started_at,
            stopped_at: OnceLock::new(),
            stop: CancellationToken::new(),
            faulted: AtomicBool::new(false),
            channels,
        }
    }

    fn channel(&self, channel: SignalChannel) -> Result<&Mutex<SignalDebouncer>, MonitorError> {
        self.channels
            .get(&channel)
            .ok_or_else(|| MonitorError::Config(format!("no debouncer for channel {}", channel)))
    }
}

/// Starts and stops integrity monitoring in step with the session manager,
/// and routes observations to the right channel state machine.
///
/// Sessions are independent. Within a session each channel has its own lock,
/// so channels progress concurrently; registry writes for the session are
/// serialized by the registry partition.
pub struct SessionLifecycleBinder {
    config: Arc<MonitorConfig>,
    registry: Arc<SignalRegistry>,
    directory: Arc<dyn SessionDirectory>,
    aggregator: Arc<ReportAggregator>,
    telemetry: Arc<Mutex<TelemetryRecorder>>,
    contexts: RwLock<HashMap<SessionId, Arc<MonitoringContext>>>,
}

impl SessionLifecycleBinder {
    pub fn new(config: MonitorConfig, directory: Arc<dyn SessionDirectory>, sink: Arc<dyn ReportSink>) -> Self {
        let registry = Arc::new(SignalRegistry::new());
        let telemetry = Arc::new(Mutex::new(TelemetryRecorder::new()));
        let aggregator = Arc::new(ReportAggregator::new(
            registry.clone(),
            directory.clone(),
            sink,
            telemetry.clone(),
        ));

        Self {
            config: Arc::new(config),
            registry,
            directory,
            aggregator,
            telemetry,
            contexts: RwLock::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> Arc<SignalRegistry> {
        self.registry.clone()
    }

    pub fn aggregator(&self) -> Arc<ReportAggregator> {
        self.aggregator.clone()
    }

    /// The only read path to signals and reports for client-facing code.
    pub fn gate(&self) -> VisibilityGate {
        VisibilityGate::new(self.registry.clone(), self.aggregator.clone())
    }

    pub async fn telemetry(&self) -> TelemetrySnapshot {
        self.telemetry.lock().await.snapshot()
    }

    pub async fn is_monitoring(&self, session_id: &str) -> bool {
        self.contexts
            .read()
            .await
            .get(session_id)
            .is_some_and(|ctx| !ctx.stop.is_cancelled())
    }

    /// Allocate the session's channel state machines and registry partition.
    /// Calling it again for a live session is a no-op.
    pub async fn start_monitoring(&self, session_id: &str, at: Timestamp) -> Result<(), MonitorError> {
        let status = self
            .directory
            .status(session_id)
            .await
            .ok_or_else(|| MonitorError::UnknownSession(session_id.to_string()))?;
        if status.is_terminal() {
            return Err(MonitorError::MonitoringStopped(session_id.to_string()));
        }
        if !self.directory.consent_granted(session_id).await {
            warn!(session = %session_id, "Monitoring refused: no consent");
            return Err(MonitorError::ConsentNotGranted(session_id.to_string()));
        }

        let mut contexts = self.contexts.write().await;
        if let Some(existing) = contexts.get(session_id) {
            if existing.stop.is_cancelled() {
                return Err(MonitorError::MonitoringStopped(session_id.to_string()));
            }
            debug!(session = %session_id, "Monitoring already started");
            return Ok(());
        }

        let context = Arc::new(MonitoringContext::new(session_id, at, &self.config));
        contexts.insert(session_id.to_string(), context);
        self.registry.open_partition(session_id, at).await;
        drop(contexts);

        self.record(TelemetryEvent::MonitoringStarted {
            session_id: session_id.to_string(),
        })
        .await;
        info!(session = %session_id, at = at.ms, "Integrity monitoring started");
        Ok(())
    }

    /// Route one observation through its channel's state machine and apply
    /// the resulting transitions, in order, to the registry.
    pub async fn observe(&self, observation: Observation) -> Result<Vec<SignalTransition>, MonitorError> {
        let session_id = observation.session_id.as_str();

        let context = self.contexts.read().await.get(session_id).cloned();
        let Some(context) = context else {
            self.drop_observation(&observation, DropReason::NotStarted).await;
            return Err(MonitorError::MonitoringNotStarted(session_id.to_string()));
        };

        if context.stop.is_cancelled() {
            self.drop_observation(&observation, DropReason::AfterStop).await;
            return Err(MonitorError::MonitoringStopped(session_id.to_string()));
        }
        if context.faulted.load(Ordering::Acquire) {
            self.drop_observation(&observation, DropReason::Faulted).await;
            return Err(MonitorError::RegistryInvariantViolation {
                session_id: session_id.to_string(),
                detail: "monitoring context faulted earlier".to_string(),
            });
        }

        // Held until the registry write lands, so a channel's transitions
        // reach the registry in the order they were produced.
        let mut debouncer = context.channel(observation.channel)?.lock().await;

        let transitions = match debouncer.observe(&observation) {
            Ok(transitions) => transitions,
            Err(e) => {
                let reason = match e {
                    MonitorError::MonitoringStopped(_) => DropReason::AfterStop,
                    _ => DropReason::OutOfOrder,
                };
                self.drop_observation(&observation, reason).await;
                return Err(e);
            }
        };

        // Accepted observations extend the monitoring window even when
        // nothing changes state.
        self.registry.touch(session_id, observation.timestamp).await;

        for transition in &transitions {
            self.commit(&context, transition.clone()).await?;
        }
        Ok(transitions)
    }

    /// Fire-and-forget ingestion for the observation source. Failures are
    /// logged and counted, never returned.
    pub async fn ingest(&self, observation: Observation) {
        let session_id = observation.session_id.clone();
        let channel = observation.channel;
        if let Err(e) = self.observe(observation).await {
            if e.is_observation_level() {
                debug!(session = %session_id, %channel, error = %e, "Observation not applied");
            } else {
                warn!(session = %session_id, %channel, error = %e, "Observation failed");
            }
        }
    }

    /// Close every channel, force-resolving open signals, then generate the
    /// report. The first stop's `at` ends the window for every caller.
    /// Observations racing with this call are rejected.
    pub async fn stop_monitoring(&self, session_id: &str, at: Timestamp) -> Result<Arc<IntegrityReport>, MonitorError> {
        let context = self
            .contexts
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| MonitorError::MonitoringNotStarted(session_id.to_string()))?;

        let mut first_stop = false;
        let at = *context.stopped_at.get_or_init(|| {
            first_stop = true;
            at
        });
        context.stop.cancel();

        for channel in SignalChannel::ALL {
            let mut debouncer = context.channel(channel)?.lock().await;
            if debouncer.is_closed() {
                continue;
            }
            for transition in debouncer.force_resolve(at) {
                if let Err(e) = self.commit(&context, transition).await {
                    warn!(session = %session_id, %channel, error = %e, "Force-resolve not applied");
                }
            }
        }

        self.registry.close(session_id, at).await?;

        if first_stop {
            self.record(TelemetryEvent::MonitoringStopped {
                session_id: session_id.to_string(),
                duration_ms: at.since(context.started_at),
            })
            .await;
            info!(session = %session_id, at = at.ms, "Integrity monitoring stopped");
        }

        self.aggregator.generate(session_id).await
    }

    /// Session manager hook. Ended or cancelled sessions stop monitoring;
    /// sessions that were never monitored have nothing to report.
    pub async fn on_session_status(
        &self,
        session_id: &str,
        status: SessionStatus,
        at: Timestamp,
    ) -> Result<Option<Arc<IntegrityReport>>, MonitorError> {
        if !status.is_terminal() {
            return Ok(None);
        }
        if !self.contexts.read().await.contains_key(session_id) {
            debug!(session = %session_id, ?status, "Session closed without monitoring");
            return Ok(None);
        }
        self.stop_monitoring(session_id, at).await.map(Some)
    }

    /// Forget a stopped session's live state once its report is stored.
    /// The cached report stays available through the gate.
    pub async fn release(&self, session_id: &str) -> Result<(), MonitorError> {
        let mut contexts = self.contexts.write().await;
        match contexts.get(session_id) {
            None => return Err(MonitorError::MonitoringNotStarted(session_id.to_string())),
            Some(ctx) if !ctx.stop.is_cancelled() => {
                return Err(MonitorError::SessionNotEnded(session_id.to_string()))
            }
            Some(_) => {}
        }
        contexts.remove(session_id);
        drop(contexts);
        self.registry.release(session_id).await;
        Ok(())
    }

    async fn commit(&self, context: &MonitoringContext, transition: SignalTransition) -> Result<(), MonitorError> {
        let session_id = context.session_id.as_str();
        let event = telemetry_for(session_id, &transition);

        if let Err(e) = self.registry.apply(session_id, transition).await {
            if matches!(e, MonitorError::RegistryInvariantViolation { .. })
                && !context.faulted.swap(true, Ordering::AcqRel)
            {
                self.record(TelemetryEvent::ContextFaulted {
                    session_id: session_id.to_string(),
                })
                .await;
            }
            return Err(e);
        }

        self.record(event).await;
        Ok(())
    }

    async fn drop_observation(&self, observation: &Observation, reason: DropReason) {
        self.record(TelemetryEvent::ObservationDropped {
            session_id: observation.session_id.clone(),
            channel: observation.channel,
            reason,
        })
        .await;
    }

    async fn record(&self, event: TelemetryEvent) {
        self.telemetry.lock().await.record(event);
    }
}

fn telemetry_for(session_id: &str, transition: &SignalTransition) -> TelemetryEvent {
    let session_id = session_id.to_string();
    match transition {
        SignalTransition::Raised(signal) => TelemetryEvent::SignalRaised {
            session_id,
            channel: signal.channel,
            severity: signal.severity,
        },
        SignalTransition::Escalated { channel, severity, .. } => TelemetryEvent::SignalEscalated {
            session_id,
            channel: *channel,
            severity: *severity,
        },
        SignalTransition::Resolved { channel, started_at, ended_at, truncated, .. } => TelemetryEvent::SignalResolved {
            session_id,
            channel: *channel,
            duration_ms: ended_at.since(*started_at),
            truncated: *truncated,
        },
    }
}
