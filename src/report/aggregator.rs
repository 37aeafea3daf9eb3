use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::info;

use super::risk::{assess, signal_intervals, union_length_ms};
use super::sink::ReportSink;
use super::types::IntegrityReport;
use crate::error::MonitorError;
use crate::kernel::channel::SignalChannel;
use crate::kernel::observation::SessionId;
use crate::kernel::telemetry::event::TelemetryEvent;
use crate::kernel::telemetry::recorder::TelemetryRecorder;
use crate::kernel::time::millis_to_secs;
use crate::registry::{PartitionState, SignalRegistry};
use crate::session::directory::SessionDirectory;

/// Builds each session's report once. Concurrent callers share the
/// in-flight computation; later callers get the cached value.
pub struct ReportAggregator {
    registry: Arc<SignalRegistry>,
    directory: Arc<dyn SessionDirectory>,
    sink: Arc<dyn ReportSink>,
    telemetry: Arc<Mutex<TelemetryRecorder>>,
    reports: Mutex<HashMap<SessionId, Arc<OnceCell<Arc<IntegrityReport>>>>>,
}

impl ReportAggregator {
    pub fn new(
        registry: Arc<SignalRegistry>,
        directory: Arc<dyn SessionDirectory>,
        sink: Arc<dyn ReportSink>,
        telemetry: Arc<Mutex<TelemetryRecorder>>,
    ) -> Self {
        Self {
            registry,
            directory,
            sink,
            telemetry,
            reports: Mutex::new(HashMap::new()),
        }
    }

    /// Generate (or return the already generated) report for an ended session.
    ///
    /// Fails with `SessionNotEnded` while the session manager still reports the
    /// session as live; that failure leaves nothing cached, so a later call retries.
    pub async fn generate(&self, session_id: &str) -> Result<Arc<IntegrityReport>, MonitorError> {
        let cell = {
            let mut reports = self.reports.lock().await;
            match reports.get(session_id).cloned() {
                Some(cell) => cell,
                None => {
                    // Only sessions that were monitored get a slot.
                    if self.directory.status(session_id).await.is_none() {
                        return Err(MonitorError::UnknownSession(session_id.to_string()));
                    }
                    if self.registry.partition(session_id).await.is_none() {
                        return Err(MonitorError::MonitoringNotStarted(session_id.to_string()));
                    }
                    reports.entry(session_id.to_string()).or_default().clone()
                }
            }
        };

        let report = cell.get_or_try_init(|| self.build_and_persist(session_id)).await?;
        Ok(report.clone())
    }

    /// Sessions with a report slot, generated or in flight.
    pub async fn session_count(&self) -> usize {
        self.reports.lock().await.len()
    }

    /// The report, if it has been generated.
    pub async fn cached(&self, session_id: &str) -> Option<Arc<IntegrityReport>> {
        let reports = self.reports.lock().await;
        reports.get(session_id).and_then(|cell| cell.get().cloned())
    }

    async fn build_and_persist(&self, session_id: &str) -> Result<Arc<IntegrityReport>, MonitorError> {
        let status = self
            .directory
            .status(session_id)
            .await
            .ok_or_else(|| MonitorError::UnknownSession(session_id.to_string()))?;
        if !status.is_terminal() {
            return Err(MonitorError::SessionNotEnded(session_id.to_string()));
        }

        let state = self.registry.finalize(session_id).await?;
        let report = Arc::new(build_report(&state));

        self.sink.persist(&report).await?;

        self.telemetry.lock().await.record(TelemetryEvent::ReportGenerated {
            session_id: session_id.to_string(),
            risk: report.risk_level,
        });
        info!(
            session = %session_id,
            risk = ?report.risk_level,
            signals = report.signals.len(),
            percentage = report.signal_percentage,
            "Integrity report generated"
        );

        Ok(report)
    }
}

/// Pure report computation over a finalized partition.
pub fn build_report(state: &PartitionState) -> IntegrityReport {
    let start = state.opened_at;
    let end = state.closed_at.unwrap_or(state.last_activity).max(start);
    let total_ms = end.since(start);

    let signals = state.resolved();

    let mut per_channel_duration: BTreeMap<SignalChannel, f64> =
        SignalChannel::ALL.iter().map(|c| (*c, 0.0)).collect();
    for signal in &signals {
        if let Some(ms) = signal.duration_ms() {
            *per_channel_duration.entry(signal.channel).or_insert(0.0) += millis_to_secs(ms);
        }
    }

    let union_ms = union_length_ms(&signal_intervals(&signals, (start.ms, end.ms)));
    let signal_percentage = if total_ms > 0 {
        (union_ms as f64 / total_ms as f64).min(1.0)
    } else {
        0.0
    };

    let max_severity = signals.iter().map(|s| s.severity).max();
    let risk_level = assess(&signals, signal_percentage);

    IntegrityReport {
        session_id: state.session_id.clone(),
        signals,
        total_duration: millis_to_secs(total_ms),
        per_channel_duration,
        signal_duration: millis_to_secs(union_ms),
        signal_percentage,
        max_severity,
        risk_level,
        generated_at: Utc::now(),
    }
}
