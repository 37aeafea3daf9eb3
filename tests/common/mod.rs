#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use vigil::report::{IntegrityReport, ReportSink};
use vigil::session::{InMemorySessionDirectory, SessionRequest};
use vigil::{MonitorConfig, MonitorError, Observation, SessionLifecycleBinder, SignalChannel, Timestamp};

/// Sink that remembers every write. An optional delay widens race windows.
#[derive(Default)]
pub struct RecordingSink {
    pub writes: AtomicUsize,
    pub reports: Mutex<Vec<IntegrityReport>>,
    pub delay: Option<Duration>,
}

impl RecordingSink {
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReportSink for RecordingSink {
    async fn persist(&self, report: &IntegrityReport) -> Result<(), MonitorError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.reports.lock().await.push(report.clone());
        Ok(())
    }
}

pub struct Harness {
    pub binder: SessionLifecycleBinder,
    pub directory: Arc<InMemorySessionDirectory>,
    pub sink: Arc<RecordingSink>,
}

pub fn harness_with(sink: RecordingSink) -> Harness {
    let directory = Arc::new(InMemorySessionDirectory::new());
    let sink = Arc::new(sink);
    let binder = SessionLifecycleBinder::new(MonitorConfig::default(), directory.clone(), sink.clone());
    Harness { binder, directory, sink }
}

pub fn harness() -> Harness {
    harness_with(RecordingSink::default())
}

impl Harness {
    /// Register a consenting session, move it to Active and start monitoring at t=0.
    pub async fn live_session(&self, session_id: &str) {
        self.directory.register(session_id, true).await;
        self.directory.request(session_id, SessionRequest::OpenLobby).await.unwrap();
        self.directory.request(session_id, SessionRequest::Begin).await.unwrap();
        self.binder.start_monitoring(session_id, Timestamp::ZERO).await.unwrap();
    }

    pub async fn end_session(&self, session_id: &str) {
        self.directory.request(session_id, SessionRequest::End).await.unwrap();
    }

    /// Feed a steady stream of samples every `step_ms` in `[from_ms, to_ms)`.
    pub async fn feed(&self, session_id: &str, channel: SignalChannel, from_ms: u64, to_ms: u64, step_ms: u64, active: bool) {
        let mut t = from_ms;
        while t < to_ms {
            self.binder
                .observe(Observation::new(session_id, channel, Timestamp::from_millis(t), active))
                .await
                .unwrap();
            t += step_ms;
        }
    }
}
