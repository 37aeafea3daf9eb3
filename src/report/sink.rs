use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

use super::types::IntegrityReport;
use crate::error::MonitorError;

/// The external datastore collaborator. Receives each report exactly once.
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn persist(&self, report: &IntegrityReport) -> Result<(), MonitorError>;
}

/// Writes `<dir>/<session>.report.json` and `<dir>/<session>.signals.json`.
pub struct JsonFileSink {
    dir: PathBuf,
}

impl JsonFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn report_path(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{}.report.json", sanitize(session_id)))
    }

    pub fn signals_path(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{}.signals.json", sanitize(session_id)))
    }
}

// Session ids come from upstream; keep them from escaping the directory.
fn sanitize(session_id: &str) -> String {
    session_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[async_trait]
impl ReportSink for JsonFileSink {
    async fn persist(&self, report: &IntegrityReport) -> Result<(), MonitorError> {
        let report_json = serde_json::to_string_pretty(report)
            .map_err(|e| MonitorError::Persistence(e.to_string()))?;
        let rows_json = serde_json::to_string_pretty(&report.signal_rows())
            .map_err(|e| MonitorError::Persistence(e.to_string()))?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| MonitorError::Persistence(e.to_string()))?;

        let report_path = self.report_path(&report.session_id);
        tokio::fs::write(&report_path, report_json)
            .await
            .map_err(|e| MonitorError::Persistence(e.to_string()))?;
        tokio::fs::write(self.signals_path(&report.session_id), rows_json)
            .await
            .map_err(|e| MonitorError::Persistence(e.to_string()))?;

        info!(session = %report.session_id, path = %report_path.display(), "Report persisted");
        Ok(())
    }
}
