//! End-of-session integrity reports.

pub mod aggregator;
pub mod risk;
pub mod sink;
pub mod types;

pub use aggregator::ReportAggregator;
pub use sink::{JsonFileSink, ReportSink};
pub use types::{IntegrityReport, RiskLevel, SignalRow};
