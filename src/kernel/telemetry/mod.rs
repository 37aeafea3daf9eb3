//! Monitoring telemetry.
//!
//! # SAFETY INVARIANT
//! Telemetry is a side-effect layer. It is never read by the debouncers,
//! the registry or the aggregator when deciding anything.
//!
//! # PRIVACY INVARIANT
//! Events carry session ids, channels, severities, durations and counts only.
//! Observation metadata and magnitudes never enter telemetry.

pub mod event;
pub mod metrics;
pub mod recorder;
