use std::collections::{BTreeMap, VecDeque};

use super::event::{DropReason, TelemetryEvent};
use crate::kernel::channel::SignalChannel;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetrySnapshot {
    pub session_stats: SessionStats,
    pub drop_stats: DropStats,
    pub signal_stats: SignalStats,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStats {
    pub started: u64,
    pub stopped: u64,
    pub faulted: u64,
    pub reports: u64,
    pub avg_monitored_ms: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DropStats {
    pub out_of_order: u64,
    pub after_stop: u64,
    pub not_started: u64,
    pub faulted: u64,
}

impl DropStats {
    pub fn total(&self) -> u64 {
        self.out_of_order + self.after_stop + self.not_started + self.faulted
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalStats {
    pub raised: u64,
    pub escalated: u64,
    pub resolved: u64,
    pub truncated: u64,
    pub avg_duration_ms: f64,
    pub raised_per_channel: BTreeMap<SignalChannel, u64>,
}

pub fn compute_snapshot(events: &VecDeque<TelemetryEvent>) -> TelemetrySnapshot {
    let mut snap = TelemetrySnapshot::default();

    let mut monitored_total_ms = 0u64;
    let mut resolved_total_ms = 0u64;

    for event in events {
        match event {
            TelemetryEvent::MonitoringStarted { .. } => snap.session_stats.started += 1,
            TelemetryEvent::MonitoringStopped { duration_ms, .. } => {
                snap.session_stats.stopped += 1;
                monitored_total_ms += duration_ms;
            }
            TelemetryEvent::ObservationDropped { reason, .. } => match reason {
                DropReason::OutOfOrder => snap.drop_stats.out_of_order += 1,
                DropReason::AfterStop => snap.drop_stats.after_stop += 1,
                DropReason::NotStarted => snap.drop_stats.not_started += 1,
                DropReason::Faulted => snap.drop_stats.faulted += 1,
            },
            TelemetryEvent::SignalRaised { channel, .. } => {
                snap.signal_stats.raised += 1;
                *snap.signal_stats.raised_per_channel.entry(*channel).or_insert(0) += 1;
            }
            TelemetryEvent::SignalEscalated { .. } => snap.signal_stats.escalated += 1,
            TelemetryEvent::SignalResolved { duration_ms, truncated, .. } => {
                snap.signal_stats.resolved += 1;
                resolved_total_ms += duration_ms;
                if *truncated {
                    snap.signal_stats.truncated += 1;
                }
            }
            TelemetryEvent::ReportGenerated { .. } => snap.session_stats.reports += 1,
            TelemetryEvent::ContextFaulted { .. } => snap.session_stats.faulted += 1,
        }
    }

    if snap.session_stats.stopped > 0 {
        snap.session_stats.avg_monitored_ms = monitored_total_ms as f64 / snap.session_stats.stopped as f64;
    }

    if snap.signal_stats.resolved > 0 {
        snap.signal_stats.avg_duration_ms = resolved_total_ms as f64 / snap.signal_stats.resolved as f64;
    }

    snap
}
