//! Interval arithmetic and the risk threshold table.
//!
//! | condition                                              | risk   |
//! |--------------------------------------------------------|--------|
//! | any MultiFace signal reached High severity             | High   |
//! | signal percentage >= 0.30                              | High   |
//! | signal percentage >= 0.10                              | Medium |
//! | any signal reached High severity                       | Medium |
//! | any MultiFace signal at all                            | Medium |
//! | otherwise                                              | Low    |

use crate::kernel::channel::{Severity, SignalChannel};
use crate::kernel::signal::Signal;
use crate::report::types::RiskLevel;

pub const HIGH_PERCENTAGE: f64 = 0.30;
pub const MEDIUM_PERCENTAGE: f64 = 0.10;

/// Total length of the union of `[start, end)` intervals, in milliseconds.
/// Overlapping intervals are counted once.
pub fn union_length_ms(intervals: &[(u64, u64)]) -> u64 {
    let mut sorted: Vec<(u64, u64)> = intervals.iter().copied().filter(|(s, e)| e > s).collect();
    sorted.sort_unstable();

    let mut total = 0u64;
    let mut current: Option<(u64, u64)> = None;

    for (start, end) in sorted {
        match current {
            Some((cs, ce)) if start <= ce => current = Some((cs, ce.max(end))),
            Some((cs, ce)) => {
                total += ce - cs;
                current = Some((start, end));
            }
            None => current = Some((start, end)),
        }
    }

    if let Some((cs, ce)) = current {
        total += ce - cs;
    }
    total
}

/// Signal intervals clipped to the monitoring window.
pub fn signal_intervals(signals: &[Signal], window: (u64, u64)) -> Vec<(u64, u64)> {
    signals
        .iter()
        .filter_map(|s| {
            let end = s.ended_at?;
            let start = s.started_at.ms.max(window.0);
            let end = end.ms.min(window.1);
            (end > start).then_some((start, end))
        })
        .collect()
}

pub fn assess(signals: &[Signal], signal_percentage: f64) -> RiskLevel {
    let high_multi_face = signals
        .iter()
        .any(|s| s.channel == SignalChannel::MultiFace && s.severity == Severity::High);
    if high_multi_face || signal_percentage >= HIGH_PERCENTAGE {
        return RiskLevel::High;
    }

    let any_high = signals.iter().any(|s| s.severity == Severity::High);
    let any_multi_face = signals.iter().any(|s| s.channel == SignalChannel::MultiFace);
    if signal_percentage >= MEDIUM_PERCENTAGE || any_high || any_multi_face {
        return RiskLevel::Medium;
    }

    RiskLevel::Low
}
