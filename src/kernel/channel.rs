use serde::{Deserialize, Serialize};

/// The monitored integrity dimensions. The set is fixed; every monitoring
/// context owns exactly one debouncer per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalChannel {
    /// No face in frame.
    FaceAbsence,
    /// More than one face in frame. `magnitude` carries the face count.
    MultiFace,
    /// Gaze away from the screen. `magnitude` carries the deviation angle in degrees.
    GazeDeviation,
    /// Unexpected audio pattern (second voice, prompting). `magnitude` is a 0-1 score.
    UnusualAudio,
    /// Interview tab lost focus.
    TabSwitch,
}

impl SignalChannel {
    pub const ALL: [SignalChannel; 5] = [
        SignalChannel::FaceAbsence,
        SignalChannel::MultiFace,
        SignalChannel::GazeDeviation,
        SignalChannel::UnusualAudio,
        SignalChannel::TabSwitch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalChannel::FaceAbsence => "face_absence",
            SignalChannel::MultiFace => "multi_face",
            SignalChannel::GazeDeviation => "gaze_deviation",
            SignalChannel::UnusualAudio => "unusual_audio",
            SignalChannel::TabSwitch => "tab_switch",
        }
    }
}

impl std::fmt::Display for SignalChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Default for Severity {
    fn default() -> Self {
        Self::Low
    }
}

/// Maps how long a condition has been active (and how strong it is) to a severity.
/// The result is the maximum of the base level, the duration band and the magnitude band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeverityRule {
    #[serde(default)]
    pub base: Severity,
    #[serde(default)]
    pub medium_after_ms: Option<u64>,
    #[serde(default)]
    pub high_after_ms: Option<u64>,
    #[serde(default)]
    pub medium_magnitude: Option<f64>,
    #[serde(default)]
    pub high_magnitude: Option<f64>,
}

impl SeverityRule {
    pub fn evaluate(&self, active_ms: u64, magnitude: Option<f64>) -> Severity {
        let by_duration = band(
            active_ms,
            self.medium_after_ms,
            self.high_after_ms,
        );

        let by_magnitude = match magnitude {
            Some(m) if m.is_finite() => {
                if self.high_magnitude.is_some_and(|t| m >= t) {
                    Severity::High
                } else if self.medium_magnitude.is_some_and(|t| m >= t) {
                    Severity::Medium
                } else {
                    Severity::Low
                }
            }
            _ => Severity::Low,
        };

        self.base.max(by_duration).max(by_magnitude)
    }
}

fn band(active_ms: u64, medium_after: Option<u64>, high_after: Option<u64>) -> Severity {
    if high_after.is_some_and(|t| active_ms >= t) {
        Severity::High
    } else if medium_after.is_some_and(|t| active_ms >= t) {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Per-channel thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Sustained activity needed before a signal is raised.
    pub activation_threshold_ms: u64,
    /// Inactivity needed before an active signal is considered cleared.
    pub debounce_window_ms: u64,
    pub severity: SeverityRule,
}

impl ChannelConfig {
    pub fn default_for(channel: SignalChannel) -> Self {
        match channel {
            SignalChannel::FaceAbsence => Self {
                activation_threshold_ms: 5_000,
                debounce_window_ms: 1_000,
                severity: SeverityRule {
                    base: Severity::Low,
                    medium_after_ms: Some(15_000),
                    high_after_ms: Some(60_000),
                    medium_magnitude: None,
                    high_magnitude: None,
                },
            },
            SignalChannel::MultiFace => Self {
                activation_threshold_ms: 2_000,
                debounce_window_ms: 1_000,
                severity: SeverityRule {
                    base: Severity::Medium,
                    medium_after_ms: None,
                    high_after_ms: Some(10_000),
                    medium_magnitude: None,
                    high_magnitude: Some(3.0),
                },
            },
            SignalChannel::GazeDeviation => Self {
                activation_threshold_ms: 3_000,
                debounce_window_ms: 1_500,
                severity: SeverityRule {
                    base: Severity::Low,
                    medium_after_ms: Some(10_000),
                    high_after_ms: Some(30_000),
                    medium_magnitude: Some(30.0),
                    high_magnitude: Some(45.0),
                },
            },
            SignalChannel::UnusualAudio => Self {
                activation_threshold_ms: 2_000,
                debounce_window_ms: 2_000,
                severity: SeverityRule {
                    base: Severity::Low,
                    medium_after_ms: Some(10_000),
                    high_after_ms: Some(30_000),
                    medium_magnitude: Some(0.6),
                    high_magnitude: Some(0.85),
                },
            },
            SignalChannel::TabSwitch => Self {
                activation_threshold_ms: 0,
                debounce_window_ms: 500,
                severity: SeverityRule {
                    base: Severity::Low,
                    medium_after_ms: Some(5_000),
                    high_after_ms: Some(20_000),
                    medium_magnitude: None,
                    high_magnitude: None,
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_takes_the_strongest_band() {
        let rule = ChannelConfig::default_for(SignalChannel::GazeDeviation).severity;
        assert_eq!(rule.evaluate(1_000, None), Severity::Low);
        assert_eq!(rule.evaluate(12_000, None), Severity::Medium);
        assert_eq!(rule.evaluate(1_000, Some(50.0)), Severity::High);
        assert_eq!(rule.evaluate(31_000, Some(10.0)), Severity::High);
    }

    #[test]
    fn multi_face_starts_at_medium() {
        let rule = ChannelConfig::default_for(SignalChannel::MultiFace).severity;
        assert_eq!(rule.evaluate(0, Some(2.0)), Severity::Medium);
        assert_eq!(rule.evaluate(0, Some(3.0)), Severity::High);
    }
}
