//! Engine configuration: lateness tolerance and per-channel thresholds.
//!
//! Built-in defaults can be overridden from a JSON file (only the channels
//! listed are replaced) and from the `VIGIL_LATENESS_MS` environment variable.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::MonitorError;
use crate::kernel::channel::{ChannelConfig, SignalChannel};

pub const DEFAULT_LATENESS_TOLERANCE_MS: u64 = 1_000;
pub const LATENESS_ENV: &str = "VIGIL_LATENESS_MS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_lateness")]
    pub lateness_tolerance_ms: u64,
    #[serde(default)]
    pub channels: BTreeMap<SignalChannel, ChannelConfig>,
}

fn default_lateness() -> u64 {
    DEFAULT_LATENESS_TOLERANCE_MS
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            lateness_tolerance_ms: DEFAULT_LATENESS_TOLERANCE_MS,
            channels: SignalChannel::ALL
                .iter()
                .map(|c| (*c, ChannelConfig::default_for(*c)))
                .collect(),
        }
    }
}

impl MonitorConfig {
    pub fn channel(&self, channel: SignalChannel) -> ChannelConfig {
        self.channels
            .get(&channel)
            .cloned()
            .unwrap_or_else(|| ChannelConfig::default_for(channel))
    }

    pub fn from_json(json: &str) -> Result<Self, MonitorError> {
        let mut config: MonitorConfig =
            serde_json::from_str(json).map_err(|e| MonitorError::Config(e.to_string()))?;
        for channel in SignalChannel::ALL {
            config
                .channels
                .entry(channel)
                .or_insert_with(|| ChannelConfig::default_for(channel));
        }
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, MonitorError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MonitorError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&content)
    }

    pub fn with_env_overrides(mut self) -> Result<Self, MonitorError> {
        if let Ok(value) = std::env::var(LATENESS_ENV) {
            self.lateness_tolerance_ms = value
                .trim()
                .parse()
                .map_err(|_| MonitorError::Config(format!("{} must be an integer, got {:?}", LATENESS_ENV, value)))?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), MonitorError> {
        for (channel, cfg) in &self.channels {
            let rule = &cfg.severity;
            if let (Some(medium), Some(high)) = (rule.medium_after_ms, rule.high_after_ms) {
                if medium > high {
                    return Err(MonitorError::Config(format!(
                        "{}: medium_after_ms ({}) exceeds high_after_ms ({})",
                        channel, medium, high
                    )));
                }
            }
            if let (Some(medium), Some(high)) = (rule.medium_magnitude, rule.high_magnitude) {
                if medium > high {
                    return Err(MonitorError::Config(format!(
                        "{}: medium_magnitude ({}) exceeds high_magnitude ({})",
                        channel, medium, high
                    )));
                }
            }
        }
        Ok(())
    }
}
