use serde::{Deserialize, Serialize};

/// Session-relative instant in milliseconds.
/// All durations in the engine are integer milliseconds so that
/// `ended_at - started_at` is exact; seconds are derived only at the edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp {
    pub ms: u64,
}

pub const MS_PER_SECOND: u64 = 1_000;

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp { ms: 0 };

    pub fn from_millis(ms: u64) -> Self {
        Timestamp { ms }
    }

    pub fn from_secs(secs: u64) -> Self {
        Timestamp { ms: secs * MS_PER_SECOND }
    }

    /// Milliseconds elapsed since `earlier`, saturating at zero.
    pub fn since(&self, earlier: Timestamp) -> u64 {
        self.ms.saturating_sub(earlier.ms)
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.ms as f64 / MS_PER_SECOND as f64
    }
}

pub fn millis_to_secs(ms: u64) -> f64 {
    ms as f64 / MS_PER_SECOND as f64
}
