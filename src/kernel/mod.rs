//! Per-channel signal kernel: time, channels, observations, signals and the
//! debouncing state machine that connects them.

pub mod channel;
pub mod debouncer;
pub mod observation;
pub mod signal;
pub mod telemetry;
pub mod time;
