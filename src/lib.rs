pub mod config;
pub mod error;
pub mod kernel;
pub mod registry;
pub mod report;
pub mod session;
pub mod visibility;

// Re-export the pieces integrators touch most
pub use config::MonitorConfig;
pub use error::MonitorError;
pub use kernel::channel::{Severity, SignalChannel};
pub use kernel::observation::{Observation, SessionId};
pub use kernel::signal::{Signal, SignalTransition};
pub use kernel::time::Timestamp;
pub use report::{IntegrityReport, RiskLevel};
pub use session::SessionLifecycleBinder;
pub use visibility::{RequesterRole, VisibilityGate};
