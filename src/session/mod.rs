//! Session-facing surface: status graph, the session-manager port and the
//! lifecycle binder that owns live monitoring contexts.

pub mod binder;
pub mod directory;
pub mod status;

pub use binder::SessionLifecycleBinder;
pub use directory::{InMemorySessionDirectory, SessionDirectory};
pub use status::{SessionRequest, SessionStatus, SessionStatusGraph};
