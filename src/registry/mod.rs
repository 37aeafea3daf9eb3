//! Session-scoped signal registry: the single source of truth for live
//! integrity state.

pub mod store;

pub use store::*;
