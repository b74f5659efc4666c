//! fleet-core: live aircraft-state reconciliation.
//!
//! No async and no network I/O: just the fleet store, the ingest reconciler
//! and the geometry they share. The server crate wraps this with HTTP,
//! WebSocket broadcast and the staleness sweeper. The `runtime` feature adds
//! the logging and Ctrl-C setup both binaries share.

pub mod config;
pub mod geo;
pub mod reconcile;
#[cfg(feature = "runtime")]
pub mod runtime;
pub mod store;
pub mod types;

// Re-export commonly used types at crate root
pub use geo::bearing;
pub use reconcile::{HeadingPolicy, ReconcileOutcome, Reconciler};
pub use store::FleetStore;
pub use types::*;
