//! Observability plumbing shared by the exchange binaries: logging setup,
//! the global metrics registry and propagation of the auction id across the
//! tasks an auction spawns.
pub mod metrics;
pub mod request_id;
pub mod tracing;
