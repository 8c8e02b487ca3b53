//! Small load-bearing utilities shared across the graphics core: errors, time, atomic file
//! writes, cadence math and tick-log throttling.

/// Atomic, durable JSON file writes for persisted config/manifests.
pub(crate) mod atomic_write;
/// The top-level [`error::GraphicsError`] taxonomy.
pub mod error;
/// Repeated-log-line suppression for the per-tick cadence log.
pub(crate) mod log_throttle;
/// Frame-cadence arithmetic.
pub(crate) mod math;
/// Monotonic wall-clock milliseconds.
pub(crate) mod time;
