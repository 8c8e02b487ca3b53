//! The graphics manager facade: single worker-thread core, cadence ticker, and command surface
//! (`spec.md` §4.10, §5, §6).

/// Layer map and category-occupancy index.
pub mod layer;
/// `GraphicsManagerOpts`, the `Engine` worker, and the public `GraphicsManager` facade.
pub mod facade;
