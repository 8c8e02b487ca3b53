//! Content-addressed-by-id media store backing template `asset://` references.

/// Durable, size-capped asset registry.
pub mod registry;
