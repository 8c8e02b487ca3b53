//! Persisted output configuration, pluggable output sinks, and the atomic transition pipeline
//! between them (`spec.md` §4.4, §4.7, §4.9).

/// Versioned, atomically-persisted [`config::OutputConfig`] store.
pub mod config;
/// Pluggable [`adapter::OutputAdapter`] implementations selected by output key.
pub mod adapter;
/// Staged apply/rollback transition between output configurations.
pub mod transition;
