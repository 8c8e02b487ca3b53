//! Subprocess renderer session management (`spec.md` §4.6).

/// Length-prefixed JSON+binary wire framing.
pub mod protocol;
/// Supervised renderer subprocess client with stub fallback.
pub mod client;
