use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Rate-limits repeated log lines to at most one per class per `window`.
///
/// `spec.md` §4.10 requires tick-loop success/error logging to be throttled to one line per 5
/// seconds per class; this is a small, dependency-free gate rather than pulling in a tracing
/// rate-limiting layer the teacher corpus never reaches for.
pub(crate) struct LogThrottle {
    window: Duration,
    last_emit: HashMap<&'static str, Instant>,
}

impl LogThrottle {
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            window,
            last_emit: HashMap::new(),
        }
    }

    /// Returns `true` if a log line for `class` should be emitted now, recording the emission.
    pub(crate) fn allow(&mut self, class: &'static str) -> bool {
        let now = Instant::now();
        match self.last_emit.get(class) {
            Some(last) if now.duration_since(*last) < self.window => false,
            _ => {
                self.last_emit.insert(class, now);
                true
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/log_throttle.rs"]
mod tests;
