use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in milliseconds since the Unix epoch.
///
/// Used for `ActivePreset.startedAt`/`expiresAt` and frame delivery timestamps; `SystemTime` is
/// used rather than `Instant` because these values are part of the observable command/event
/// surface (`graphics_status`, frame timestamps) and must be comparable across process restarts.
pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
