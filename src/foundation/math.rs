/// Multiply two 0..=255 channel values and divide by 255, rounding half away from zero.
///
/// This is the rounding mode `spec.md` §4.5 mandates for the compositor; it differs from the
/// truncating `(a * b + 127) / 255` shortcut used for non-compositor alpha blends elsewhere in
/// this crate's ancestry, so it is kept as its own named helper rather than reused.
pub(crate) fn mul_div255_round_half_away(a: u8, b: u8) -> u8 {
    let num = u32::from(a) * u32::from(b);
    round_half_away_from_zero_div(num, 255) as u8
}

/// Divide `num` by `den` rounding half away from zero, for non-negative integers.
///
/// For non-negative inputs "away from zero" and "up" coincide; this helper exists under the
/// spec's naming so call sites read as invariant-driven rather than incidental.
pub(crate) fn round_half_away_from_zero_div(num: u32, den: u32) -> u32 {
    (num + den / 2) / den
}

/// `src + dst * (1 - srcAlpha/255)`, rounded half away from zero, saturating at 255.
pub(crate) fn over_channel(src: u8, dst: u8, src_alpha: u8) -> u8 {
    let inv = 255u8.saturating_sub(src_alpha);
    let blended = mul_div255_round_half_away(dst, inv);
    src.saturating_add(blended)
}

/// `channel + color_channel * (1 - alpha/255)`, rounded half away from zero, saturating at 255.
pub(crate) fn background_blend_channel(channel: u8, color_channel: u8, alpha: u8) -> u8 {
    let inv = 255u8.saturating_sub(alpha);
    let blended = mul_div255_round_half_away(color_channel, inv);
    channel.saturating_add(blended)
}

/// Tick interval in milliseconds for a given frame rate, lower-bounded at 1ms.
pub(crate) fn tick_interval_ms(fps: u32) -> u64 {
    if fps == 0 {
        return 1;
    }
    let interval = round_half_away_from_zero_div(1000, fps) as u64;
    interval.max(1)
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
