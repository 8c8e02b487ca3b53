use super::*;

#[test]
fn mul_div255_rounds_half_away_from_zero() {
    // 128 * 128 / 255 = 64.25 -> 64
    assert_eq!(mul_div255_round_half_away(128, 128), 64);
    // 255 * 255 / 255 = 255
    assert_eq!(mul_div255_round_half_away(255, 255), 255);
    // 1 * 1 / 255 = 0.0039 -> 0
    assert_eq!(mul_div255_round_half_away(1, 1), 0);
}

#[test]
fn over_channel_full_src_alpha_is_src() {
    assert_eq!(over_channel(200, 10, 255), 200);
}

#[test]
fn over_channel_zero_src_alpha_is_dst() {
    // A valid premultiplied pixel with alpha 0 has channel 0 too.
    assert_eq!(over_channel(0, 10, 0), 10);
}

#[test]
fn background_blend_opaque_pixel_is_untouched_channel() {
    // Caller only invokes this for alpha < 255; at alpha 255 the blend would be a no-op anyway.
    assert_eq!(background_blend_channel(10, 255, 255), 10);
}

#[test]
fn tick_interval_matches_common_frame_rates() {
    assert_eq!(tick_interval_ms(30), 33);
    assert_eq!(tick_interval_ms(60), 17);
    assert_eq!(tick_interval_ms(50), 20);
    assert_eq!(tick_interval_ms(0), 1);
}
