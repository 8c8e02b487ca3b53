use super::*;

#[test]
fn background_mode_rgb_table() {
    assert_eq!(BackgroundMode::Transparent.rgb(), (0, 0, 0));
    assert_eq!(BackgroundMode::Green.rgb(), (0, 255, 0));
    assert_eq!(BackgroundMode::Black.rgb(), (0, 0, 0));
    assert_eq!(BackgroundMode::White.rgb(), (255, 255, 255));
}

#[test]
fn layout_rejects_non_positive_scale() {
    let layout = Layout {
        x: 0.0,
        y: 0.0,
        scale: 0.0,
    };
    assert!(layout.validate().is_err());
}

#[test]
fn category_serializes_kebab_case() {
    let json = serde_json::to_string(&Category::LowerThirds).unwrap();
    assert_eq!(json, "\"lower-thirds\"");
}
