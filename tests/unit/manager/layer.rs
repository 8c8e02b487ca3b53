use super::*;
use crate::model::{BackgroundMode, Category, Layout};
use crate::sanitizer::bindings::DerivedBindings;

fn layer(id: &str, category: Category, z_index: i32) -> Layer {
    Layer {
        layer_id: id.to_string(),
        category,
        layout: Layout { x: 0.0, y: 0.0, scale: 1.0 },
        z_index,
        background_mode: BackgroundMode::Transparent,
        values: Default::default(),
        bindings: DerivedBindings::default(),
        schema: serde_json::json!({}),
        defaults: Default::default(),
        preset_id: None,
        last_frame: None,
    }
}

#[test]
fn check_limits_rejects_second_layer_in_same_category() {
    let mut map = LayerMap::new();
    map.commit(layer("l1", Category::Overlays, 0));
    assert!(map.check_limits("l2", Category::Overlays).is_err());
}

#[test]
fn check_limits_allows_update_of_existing_layer_in_its_own_category() {
    let mut map = LayerMap::new();
    map.commit(layer("l1", Category::Overlays, 0));
    assert!(map.check_limits("l1", Category::Overlays).is_ok());
}

#[test]
fn check_limits_rejects_fourth_layer() {
    let mut map = LayerMap::new();
    map.commit(layer("l1", Category::Overlays, 0));
    map.commit(layer("l2", Category::Slides, 0));
    map.commit(layer("l3", Category::LowerThirds, 0));
    assert_eq!(map.len(), 3);
    assert!(map.check_limits("l4", Category::Overlays).is_err());
}

#[test]
fn commit_preserves_last_frame_when_new_send_omits_it() {
    let mut map = LayerMap::new();
    let mut first = layer("l1", Category::Overlays, 0);
    first.last_frame = Some(crate::model::RgbaFrame {
        layer_id: "l1".to_string(),
        buffer: vec![1, 2, 3, 4],
    });
    map.commit(first);

    map.commit(layer("l1", Category::Overlays, 1));
    assert!(map.get("l1").unwrap().last_frame.is_some());
}

#[test]
fn remove_clears_category_occupancy() {
    let mut map = LayerMap::new();
    map.commit(layer("l1", Category::Overlays, 0));
    map.remove("l1");
    assert!(map.check_limits("l2", Category::Overlays).is_ok());
}

#[test]
fn set_last_frame_discards_frames_for_unknown_layers() {
    let mut map = LayerMap::new();
    map.commit(layer("l1", Category::Overlays, 0));
    let frame = crate::model::RgbaFrame {
        layer_id: "ghost".to_string(),
        buffer: vec![0; 4],
    };
    assert!(!map.set_last_frame("ghost", frame));
}

#[test]
fn snapshot_for_compositing_only_includes_layers_with_frames_sorted_by_z() {
    let mut map = LayerMap::new();
    map.commit(layer("top", Category::Overlays, 5));
    map.commit(layer("bottom", Category::Slides, 1));
    map.commit(layer("no-frame", Category::LowerThirds, 0));

    map.set_last_frame(
        "top",
        crate::model::RgbaFrame { layer_id: "top".to_string(), buffer: vec![0; 4] },
    );
    map.set_last_frame(
        "bottom",
        crate::model::RgbaFrame { layer_id: "bottom".to_string(), buffer: vec![0; 4] },
    );

    let snapshot = map.snapshot_for_compositing();
    let ids: Vec<&str> = snapshot.iter().map(|l| l.layer_id.as_str()).collect();
    assert_eq!(ids, vec!["bottom", "top"]);
}

#[test]
fn snapshot_for_compositing_breaks_same_z_index_ties_by_insertion_order() {
    let mut map = LayerMap::new();
    map.commit(layer("third", Category::LowerThirds, 2));
    map.commit(layer("first", Category::Overlays, 2));
    map.commit(layer("second", Category::Slides, 2));

    for id in ["third", "first", "second"] {
        map.set_last_frame(
            id,
            crate::model::RgbaFrame { layer_id: id.to_string(), buffer: vec![0; 4] },
        );
    }

    let snapshot = map.snapshot_for_compositing();
    let ids: Vec<&str> = snapshot.iter().map(|l| l.layer_id.as_str()).collect();
    assert_eq!(ids, vec!["third", "first", "second"]);
}
