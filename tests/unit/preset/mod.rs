use super::*;

#[test]
fn first_send_without_duration_is_unarmed() {
    let mut svc = PresetService::new();
    let outcome = svc.on_layer_send("l1", Some("p1"), None);
    assert_eq!(outcome, PresetArrival::Accepted);
    assert!(matches!(svc.state(), PresetState::Unarmed { preset_id, .. } if preset_id == "p1"));
}

#[test]
fn first_send_with_positive_duration_is_pending() {
    let mut svc = PresetService::new();
    svc.on_layer_send("l1", Some("p1"), Some(5000));
    assert!(matches!(
        svc.state(),
        PresetState::Pending { preset_id, duration_ms: 5000, .. } if preset_id == "p1"
    ));
}

#[test]
fn s6_second_send_same_preset_same_duration_merges() {
    let mut svc = PresetService::new();
    svc.on_layer_send("l1", Some("p1"), Some(5000));
    let outcome = svc.on_layer_send("l2", Some("p1"), Some(5000));
    assert_eq!(outcome, PresetArrival::Accepted);
    match svc.state() {
        PresetState::Pending { layer_ids, .. } => {
            assert_eq!(layer_ids.len(), 2);
            assert!(layer_ids.contains("l1") && layer_ids.contains("l2"));
        }
        other => panic!("expected Pending, got {other:?}"),
    }
}

#[test]
fn send_same_preset_new_duration_re_pends_and_merges() {
    let mut svc = PresetService::new();
    svc.on_layer_send("l1", Some("p1"), Some(5000));
    svc.note_tick_layers(&HashSet::from(["l1".to_string()]), 1_000);
    assert!(matches!(svc.state(), PresetState::Armed { .. }));

    svc.on_layer_send("l2", Some("p1"), Some(9000));
    match svc.state() {
        PresetState::Pending {
            duration_ms, layer_ids, ..
        } => {
            assert_eq!(*duration_ms, 9000);
            assert!(layer_ids.contains("l1") && layer_ids.contains("l2"));
        }
        other => panic!("expected Pending after re-pend, got {other:?}"),
    }
}

#[test]
fn send_different_preset_id_replaces_default_policy() {
    let mut svc = PresetService::new();
    svc.on_layer_send("l1", Some("p1"), Some(5000));
    let outcome = svc.on_layer_send("l2", Some("p2"), None);
    match outcome {
        PresetArrival::Replaced { removed_layer_ids } => {
            assert_eq!(removed_layer_ids, HashSet::from(["l1".to_string()]));
        }
        other => panic!("expected Replaced, got {other:?}"),
    }
    assert!(matches!(svc.state(), PresetState::Unarmed { preset_id, .. } if preset_id == "p2"));
}

#[test]
fn send_without_preset_id_removes_current_preset() {
    let mut svc = PresetService::new();
    svc.on_layer_send("l1", Some("p1"), None);
    let outcome = svc.on_layer_send("l2", None, None);
    match outcome {
        PresetArrival::Replaced { removed_layer_ids } => {
            assert_eq!(removed_layer_ids, HashSet::from(["l1".to_string()]));
        }
        other => panic!("expected Replaced, got {other:?}"),
    }
    assert_eq!(svc.state(), &PresetState::None);
}

#[test]
fn send_without_preset_id_when_none_active_is_accepted() {
    let mut svc = PresetService::new();
    assert_eq!(svc.on_layer_send("l1", None, None), PresetArrival::Accepted);
}

#[test]
fn s7_tie_break_arms_on_first_tick_containing_any_member_layer() {
    let mut svc = PresetService::new();
    svc.on_layer_send("l1", Some("p1"), Some(5000));
    svc.on_layer_send("l2", Some("p1"), Some(5000));

    let timer = svc.note_tick_layers(&HashSet::from(["l2".to_string()]), 10_000);
    let timer = timer.expect("expected arming on first tick containing a member layer");
    assert_eq!(timer.expires_at, 15_000);

    match svc.state() {
        PresetState::Armed { started_at, generation, .. } => {
            assert_eq!(*started_at, 10_000);
            assert_eq!(*generation, timer.generation);
        }
        other => panic!("expected Armed, got {other:?}"),
    }
}

#[test]
fn note_tick_layers_is_a_noop_when_no_member_layer_ticked() {
    let mut svc = PresetService::new();
    svc.on_layer_send("l1", Some("p1"), Some(5000));
    assert!(svc
        .note_tick_layers(&HashSet::from(["other".to_string()]), 1_000)
        .is_none());
    assert!(matches!(svc.state(), PresetState::Pending { .. }));
}

#[test]
fn s7_timer_expiry_with_matching_generation_clears_preset() {
    let mut svc = PresetService::new();
    svc.on_layer_send("l1", Some("p1"), Some(5000));
    let timer = svc
        .note_tick_layers(&HashSet::from(["l1".to_string()]), 1_000)
        .unwrap();

    assert!(svc.on_timer_expired(timer.generation));
    assert_eq!(svc.state(), &PresetState::None);
}

#[test]
fn stale_timer_expiry_after_replace_is_ignored() {
    let mut svc = PresetService::new();
    svc.on_layer_send("l1", Some("p1"), Some(5000));
    let timer = svc
        .note_tick_layers(&HashSet::from(["l1".to_string()]), 1_000)
        .unwrap();

    svc.on_layer_send("l2", Some("p2"), None);
    assert!(!svc.on_timer_expired(timer.generation));
    assert!(matches!(svc.state(), PresetState::Unarmed { preset_id, .. } if preset_id == "p2"));
}

#[test]
fn removing_last_layer_of_preset_clears_it() {
    let mut svc = PresetService::new();
    svc.on_layer_send("l1", Some("p1"), None);
    assert!(!svc.on_layer_removed("nonexistent"));
    assert!(svc.on_layer_removed("l1"));
    assert_eq!(svc.state(), &PresetState::None);
}

#[test]
fn removing_one_of_several_layers_keeps_preset_active() {
    let mut svc = PresetService::new();
    svc.on_layer_send("l1", Some("p1"), None);
    svc.on_layer_send("l2", Some("p1"), None);
    assert!(!svc.on_layer_removed("l1"));
    assert!(matches!(svc.state(), PresetState::Unarmed { layer_ids, .. } if layer_ids.len() == 1));
}

#[test]
fn clear_all_resets_to_none() {
    let mut svc = PresetService::new();
    svc.on_layer_send("l1", Some("p1"), Some(1000));
    svc.clear_all();
    assert_eq!(svc.state(), &PresetState::None);
}

#[test]
fn snapshot_reflects_armed_timing() {
    let mut svc = PresetService::new();
    svc.on_layer_send("l1", Some("p1"), Some(5000));
    svc.note_tick_layers(&HashSet::from(["l1".to_string()]), 10_000);
    let snapshot = svc.snapshot().expect("expected an active preset snapshot");
    assert_eq!(snapshot.preset_id, "p1");
    assert_eq!(snapshot.duration_ms, Some(5000));
    assert_eq!(snapshot.started_at, Some(10_000));
    assert_eq!(snapshot.expires_at, Some(15_000));
}

#[test]
fn snapshot_is_none_when_slot_is_empty() {
    let svc = PresetService::new();
    assert!(svc.snapshot().is_none());
}
