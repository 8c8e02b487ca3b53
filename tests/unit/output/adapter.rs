use super::*;

fn config(key: OutputKey, targets: OutputTargets) -> OutputConfig {
    OutputConfig {
        version: 1,
        output_key: key,
        targets,
        format: OutputFormat {
            width: 1920,
            height: 1080,
            fps: 50,
        },
        range: Default::default(),
        colorspace: Default::default(),
    }
}

#[test]
fn stub_adapter_discards_frames() {
    let mut adapter = StubAdapter::new();
    adapter
        .configure(&config(OutputKey::Stub, OutputTargets::default()))
        .unwrap();
    adapter
        .send_frame(OutputFrame {
            width: 2,
            height: 2,
            rgba: &[0u8; 16],
            timestamp_ms: 0,
        })
        .unwrap();
    assert_eq!(adapter.frames_sent(), 1);
    adapter.stop().unwrap();
}

#[test]
fn single_lane_adapter_requires_output1_id() {
    let mut adapter = SingleLaneAdapter::new("definitely-not-a-real-binary".to_string());
    let err = adapter
        .configure(&config(OutputKey::VideoSdi, OutputTargets::default()))
        .unwrap_err();
    assert!(matches!(err, GraphicsError::InvalidPayload(_)));
}

#[test]
fn dual_lane_adapter_requires_both_targets() {
    let mut adapter = DualLaneAdapter::new("definitely-not-a-real-binary".to_string());
    let err = adapter
        .configure(&config(
            OutputKey::KeyFillSdi,
            OutputTargets {
                output1_id: Some("dev-1".to_string()),
                output2_id: None,
                ndi_stream_name: None,
            },
        ))
        .unwrap_err();
    assert!(matches!(err, GraphicsError::InvalidPayload(_)));
}

#[test]
fn ndi_adapter_requires_stream_name() {
    let mut adapter = NdiAdapter::new("definitely-not-a-real-binary".to_string());
    let err = adapter
        .configure(&config(OutputKey::KeyFillNdi, OutputTargets::default()))
        .unwrap_err();
    assert!(matches!(err, GraphicsError::InvalidPayload(_)));
}

#[test]
fn create_adapter_selects_implementation_by_key() {
    // Only checks that construction succeeds and stop() on an unconfigured adapter is a no-op;
    // it never spawns a helper process.
    for key in [
        OutputKey::Stub,
        OutputKey::VideoSdi,
        OutputKey::VideoHdmi,
        OutputKey::KeyFillSdi,
        OutputKey::KeyFillSplitSdi,
        OutputKey::KeyFillNdi,
    ] {
        let mut adapter = create_adapter(key);
        adapter.stop().unwrap();
    }
}
