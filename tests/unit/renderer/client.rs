use super::*;
use std::sync::mpsc;
use std::time::Duration;

fn opts_with_unreachable_binary() -> RendererClientOpts {
    RendererClientOpts {
        renderer_binary: "definitely-not-a-real-renderer-binary".to_string(),
        host: "127.0.0.1".to_string(),
        port: 47999,
        handshake_token: "test-token".to_string(),
        connect_timeout: Duration::from_millis(50),
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(5),
    }
}

#[test]
fn falls_back_to_stub_renderer_when_primary_never_starts() {
    let (tx, _rx) = mpsc::channel();
    let mut client = RendererClient::new(opts_with_unreachable_binary(), tx);
    assert!(!client.is_stub());

    client
        .render_layer(RenderLayerRequest {
            layer_id: "l1",
            html: "<div></div>",
            css: "",
            values: &serde_json::json!({}),
            bindings: &DerivedBindings::default(),
            layout: Layout { x: 0.0, y: 0.0, scale: 1.0 },
            background_mode: BackgroundMode::Transparent,
            width: 2,
            height: 2,
            fps: 30,
            z_index: 0,
        })
        .unwrap();

    assert!(client.is_stub());
}

#[test]
fn stub_renderer_emits_synthetic_frame_on_render_layer() {
    let (tx, rx) = mpsc::channel();
    let mut client = RendererClient::new(opts_with_unreachable_binary(), tx);

    client
        .render_layer(RenderLayerRequest {
            layer_id: "l1",
            html: "<div></div>",
            css: "",
            values: &serde_json::json!({}),
            bindings: &DerivedBindings::default(),
            layout: Layout { x: 0.0, y: 0.0, scale: 1.0 },
            background_mode: BackgroundMode::Transparent,
            width: 2,
            height: 2,
            fps: 30,
            z_index: 0,
        })
        .unwrap();

    let event = rx.recv_timeout(Duration::from_secs(1)).unwrap();
    match event {
        RendererEvent::Frame {
            layer_id,
            width,
            height,
            rgba,
        } => {
            assert_eq!(layer_id, "l1");
            assert_eq!((width, height), (2, 2));
            assert_eq!(rgba.len(), 2 * 2 * 4);
            assert_eq!(&rgba[0..4], &STUB_FILL);
        }
        other => panic!("expected Frame, got {other:?}"),
    }
}

#[test]
fn stub_renderer_update_values_is_a_noop_for_unknown_layer() {
    let (tx, rx) = mpsc::channel();
    let mut client = RendererClient::new(opts_with_unreachable_binary(), tx);
    client.ensure_connected().unwrap();
    assert!(client.is_stub());

    client
        .update_values("never-rendered", &serde_json::json!({}), &DerivedBindings::default())
        .unwrap();
    assert!(rx.try_recv().is_err());
}

#[test]
fn dispatch_event_ignores_unknown_message_types() {
    let (tx, rx) = mpsc::channel();
    let kept_going = dispatch_event(&serde_json::json!({"type": "handshake_ack"}), None, &tx);
    assert!(kept_going);
    assert!(rx.try_recv().is_err());
}

#[test]
fn dispatch_event_forwards_error_events() {
    let (tx, rx) = mpsc::channel();
    dispatch_event(
        &serde_json::json!({"type": "error", "message": "boom"}),
        None,
        &tx,
    );
    match rx.recv().unwrap() {
        RendererEvent::Error(message) => assert_eq!(message, "boom"),
        other => panic!("expected Error, got {other:?}"),
    }
}
