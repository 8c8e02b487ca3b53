use super::*;
use std::io::Cursor;

#[test]
fn write_then_read_frame_without_payload_round_trips() {
    let mut buf = Vec::new();
    write_frame(&mut buf, &serde_json::json!({"type": "ping"}), None).unwrap();

    let mut cursor = Cursor::new(buf);
    let frame = read_frame(&mut cursor).unwrap();
    assert_eq!(frame.header["type"], "ping");
    assert!(frame.payload.is_none());
}

#[test]
fn write_then_read_frame_with_payload_round_trips() {
    let payload = vec![1u8, 2, 3, 4, 5];
    let header = serde_json::json!({"type": "frame", "layerId": "l1", "bufferLength": payload.len()});
    let mut buf = Vec::new();
    write_frame(&mut buf, &header, Some(&payload)).unwrap();

    let mut cursor = Cursor::new(buf);
    let frame = read_frame(&mut cursor).unwrap();
    assert_eq!(frame.header["layerId"], "l1");
    assert_eq!(frame.payload, Some(payload));
}

#[test]
fn oversized_header_length_is_rejected_at_write_time() {
    let huge = "x".repeat(MAX_HEADER_BYTES + 1);
    let err = write_frame(&mut Vec::new(), &serde_json::json!({"huge": huge}), None).unwrap_err();
    assert!(matches!(err, GraphicsError::InvalidPayload(_)));
}

#[test]
fn resyncs_past_a_corrupt_oversized_length_prefix() {
    // A bogus 0xFFFFFFFF length prefix followed by a real frame one byte later must be skipped
    // over byte-by-byte until a plausible length is found.
    let mut buf = vec![0xFFu8, 0xFF, 0xFF, 0xFF];
    let mut good_frame = Vec::new();
    write_frame(&mut good_frame, &serde_json::json!({"type": "ping"}), None).unwrap();
    buf.extend_from_slice(&good_frame);

    let mut cursor = Cursor::new(buf);
    let frame = read_frame(&mut cursor).unwrap();
    assert_eq!(frame.header["type"], "ping");
}

#[test]
fn declared_payload_over_cap_is_rejected() {
    let header = serde_json::json!({"type": "frame", "bufferLength": MAX_PAYLOAD_BYTES + 1});
    let header_bytes = serde_json::to_vec(&header).unwrap();
    let mut buf = (header_bytes.len() as u32).to_be_bytes().to_vec();
    buf.extend_from_slice(&header_bytes);

    let mut cursor = Cursor::new(buf);
    let err = read_frame(&mut cursor).unwrap_err();
    assert!(matches!(err, GraphicsError::InvalidPayload(_)));
}
