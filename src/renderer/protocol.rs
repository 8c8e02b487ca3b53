//! Wire framing for [`super::client::RendererClient`] (`spec.md` §4.6).
//!
//! A 4-byte big-endian header length, a UTF-8 JSON header, and an optional raw binary payload
//! whose size is declared by the header's `bufferLength` field.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::foundation::error::{GraphicsError, GraphicsResult};

/// Maximum JSON header size.
pub const MAX_HEADER_BYTES: usize = 64 * 1024;
/// Maximum binary payload size.
pub const MAX_PAYLOAD_BYTES: usize = 64 * 1024 * 1024;

const LEN_PREFIX_BYTES: usize = 4;

/// A single decoded frame: JSON header plus optional binary payload.
#[derive(Debug)]
pub struct Frame {
    pub header: serde_json::Value,
    pub payload: Option<Vec<u8>>,
}

/// Write `header` (and `payload`, if any) as one framed message.
///
/// `header` must serialize to an object; callers that attach a payload are expected to set
/// `bufferLength` themselves so the peer can read it back.
pub fn write_frame(
    writer: &mut impl Write,
    header: &impl Serialize,
    payload: Option<&[u8]>,
) -> GraphicsResult<()> {
    let header_bytes = serde_json::to_vec(header)
        .map_err(|e| GraphicsError::output_helper(format!("encode renderer header: {e}")))?;
    if header_bytes.len() > MAX_HEADER_BYTES {
        return Err(GraphicsError::invalid_payload(
            "renderer header exceeds 64 KiB",
        ));
    }
    if let Some(buf) = payload
        && buf.len() > MAX_PAYLOAD_BYTES
    {
        return Err(GraphicsError::invalid_payload(
            "renderer payload exceeds 64 MiB",
        ));
    }

    let len = (header_bytes.len() as u32).to_be_bytes();
    writer
        .write_all(&len)
        .and_then(|_| writer.write_all(&header_bytes))
        .map_err(|_| GraphicsError::RendererUnavailable)?;
    if let Some(buf) = payload {
        writer
            .write_all(buf)
            .map_err(|_| GraphicsError::RendererUnavailable)?;
    }
    writer
        .flush()
        .map_err(|_| GraphicsError::RendererUnavailable)
}

/// Read one framed message, resynchronizing by dropping bytes until a valid length prefix is
/// found if the declared header length exceeds [`MAX_HEADER_BYTES`].
pub fn read_frame(reader: &mut impl Read) -> GraphicsResult<Frame> {
    let header_len = read_length_prefix_resync(reader)?;
    let mut header_bytes = vec![0u8; header_len];
    reader
        .read_exact(&mut header_bytes)
        .map_err(|_| GraphicsError::RendererUnavailable)?;
    let header: serde_json::Value = serde_json::from_slice(&header_bytes)
        .map_err(|e| GraphicsError::invalid_payload(format!("renderer header not valid JSON: {e}")))?;

    let buffer_len = header
        .get("bufferLength")
        .and_then(|v| v.as_u64())
        .map(|n| n as usize);

    let payload = match buffer_len {
        Some(n) if n > MAX_PAYLOAD_BYTES => {
            return Err(GraphicsError::invalid_payload(
                "renderer payload exceeds 64 MiB",
            ));
        }
        Some(n) => {
            let mut buf = vec![0u8; n];
            reader
                .read_exact(&mut buf)
                .map_err(|_| GraphicsError::RendererUnavailable)?;
            Some(buf)
        }
        None => None,
    };

    Ok(Frame { header, payload })
}

fn read_length_prefix_resync(reader: &mut impl Read) -> GraphicsResult<usize> {
    let mut window = [0u8; LEN_PREFIX_BYTES];
    reader
        .read_exact(&mut window)
        .map_err(|_| GraphicsError::RendererUnavailable)?;

    loop {
        let len = u32::from_be_bytes(window) as usize;
        if len <= MAX_HEADER_BYTES {
            return Ok(len);
        }
        // Drop the oldest byte and shift in one more, resynchronizing the prefix window.
        let mut next = [0u8; 1];
        reader
            .read_exact(&mut next)
            .map_err(|_| GraphicsError::RendererUnavailable)?;
        window.copy_within(1.., 0);
        window[LEN_PREFIX_BYTES - 1] = next[0];
    }
}

/// Handshake token acceptance message sent by the renderer.
#[derive(Debug, Deserialize, Serialize)]
pub struct HandshakeAck {
    pub accepted: bool,
}

#[cfg(test)]
#[path = "../../tests/unit/renderer/protocol.rs"]
mod tests;
