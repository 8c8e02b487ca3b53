//! Pure RGBA compositor: premultiplied over-blend and optional solid background fill.
//!
//! Grounded on the teacher's `effects::composite::over`/`over_in_place` (same premultiplied
//! Porter-Duff source-over math, same per-channel helper shape), generalized here from a
//! single-opacity two-buffer blend to a multi-layer, Z-sorted whole-frame compositor plus the
//! separate background-fill pass `spec.md` §4.5 requires.

use crate::foundation::math::{background_blend_channel, over_channel};
use crate::model::RgbaFrame;

/// One layer ready to be composited: a premultiplied RGBA8 buffer plus its Z-order.
#[derive(Clone, Copy, Debug)]
pub struct CompositeLayer<'a> {
    pub z_index: i32,
    pub buffer: &'a [u8],
}

/// Composite layers bottom-to-top over a transparent canvas of `width x height`.
///
/// Layers are expected pre-sorted ascending by `z_index` (stable by insertion order for ties,
/// per `spec.md` §8 invariant 6); this function composites in the order given rather than
/// re-sorting, so the caller's sort controls tie-breaking.
///
/// A layer whose buffer length does not match `width * height * 4` is skipped whole (it does not
/// abort compositing); layers with `src_alpha == 0` at a given pixel are skipped per pixel.
pub fn composite_layers(layers: &[CompositeLayer<'_>], width: u32, height: u32) -> Vec<u8> {
    let expected_len = expected_buffer_len(width, height);
    let mut canvas = vec![0u8; expected_len];

    for layer in layers {
        if layer.buffer.len() != expected_len {
            continue;
        }
        for (dst, src) in canvas.chunks_exact_mut(4).zip(layer.buffer.chunks_exact(4)) {
            let src_alpha = src[3];
            if src_alpha == 0 {
                continue;
            }
            for c in 0..4 {
                dst[c] = over_channel(src[c], dst[c], src_alpha);
            }
        }
    }

    canvas
}

/// Fill transparent-or-translucent pixels (`alpha < 255`) with a solid background color.
///
/// Fully opaque pixels are left untouched, making this idempotent on a buffer already at
/// `alpha == 255` (`spec.md` §8 invariant 7).
pub fn apply_background(buffer: &mut [u8], color: (u8, u8, u8)) {
    let (r, g, b) = color;
    for px in buffer.chunks_exact_mut(4) {
        let alpha = px[3];
        if alpha == 255 {
            continue;
        }
        px[0] = background_blend_channel(px[0], r, alpha);
        px[1] = background_blend_channel(px[1], g, alpha);
        px[2] = background_blend_channel(px[2], b, alpha);
        px[3] = 255;
    }
}

/// Expected byte length of a premultiplied RGBA8 frame at `width x height`.
pub fn expected_buffer_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 4
}

/// Build [`CompositeLayer`] views from a Z-sorted slice of known layer frames.
///
/// `spec.md` §4.10's tick logic: "snapshot layers that have a `lastFrame`, sort ascending by
/// `zIndex`" — callers sort the `(z_index, frame)` pairs themselves (stable sort preserves
/// insertion-order ties) before calling this.
pub fn layers_from_frames<'a>(frames: &'a [(i32, &'a RgbaFrame)]) -> Vec<CompositeLayer<'a>> {
    frames
        .iter()
        .map(|(z, frame)| CompositeLayer {
            z_index: *z,
            buffer: frame.buffer.as_slice(),
        })
        .collect()
}

#[cfg(test)]
#[path = "../../tests/unit/compositor/mod.rs"]
mod tests;
