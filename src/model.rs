use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::sanitizer::bindings::DerivedBindings;

/// A layer's on-air category. `spec.md` §3 enforces at most one active layer per category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    LowerThirds,
    Overlays,
    Slides,
}

/// Layer placement within the output canvas.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub x: f64,
    pub y: f64,
    pub scale: f64,
}

impl Layout {
    /// Validate the `scale > 0` invariant from `spec.md` §3.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.scale > 0.0) {
            return Err("layout.scale must be > 0".to_string());
        }
        Ok(())
    }
}

/// Background fill requested for a layer when the active output is not alpha-capable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundMode {
    Transparent,
    Green,
    Black,
    White,
}

impl BackgroundMode {
    /// RGB fill color per `spec.md` §4.10's fallback table.
    pub fn rgb(self) -> (u8, u8, u8) {
        match self {
            BackgroundMode::Transparent => (0, 0, 0),
            BackgroundMode::Green => (0, 255, 0),
            BackgroundMode::Black => (0, 0, 0),
            BackgroundMode::White => (255, 255, 255),
        }
    }
}

/// A single premultiplied RGBA frame tied to one layer.
#[derive(Clone, Debug)]
pub struct RgbaFrame {
    pub layer_id: String,
    pub buffer: Vec<u8>,
}

/// A sanitized, validated template ready to be rendered.
#[derive(Clone, Debug)]
pub struct TemplateBundle {
    pub manifest: TemplateManifest,
    pub html: String,
    pub css: String,
    pub schema: serde_json::Value,
    pub defaults: BTreeMap<String, serde_json::Value>,
    pub assets: Vec<BundleAsset>,
}

/// The subset of a template's manifest the core inspects.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TemplateManifest {
    #[serde(default)]
    pub render: Option<ManifestRenderHint>,
}

/// Declared render target hints a bundle's manifest may assert.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ManifestRenderHint {
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub fps: Option<u32>,
}

/// An asset payload carried inline in a `graphics.send` bundle.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleAsset {
    pub asset_id: String,
    pub name: String,
    pub mime: String,
    /// Base64-encoded payload, optionally prefixed with a `base64,` data-URL preamble.
    #[serde(default)]
    pub data_base64: Option<String>,
}

/// One on-air graphic element: template, values, layout, Z-order, and last-rendered frame.
#[derive(Clone, Debug)]
pub struct Layer {
    pub layer_id: String,
    pub category: Category,
    pub layout: Layout,
    pub z_index: i32,
    pub background_mode: BackgroundMode,
    pub values: BTreeMap<String, serde_json::Value>,
    pub bindings: DerivedBindings,
    pub schema: serde_json::Value,
    pub defaults: BTreeMap<String, serde_json::Value>,
    pub preset_id: Option<String>,
    pub last_frame: Option<RgbaFrame>,
}

#[cfg(test)]
#[path = "../tests/unit/model.rs"]
mod tests;
