//! Core state machine, compositor and output transition engine for an HTML/CSS broadcast
//! overlay graphics system.
//!
//! An [`manager::facade::GraphicsManager`] owns a single worker thread that serializes every
//! command (configure outputs, send/update/remove a layer, arm/clear a preset) and drives the
//! per-output cadence tick that composites active layers and pushes the result to an
//! [`output::adapter::OutputAdapter`]. Layer content itself is rendered out-of-process by a
//! supervised HTML/CSS [`renderer::client::RendererClient`]; this crate never renders DOM itself.

mod assets;
mod compositor;
mod foundation;
mod manager;
mod model;
mod output;
mod preset;
mod renderer;
mod sanitizer;

pub use foundation::error::{GraphicsError, GraphicsResult};
pub use manager::facade::{
    ActivePresetStatus, ConfigureOutputsPayload, GraphicsEvent, GraphicsManager,
    GraphicsManagerOpts, LayerStatus, RemoveLayerPayload, RemovePresetPayload, SendLayerPayload,
    StatusSnapshot, UpdateLayoutPayload, UpdateValuesPayload,
};
pub use model::{
    BackgroundMode, BundleAsset, Category, Layer, Layout, ManifestRenderHint, RgbaFrame,
    TemplateBundle, TemplateManifest,
};
pub use output::adapter::OutputFrame;
pub use output::config::{Colorspace, OutputConfig, OutputFormat, OutputKey, OutputTargets, VideoRange};
pub use renderer::client::{RendererClientOpts, RendererEvent};
