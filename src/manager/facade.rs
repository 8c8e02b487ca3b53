//! `GraphicsManagerOpts`, the single-worker-thread `Engine`, and the public `GraphicsManager`
//! facade (`spec.md` §4.10, §5, §6).
//!
//! Facade shape — constructed from validated input, holds derived/normalized state, exposes a
//! small set of operations that each validate before mutating — grounded on the teacher's
//! `session::render_session::RenderSession`. The concurrency realization (one worker thread
//! draining a single `mpsc::Receiver<EngineMsg>`, a cadence ticker thread guarded by an
//! `AtomicBool` single-flight flag, `std::thread::spawn` preset-expiry sleepers compared by
//! generation) is this crate's own std-only rendering of spec.md §5's "single logical
//! task-serial core", since the teacher corpus never reaches for `tokio`.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::assets::registry::AssetRegistry;
use crate::compositor::{apply_background, composite_layers, expected_buffer_len, layers_from_frames};
use crate::foundation::error::{GraphicsError, GraphicsResult};
use crate::foundation::log_throttle::LogThrottle;
use crate::foundation::math::tick_interval_ms;
use crate::foundation::time::now_ms;
use crate::manager::layer::LayerMap;
use crate::model::{
    BackgroundMode, BundleAsset, Category, Layer, Layout, ManifestRenderHint, RgbaFrame,
    TemplateBundle, TemplateManifest,
};
use crate::output::adapter::OutputFrame;
use crate::output::config::{Colorspace, OutputConfig, OutputFormat, OutputKey, OutputTargets, VideoRange};
use crate::output::transition::OutputTransitionService;
use crate::preset::{ArmedTimer, PresetArrival, PresetService, PresetSnapshot};
use crate::renderer::client::{RenderLayerRequest, RendererClient, RendererClientOpts, RendererEvent};
use crate::sanitizer::bindings::derive_bindings;
use crate::sanitizer::template::{sanitize_css, validate_template};

const TICK_LOG_OK: &str = "tick_ok";
const TICK_LOG_ERR: &str = "tick_err";

/// Construction options for [`GraphicsManager`], modeled on the teacher's `RenderSessionOpts`.
#[derive(Clone, Debug)]
pub struct GraphicsManagerOpts {
    /// Root of the user-data directory; `graphics/` and `graphics-assets/` are created under it.
    pub data_dir: PathBuf,
    /// Renderer subprocess command, handshake token, and connection timeouts.
    pub renderer: RendererClientOpts,
    /// How often a given tick-loop log class may repeat (`spec.md` §4.10 cadence step).
    pub tick_log_window: Duration,
}

impl Default for GraphicsManagerOpts {
    fn default() -> Self {
        Self {
            data_dir: std::env::temp_dir().join("overlay-gfx"),
            renderer: RendererClientOpts::default(),
            tick_log_window: Duration::from_secs(5),
        }
    }
}

/// `graphics.configureOutputs` command payload (`spec.md` §6).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigureOutputsPayload {
    #[serde(default)]
    pub version: Option<u32>,
    pub output_key: OutputKey,
    #[serde(default)]
    pub targets: OutputTargets,
    pub format: OutputFormat,
    #[serde(default)]
    pub range: VideoRange,
    #[serde(default)]
    pub colorspace: Colorspace,
}

/// `graphics.send` command payload (`spec.md` §3, §6).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SendLayerPayload {
    pub layer_id: String,
    pub category: Category,
    pub layout: Layout,
    #[serde(default)]
    pub z_index: i32,
    pub background_mode: BackgroundMode,
    #[serde(default)]
    pub preset_id: Option<String>,
    #[serde(default)]
    pub duration_ms: Option<u32>,
    #[serde(default)]
    pub values: serde_json::Map<String, Value>,
    #[serde(default)]
    pub manifest: TemplateManifest,
    pub html: String,
    pub css: String,
    #[serde(default)]
    pub schema: Value,
    #[serde(default)]
    pub defaults: serde_json::Map<String, Value>,
    #[serde(default)]
    pub assets: Vec<BundleAsset>,
}

/// `graphics.updateValues` command payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateValuesPayload {
    pub layer_id: String,
    #[serde(default)]
    pub values: serde_json::Map<String, Value>,
}

/// `graphics.updateLayout` command payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateLayoutPayload {
    pub layer_id: String,
    pub layout: Layout,
    #[serde(default)]
    pub z_index: Option<i32>,
}

/// `graphics.remove` command payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RemoveLayerPayload {
    pub layer_id: String,
}

/// `graphics.removePreset` command payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RemovePresetPayload {
    pub preset_id: String,
    #[serde(default)]
    pub clear_queue: bool,
}

/// `graphics.list`/`getStatus` response (`spec.md` §6).
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub output_config: Option<OutputConfig>,
    pub layers: Vec<LayerStatus>,
    pub active_preset: Option<ActivePresetStatus>,
    pub active_presets: Vec<ActivePresetStatus>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerStatus {
    pub layer_id: String,
    pub category: Category,
    pub z_index: i32,
    pub preset_id: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivePresetStatus {
    pub preset_id: String,
    pub duration_ms: Option<u32>,
    pub layer_ids: Vec<String>,
    pub started_at: Option<u64>,
    pub expires_at: Option<u64>,
}

impl From<PresetSnapshot> for ActivePresetStatus {
    fn from(snapshot: PresetSnapshot) -> Self {
        let mut layer_ids: Vec<String> = snapshot.layer_ids.into_iter().collect();
        layer_ids.sort();
        Self {
            preset_id: snapshot.preset_id,
            duration_ms: snapshot.duration_ms,
            layer_ids,
            started_at: snapshot.started_at,
            expires_at: snapshot.expires_at,
        }
    }
}

/// Fan-out events observers receive via [`GraphicsManager::subscribe`] (`spec.md` §6).
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type")]
pub enum GraphicsEvent {
    #[serde(rename = "graphics_status", rename_all = "camelCase")]
    Status {
        reason: &'static str,
        active_preset: Option<ActivePresetStatus>,
        active_presets: Vec<ActivePresetStatus>,
    },
    #[serde(rename = "graphics_error", rename_all = "camelCase")]
    Error { code: String, message: String },
}

type Reply = mpsc::Sender<GraphicsResult<()>>;

enum EngineMsg {
    ConfigureOutputs(ConfigureOutputsPayload, Reply),
    SendLayer(Box<SendLayerPayload>, Reply),
    UpdateValues(UpdateValuesPayload, Reply),
    UpdateLayout(UpdateLayoutPayload, Reply),
    RemoveLayer(RemoveLayerPayload, Reply),
    RemovePreset(RemovePresetPayload, Reply),
    ClearAll(Reply),
    SendTestPattern(Reply),
    GetStatus(mpsc::Sender<GraphicsResult<StatusSnapshot>>),
    Subscribe(mpsc::Sender<GraphicsEvent>),
    Tick,
    RendererEvent(RendererEvent),
    PresetExpired(u64),
    Shutdown,
}

struct Cadence {
    stop: Arc<AtomicBool>,
    sending: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Runs on the single worker thread; owns every piece of mutable state in §5's "task-serial core".
struct Engine {
    layers: LayerMap,
    presets: PresetService,
    transitions: OutputTransitionService,
    renderer: RendererClient,
    assets: AssetRegistry,
    tick_log: LogThrottle,
    cadence: Option<Cadence>,
    dropped_frames: Arc<AtomicU64>,
    self_tx: mpsc::Sender<EngineMsg>,
    event_relay: Option<JoinHandle<()>>,
    observers: Vec<mpsc::Sender<GraphicsEvent>>,
}

impl Engine {
    fn new(
        opts: GraphicsManagerOpts,
        self_tx: mpsc::Sender<EngineMsg>,
        dropped_frames: Arc<AtomicU64>,
    ) -> GraphicsResult<Self> {
        let graphics_dir = opts.data_dir.join("graphics");
        let assets_dir = opts.data_dir.join("graphics-assets");

        let mut assets = AssetRegistry::new(assets_dir);
        assets.initialize()?;

        let (renderer_events_tx, renderer_events_rx) = mpsc::channel();
        let renderer = RendererClient::new(opts.renderer.clone(), renderer_events_tx);

        let relay_tx = self_tx.clone();
        let event_relay = std::thread::spawn(move || {
            for event in renderer_events_rx {
                if relay_tx.send(EngineMsg::RendererEvent(event)).is_err() {
                    break;
                }
            }
        });

        let transitions = OutputTransitionService::new(graphics_dir);

        let mut engine = Self {
            layers: LayerMap::new(),
            presets: PresetService::new(),
            transitions,
            renderer,
            assets,
            tick_log: LogThrottle::new(opts.tick_log_window),
            cadence: None,
            dropped_frames,
            self_tx,
            event_relay: Some(event_relay),
            observers: Vec::new(),
        };

        engine.transitions.initialize(&mut engine.renderer)?;
        if let Some(runtime) = engine.transitions.runtime() {
            let fps = runtime.config.format.fps;
            engine.restart_cadence(fps);
        }

        Ok(engine)
    }

    fn run(mut self, rx: mpsc::Receiver<EngineMsg>) {
        while let Ok(msg) = rx.recv() {
            if matches!(msg, EngineMsg::Shutdown) {
                break;
            }
            self.handle(msg);
        }
        self.stop_cadence();
        drop(self.renderer);
        if let Some(handle) = self.event_relay.take() {
            let _ = handle.join();
        }
    }

    fn handle(&mut self, msg: EngineMsg) {
        match msg {
            EngineMsg::ConfigureOutputs(payload, reply) => {
                let _ = reply.send(self.handle_configure_outputs(payload));
            }
            EngineMsg::SendLayer(payload, reply) => {
                let _ = reply.send(self.handle_send_layer(*payload));
            }
            EngineMsg::UpdateValues(payload, reply) => {
                let _ = reply.send(self.handle_update_values(payload));
            }
            EngineMsg::UpdateLayout(payload, reply) => {
                let _ = reply.send(self.handle_update_layout(payload));
            }
            EngineMsg::RemoveLayer(payload, reply) => {
                let _ = reply.send(self.handle_remove_layer(payload));
            }
            EngineMsg::RemovePreset(payload, reply) => {
                let _ = reply.send(self.handle_remove_preset(payload));
            }
            EngineMsg::ClearAll(reply) => {
                let _ = reply.send(self.handle_clear_all());
            }
            EngineMsg::SendTestPattern(reply) => {
                let _ = reply.send(self.handle_send_test_pattern());
            }
            EngineMsg::GetStatus(reply) => {
                let _ = reply.send(Ok(self.handle_get_status()));
            }
            EngineMsg::Subscribe(tx) => {
                self.observers.push(tx);
            }
            EngineMsg::Tick => {
                let result = self.run_tick();
                self.log_tick_result(&result);
                if let Some(cadence) = &self.cadence {
                    cadence.sending.store(false, Ordering::Release);
                }
            }
            EngineMsg::RendererEvent(event) => self.handle_renderer_event(event),
            EngineMsg::PresetExpired(generation) => self.handle_preset_expired(generation),
            EngineMsg::Shutdown => unreachable!("handled in run()"),
        }
    }

    fn restart_cadence(&mut self, fps: u32) {
        self.stop_cadence();
        let interval_ms = tick_interval_ms(fps);
        let stop = Arc::new(AtomicBool::new(false));
        let sending = Arc::new(AtomicBool::new(false));
        let dropped = Arc::clone(&self.dropped_frames);
        let tx = self.self_tx.clone();
        let stop_thread = Arc::clone(&stop);
        let sending_thread = Arc::clone(&sending);

        let handle = std::thread::spawn(move || {
            while !stop_thread.load(Ordering::Acquire) {
                std::thread::sleep(Duration::from_millis(interval_ms));
                if stop_thread.load(Ordering::Acquire) {
                    break;
                }
                if sending_thread.swap(true, Ordering::AcqRel) {
                    dropped.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
                if tx.send(EngineMsg::Tick).is_err() {
                    break;
                }
            }
        });

        self.cadence = Some(Cadence { stop, sending, handle });
    }

    fn stop_cadence(&mut self) {
        if let Some(cadence) = self.cadence.take() {
            cadence.stop.store(true, Ordering::Release);
            let _ = cadence.handle.join();
        }
    }

    fn spawn_preset_timer(&self, timer: ArmedTimer) {
        let tx = self.self_tx.clone();
        let delay_ms = timer.expires_at.saturating_sub(now_ms());
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(delay_ms));
            let _ = tx.send(EngineMsg::PresetExpired(timer.generation));
        });
    }

    fn handle_configure_outputs(&mut self, payload: ConfigureOutputsPayload) -> GraphicsResult<()> {
        validate_targets_for_output_key(payload.output_key, &payload.targets)?;

        let fps = payload.format.fps;
        let config = OutputConfig {
            version: payload.version.unwrap_or(crate::output::config::CURRENT_VERSION),
            output_key: payload.output_key,
            targets: payload.targets,
            format: payload.format,
            range: payload.range,
            colorspace: payload.colorspace,
        };
        if let Err(e) = self.transitions.apply(config, &mut self.renderer) {
            self.maybe_emit_error(&e);
            return Err(e);
        }
        self.restart_cadence(fps);
        Ok(())
    }

    /// The full `sendLayer` pipeline (`spec.md` §4.10, steps numbered in comments below).
    fn handle_send_layer(&mut self, payload: SendLayerPayload) -> GraphicsResult<()> {
        // 1. Reject if outputs are not configured.
        let Some(runtime) = self.transitions.runtime() else {
            return Err(GraphicsError::NotConfigured);
        };
        let format = runtime.config.format;
        let alpha_capable = runtime.config.output_key.is_alpha_capable();

        // 2. Reject durationMs without presetId.
        if payload.duration_ms.is_some() && payload.preset_id.is_none() {
            return Err(GraphicsError::invalid_payload(
                "durationMs may only be supplied alongside presetId",
            ));
        }

        // 3. Manifest render hint must match the active format exactly, if present.
        check_render_hint(&payload.manifest.render, format)?;

        // 4. Sanitize CSS; validate HTML+CSS; extract referenced asset ids.
        let sanitized_css = sanitize_css(&payload.css);
        let referenced_assets = validate_template(&payload.html, &sanitized_css)?;

        let defaults: BTreeMap<String, Value> = payload.defaults.into_iter().collect();
        let bundle = TemplateBundle {
            manifest: payload.manifest,
            html: payload.html,
            css: sanitized_css,
            schema: payload.schema,
            defaults,
            assets: payload.assets,
        };

        // 5. Store every asset in the payload; every referenced id must resolve afterwards.
        for asset in &bundle.assets {
            self.assets.store_asset(asset)?;
        }
        for asset_id in &referenced_assets {
            if self.assets.get_asset(asset_id).is_none() {
                return Err(GraphicsError::AssetNotFound(asset_id.clone()));
            }
        }

        // 6. Push the resolved asset map to the renderer.
        self.renderer.set_assets(&self.assets.asset_map())?;

        // 7. Alpha-capable outputs force transparent background.
        let background_mode = if alpha_capable {
            BackgroundMode::Transparent
        } else {
            payload.background_mode
        };

        // 8. Compute initial values (defaults ∘ values) and derive bindings.
        let submitted_values: BTreeMap<String, Value> = payload.values.into_iter().collect();
        let mut merged_values = bundle.defaults.clone();
        for (key, value) in &submitted_values {
            if !value.is_null() {
                merged_values.insert(key.clone(), value.clone());
            }
        }
        let bindings = derive_bindings(&bundle.schema, &merged_values, &bundle.defaults);

        // 9. Preset compatibility: remove any conflicting preset's layers.
        let arrival = self.presets.on_layer_send(
            &payload.layer_id,
            payload.preset_id.as_deref(),
            payload.duration_ms,
        );
        if let PresetArrival::Replaced { removed_layer_ids } = arrival {
            for id in removed_layer_ids {
                self.layers.remove(&id);
                let _ = self.renderer.remove_layer(&id);
            }
        }

        // 10. Validate layer limits.
        if let Err(e) = self.layers.check_limits(&payload.layer_id, payload.category) {
            self.presets.on_layer_removed(&payload.layer_id);
            return Err(GraphicsError::layer_limit(e));
        }

        // 11. Commit, preserving any prior lastFrame; revert on renderer failure.
        let previous = self.layers.get(&payload.layer_id).cloned();
        let values_json = Value::Object(merged_values.clone().into_iter().collect());
        let new_layer = Layer {
            layer_id: payload.layer_id.clone(),
            category: payload.category,
            layout: payload.layout,
            z_index: payload.z_index,
            background_mode,
            values: merged_values,
            bindings: bindings.clone(),
            schema: bundle.schema.clone(),
            defaults: bundle.defaults.clone(),
            preset_id: payload.preset_id.clone(),
            last_frame: None,
        };
        self.layers.commit(new_layer);

        let render_result = self.renderer.render_layer(RenderLayerRequest {
            layer_id: &payload.layer_id,
            html: &bundle.html,
            css: &bundle.css,
            values: &values_json,
            bindings: &bindings,
            layout: payload.layout,
            background_mode,
            width: format.width,
            height: format.height,
            fps: format.fps,
            z_index: payload.z_index,
        });

        if let Err(e) = render_result {
            match previous {
                Some(prev) => self.layers.commit(prev),
                None => {
                    self.layers.remove(&payload.layer_id);
                }
            }
            // 12. Sync post-render preset state: undo the speculative join from step 9.
            self.presets.on_layer_removed(&payload.layer_id);
            self.maybe_emit_error(&e);
            return Err(e);
        }

        Ok(())
    }

    fn handle_update_values(&mut self, payload: UpdateValuesPayload) -> GraphicsResult<()> {
        let Some(layer) = self.layers.get(&payload.layer_id) else {
            return Err(GraphicsError::invalid_payload(format!(
                "unknown layer '{}'",
                payload.layer_id
            )));
        };
        let mut merged_values = layer.values.clone();
        for (key, value) in payload.values {
            if value.is_null() {
                merged_values.remove(&key);
            } else {
                merged_values.insert(key, value);
            }
        }
        let bindings = derive_bindings(&layer.schema, &merged_values, &layer.defaults);
        let values_json = Value::Object(merged_values.clone().into_iter().collect());
        self.renderer
            .update_values(&payload.layer_id, &values_json, &bindings)?;

        let layer = self
            .layers
            .get_mut(&payload.layer_id)
            .expect("checked present above");
        layer.values = merged_values;
        layer.bindings = bindings;
        Ok(())
    }

    fn handle_update_layout(&mut self, payload: UpdateLayoutPayload) -> GraphicsResult<()> {
        payload.layout.validate().map_err(GraphicsError::invalid_payload)?;
        if !self.layers.contains(&payload.layer_id) {
            return Err(GraphicsError::invalid_payload(format!(
                "unknown layer '{}'",
                payload.layer_id
            )));
        }
        self.renderer.update_layout(&payload.layer_id, payload.layout)?;

        let layer = self
            .layers
            .get_mut(&payload.layer_id)
            .expect("checked present above");
        layer.layout = payload.layout;
        if let Some(z_index) = payload.z_index {
            layer.z_index = z_index;
        }
        Ok(())
    }

    fn handle_remove_layer(&mut self, payload: RemoveLayerPayload) -> GraphicsResult<()> {
        if self.layers.remove(&payload.layer_id).is_some() {
            self.presets.on_layer_removed(&payload.layer_id);
            let _ = self.renderer.remove_layer(&payload.layer_id);
        }
        Ok(())
    }

    fn handle_remove_preset(&mut self, payload: RemovePresetPayload) -> GraphicsResult<()> {
        let Some(snapshot) = self.presets.snapshot() else {
            return Ok(());
        };
        if snapshot.preset_id != payload.preset_id {
            return Ok(());
        }
        // No separate pending queue exists beyond the single active slot; `clearQueue` has
        // nothing further to clear.
        let _ = payload.clear_queue;

        self.presets.remove_preset();
        for layer_id in snapshot.layer_ids {
            self.layers.remove(&layer_id);
            let _ = self.renderer.remove_layer(&layer_id);
        }
        Ok(())
    }

    /// `clearAll` (`spec.md` §4.8): removes every layer, clears the preset slot, and publishes a
    /// `clear_all_layers` status event.
    fn handle_clear_all(&mut self) -> GraphicsResult<()> {
        let layer_ids: Vec<String> = self.layers.values().map(|l| l.layer_id.clone()).collect();
        for layer_id in layer_ids {
            self.layers.remove(&layer_id);
            let _ = self.renderer.remove_layer(&layer_id);
        }
        self.presets.clear_all();
        self.emit_status("clear_all_layers");
        Ok(())
    }

    fn handle_send_test_pattern(&mut self) -> GraphicsResult<()> {
        let Some(runtime) = self.transitions.runtime() else {
            return Err(GraphicsError::NotConfigured);
        };
        let format = runtime.config.format;
        let buffer = test_pattern_buffer(format.width, format.height);
        self.transitions.send_frame(OutputFrame {
            width: format.width,
            height: format.height,
            rgba: &buffer,
            timestamp_ms: now_ms(),
        })
    }

    fn handle_get_status(&self) -> StatusSnapshot {
        let output_config = self.transitions.runtime().map(|r| r.config.clone());
        let mut layers: Vec<LayerStatus> = self
            .layers
            .values()
            .map(|l| LayerStatus {
                layer_id: l.layer_id.clone(),
                category: l.category,
                z_index: l.z_index,
                preset_id: l.preset_id.clone(),
            })
            .collect();
        layers.sort_by(|a, b| a.layer_id.cmp(&b.layer_id));

        let (active_preset, active_presets) = self.preset_status();

        StatusSnapshot {
            output_config,
            layers,
            active_preset,
            active_presets,
        }
    }

    /// Shared active-preset DTO computation, used by both `getStatus` and status-event fan-out.
    fn preset_status(&self) -> (Option<ActivePresetStatus>, Vec<ActivePresetStatus>) {
        let active_preset = self.presets.snapshot().map(ActivePresetStatus::from);
        let active_presets = active_preset.clone().into_iter().collect();
        (active_preset, active_presets)
    }

    /// Push `event` to every live observer, pruning any whose receiver has been dropped.
    fn emit_event(&mut self, event: GraphicsEvent) {
        self.observers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Build and emit a `graphics_status` event for `reason` (`spec.md` §6).
    fn emit_status(&mut self, reason: &'static str) {
        let (active_preset, active_presets) = self.preset_status();
        self.emit_event(GraphicsEvent::Status {
            reason,
            active_preset,
            active_presets,
        });
    }

    /// Emit a `graphics_error` event for `err` if its kind is fan-out eligible (`spec.md` §6).
    fn maybe_emit_error(&mut self, err: &GraphicsError) {
        if let Some(code) = err.event_code() {
            self.emit_event(GraphicsEvent::Error {
                code: code.to_string(),
                message: err.to_string(),
            });
        }
    }

    fn handle_renderer_event(&mut self, event: RendererEvent) {
        match event {
            RendererEvent::Frame {
                layer_id,
                width,
                height,
                rgba,
            } => {
                if rgba.len() != expected_buffer_len(width, height) {
                    tracing::warn!(layer_id = %layer_id, "discarding frame with unexpected buffer length");
                    return;
                }
                self.layers.set_last_frame(
                    &layer_id.clone(),
                    RgbaFrame {
                        layer_id,
                        buffer: rgba,
                    },
                );
            }
            RendererEvent::Error(message) => {
                tracing::warn!(message = %message, "renderer reported an error");
                self.emit_event(GraphicsEvent::Error {
                    code: "renderer_error".to_string(),
                    message,
                });
            }
            RendererEvent::Disconnected => {
                tracing::warn!("renderer disconnected");
                self.emit_event(GraphicsEvent::Error {
                    code: "renderer_error".to_string(),
                    message: "renderer disconnected".to_string(),
                });
            }
        }
    }

    fn handle_preset_expired(&mut self, generation: u64) {
        let layer_ids = self
            .presets
            .snapshot()
            .filter(|s| s.generation == Some(generation))
            .map(|s| s.layer_ids);
        if self.presets.on_timer_expired(generation) {
            if let Some(layer_ids) = layer_ids {
                for id in layer_ids {
                    self.layers.remove(&id);
                    let _ = self.renderer.remove_layer(&id);
                }
            }
            self.emit_status("preset_removed");
        }
    }

    /// Cadence tick (`spec.md` §4.10).
    fn run_tick(&mut self) -> GraphicsResult<()> {
        let Some(runtime) = self.transitions.runtime() else {
            return Ok(());
        };
        let format = runtime.config.format;
        let alpha_capable = runtime.config.output_key.is_alpha_capable();

        let snapshot = self.layers.snapshot_for_compositing();
        if snapshot.is_empty() {
            return Ok(());
        }

        let ticked_ids: std::collections::HashSet<String> =
            snapshot.iter().map(|l| l.layer_id.clone()).collect();
        let bottom_mode = snapshot[0].background_mode;
        let frames: Vec<(i32, &RgbaFrame)> = snapshot
            .iter()
            .map(|l| {
                (
                    l.z_index,
                    l.last_frame
                        .as_ref()
                        .expect("snapshot_for_compositing only includes layers with a frame"),
                )
            })
            .collect();
        let composite_inputs = layers_from_frames(&frames);
        let mut buffer = composite_layers(&composite_inputs, format.width, format.height);
        if !alpha_capable {
            apply_background(&mut buffer, bottom_mode.rgb());
        }

        self.transitions.send_frame(OutputFrame {
            width: format.width,
            height: format.height,
            rgba: &buffer,
            timestamp_ms: now_ms(),
        })?;

        if let Some(timer) = self.presets.note_tick_layers(&ticked_ids, now_ms()) {
            self.spawn_preset_timer(timer);
        }
        Ok(())
    }

    fn log_tick_result(&mut self, result: &GraphicsResult<()>) {
        match result {
            Ok(()) => {
                if self.tick_log.allow(TICK_LOG_OK) {
                    tracing::debug!("cadence tick delivered");
                }
            }
            Err(e) => {
                if self.tick_log.allow(TICK_LOG_ERR) {
                    tracing::warn!(error = %e, "cadence tick failed");
                }
                self.maybe_emit_error(e);
            }
        }
    }
}

fn check_render_hint(hint: &Option<ManifestRenderHint>, format: OutputFormat) -> GraphicsResult<()> {
    let Some(hint) = hint else {
        return Ok(());
    };
    if let Some(width) = hint.width {
        if width != format.width {
            return Err(GraphicsError::format_mismatch(format!(
                "manifest width {width} != active format width {}",
                format.width
            )));
        }
    }
    if let Some(height) = hint.height {
        if height != format.height {
            return Err(GraphicsError::format_mismatch(format!(
                "manifest height {height} != active format height {}",
                format.height
            )));
        }
    }
    if let Some(fps) = hint.fps {
        if fps != format.fps {
            return Err(GraphicsError::format_mismatch(format!(
                "manifest fps {fps} != active format fps {}",
                format.fps
            )));
        }
    }
    Ok(())
}

/// Validate `targets` against the structural requirements `spec.md` §6 lists per `outputKey`.
///
/// Device/port-role resolution (e.g. "must be SDI ports on the same device") is display-mode
/// enumeration, out of this crate's scope; only field presence and the dual-lane distinctness
/// rule are checked here.
fn validate_targets_for_output_key(key: OutputKey, targets: &OutputTargets) -> GraphicsResult<()> {
    match key {
        OutputKey::KeyFillSdi | OutputKey::KeyFillSplitSdi => {
            let (Some(a), Some(b)) = (&targets.output1_id, &targets.output2_id) else {
                return Err(GraphicsError::invalid_payload(
                    "output1Id and output2Id are both required for a dual-lane output",
                ));
            };
            if a == b {
                return Err(GraphicsError::invalid_payload(
                    "output1Id and output2Id must differ for a dual-lane output",
                ));
            }
        }
        OutputKey::VideoSdi | OutputKey::VideoHdmi => {
            if targets.output1_id.is_none() {
                return Err(GraphicsError::invalid_payload(
                    "output1Id is required for this output",
                ));
            }
        }
        OutputKey::KeyFillNdi => {
            if targets.ndi_stream_name.is_none() {
                return Err(GraphicsError::invalid_payload(
                    "ndiStreamName is required for key_fill_ndi",
                ));
            }
        }
        OutputKey::Stub => {}
    }
    Ok(())
}

/// An 8-bar SMPTE-style color test pattern, opaque premultiplied RGBA8.
fn test_pattern_buffer(width: u32, height: u32) -> Vec<u8> {
    const BARS: [[u8; 3]; 8] = [
        [255, 255, 255],
        [255, 255, 0],
        [0, 255, 255],
        [0, 255, 0],
        [255, 0, 255],
        [255, 0, 0],
        [0, 0, 255],
        [0, 0, 0],
    ];
    let mut buffer = vec![0u8; expected_buffer_len(width, height)];
    let bar_width = (width as usize / BARS.len()).max(1);
    for y in 0..height as usize {
        for x in 0..width as usize {
            let bar = (x / bar_width).min(BARS.len() - 1);
            let [r, g, b] = BARS[bar];
            let idx = (y * width as usize + x) * 4;
            buffer[idx] = r;
            buffer[idx + 1] = g;
            buffer[idx + 2] = b;
            buffer[idx + 3] = 255;
        }
    }
    buffer
}

/// The graphics engine facade: construct once, call its operations from any thread.
pub struct GraphicsManager {
    tx: mpsc::Sender<EngineMsg>,
    worker: Option<JoinHandle<()>>,
    dropped_frames: Arc<AtomicU64>,
}

impl GraphicsManager {
    /// Construct and initialize the manager: brings the output runtime up to match any
    /// persisted configuration and starts its worker thread (`spec.md` §4.10 `initialize`).
    pub fn new(opts: GraphicsManagerOpts) -> GraphicsResult<Self> {
        let (tx, rx) = mpsc::channel();
        let dropped_frames = Arc::new(AtomicU64::new(0));
        let engine = Engine::new(opts, tx.clone(), Arc::clone(&dropped_frames))?;
        let worker = std::thread::spawn(move || engine.run(rx));
        Ok(Self {
            tx,
            worker: Some(worker),
            dropped_frames,
        })
    }

    pub fn configure_outputs(&self, payload: Value) -> GraphicsResult<()> {
        let payload: ConfigureOutputsPayload = serde_json::from_value(payload)
            .map_err(|e| GraphicsError::invalid_payload(e.to_string()))?;
        self.call(|reply| EngineMsg::ConfigureOutputs(payload, reply))
    }

    pub fn send_layer(&self, payload: Value) -> GraphicsResult<()> {
        let payload: SendLayerPayload = serde_json::from_value(payload)
            .map_err(|e| GraphicsError::invalid_payload(e.to_string()))?;
        self.call(|reply| EngineMsg::SendLayer(Box::new(payload), reply))
    }

    pub fn update_values(&self, payload: Value) -> GraphicsResult<()> {
        let payload: UpdateValuesPayload = serde_json::from_value(payload)
            .map_err(|e| GraphicsError::invalid_payload(e.to_string()))?;
        self.call(|reply| EngineMsg::UpdateValues(payload, reply))
    }

    pub fn update_layout(&self, payload: Value) -> GraphicsResult<()> {
        let payload: UpdateLayoutPayload = serde_json::from_value(payload)
            .map_err(|e| GraphicsError::invalid_payload(e.to_string()))?;
        self.call(|reply| EngineMsg::UpdateLayout(payload, reply))
    }

    pub fn remove_layer(&self, payload: Value) -> GraphicsResult<()> {
        let payload: RemoveLayerPayload = serde_json::from_value(payload)
            .map_err(|e| GraphicsError::invalid_payload(e.to_string()))?;
        self.call(|reply| EngineMsg::RemoveLayer(payload, reply))
    }

    pub fn remove_preset(&self, payload: Value) -> GraphicsResult<()> {
        let payload: RemovePresetPayload = serde_json::from_value(payload)
            .map_err(|e| GraphicsError::invalid_payload(e.to_string()))?;
        self.call(|reply| EngineMsg::RemovePreset(payload, reply))
    }

    /// `clearAll` (`spec.md` §4.8): remove every layer and the preset slot in one call.
    pub fn clear_all(&self) -> GraphicsResult<()> {
        self.call(EngineMsg::ClearAll)
    }

    /// Subscribe to `graphics_status`/`graphics_error` events (`spec.md` §6). Registration is
    /// fire-and-forget: the returned receiver starts observing as soon as the worker thread
    /// drains the subscribe message.
    pub fn subscribe(&self) -> GraphicsResult<mpsc::Receiver<GraphicsEvent>> {
        let (tx, rx) = mpsc::channel();
        self.tx
            .send(EngineMsg::Subscribe(tx))
            .map_err(|_| unavailable())?;
        Ok(rx)
    }

    pub fn send_test_pattern(&self) -> GraphicsResult<()> {
        self.call(EngineMsg::SendTestPattern)
    }

    pub fn get_status(&self) -> GraphicsResult<StatusSnapshot> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.tx
            .send(EngineMsg::GetStatus(reply_tx))
            .map_err(|_| unavailable())?;
        reply_rx.recv().map_err(|_| unavailable())?
    }

    /// Ticks dropped because a previous tick was still in flight (`spec.md` §5 backpressure).
    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }

    fn call<F>(&self, build: F) -> GraphicsResult<()>
    where
        F: FnOnce(Reply) -> EngineMsg,
    {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.tx.send(build(reply_tx)).map_err(|_| unavailable())?;
        reply_rx.recv().map_err(|_| unavailable())?
    }
}

impl Drop for GraphicsManager {
    fn drop(&mut self) {
        let _ = self.tx.send(EngineMsg::Shutdown);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

fn unavailable() -> GraphicsError {
    anyhow::anyhow!("graphics engine worker is no longer running").into()
}

#[cfg(test)]
#[path = "../../tests/unit/manager/facade.rs"]
mod tests;
