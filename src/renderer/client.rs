//! Subprocess-backed renderer session (`spec.md` §4.6).
//!
//! Spawns and supervises the external HTML renderer, grounded on the teacher's `FfmpegSink`
//! subprocess pattern (`encode::ffmpeg::FfmpegSink`): a child process, a stderr-drain thread, and
//! here additionally a loopback TCP connection plus a dedicated frame-reader thread, since the
//! renderer talks back over the socket rather than only being written to.

use std::collections::BTreeMap;
use std::io::{Read, Write as _};
use std::net::TcpStream;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::foundation::error::{GraphicsError, GraphicsResult};
use crate::model::{BackgroundMode, Layout};
use crate::output::config::FrameBusConfig;
use crate::output::transition::RendererSession;
use crate::renderer::protocol::{read_frame, write_frame};
use crate::sanitizer::bindings::DerivedBindings;

/// Events the renderer delivers asynchronously, consumed by the graphics manager's worker thread.
#[derive(Debug)]
pub enum RendererEvent {
    Frame {
        layer_id: String,
        width: u32,
        height: u32,
        rgba: Vec<u8>,
    },
    Error(String),
    Disconnected,
}

/// Construction options for [`RendererClient`].
#[derive(Clone, Debug)]
pub struct RendererClientOpts {
    pub renderer_binary: String,
    pub host: String,
    pub port: u16,
    pub handshake_token: String,
    pub connect_timeout: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RendererClientOpts {
    fn default() -> Self {
        Self {
            renderer_binary: std::env::var("OVERLAY_GFX_RENDERER_BINARY")
                .unwrap_or_else(|_| "gfx-renderer-host".to_string()),
            host: "127.0.0.1".to_string(),
            port: 47631,
            handshake_token: std::env::var("OVERLAY_GFX_RENDERER_TOKEN").unwrap_or_default(),
            connect_timeout: Duration::from_secs(5),
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(10),
        }
    }
}

/// One pending layer render request, mirroring `spec.md` §4.6's `render_layer` command.
pub struct RenderLayerRequest<'a> {
    pub layer_id: &'a str,
    pub html: &'a str,
    pub css: &'a str,
    pub values: &'a serde_json::Value,
    pub bindings: &'a DerivedBindings,
    pub layout: Layout,
    pub background_mode: BackgroundMode,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub z_index: i32,
}

/// Manages the renderer subprocess and its loopback socket, falling back once to an in-process
/// stub renderer if the primary fails to initialize (`spec.md` §4.6).
pub struct RendererClient {
    opts: RendererClientOpts,
    events_tx: Sender<RendererEvent>,
    child: Option<Child>,
    write_stream: Option<TcpStream>,
    connected: Arc<AtomicBool>,
    reader_handle: Option<std::thread::JoinHandle<()>>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,
    ever_connected: bool,
    stub: Option<StubRenderer>,
    backoff: Duration,
}

impl RendererClient {
    pub fn new(opts: RendererClientOpts, events_tx: Sender<RendererEvent>) -> Self {
        let backoff = opts.initial_backoff;
        Self {
            opts,
            events_tx,
            child: None,
            write_stream: None,
            connected: Arc::new(AtomicBool::new(false)),
            reader_handle: None,
            stderr_drain: None,
            ever_connected: false,
            stub: None,
            backoff,
        }
    }

    /// `true` once the client has fallen back to the in-process stub renderer.
    pub fn is_stub(&self) -> bool {
        self.stub.is_some()
    }

    fn ensure_connected(&mut self) -> GraphicsResult<()> {
        if self.stub.is_some() {
            return Ok(());
        }
        if self.connected.load(Ordering::SeqCst) && self.write_stream.is_some() {
            return Ok(());
        }

        // The reader thread marks `connected` false on EOF/error; pick that up here.
        self.teardown_transport();

        match self.connect() {
            Ok(()) => {
                self.ever_connected = true;
                self.backoff = self.opts.initial_backoff;
                Ok(())
            }
            Err(e) => {
                if !self.ever_connected {
                    tracing::warn!(
                        "renderer failed to initialize, falling back to stub renderer"
                    );
                    self.stub = Some(StubRenderer::new(self.events_tx.clone()));
                    Ok(())
                } else {
                    std::thread::sleep(self.backoff);
                    self.backoff = (self.backoff * 2).min(self.opts.max_backoff);
                    Err(e)
                }
            }
        }
    }

    fn teardown_transport(&mut self) {
        drop(self.write_stream.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        if let Some(handle) = self.reader_handle.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.stderr_drain.take() {
            let _ = handle.join();
        }
    }

    fn connect(&mut self) -> GraphicsResult<()> {
        let mut child = Command::new(&self.opts.renderer_binary)
            .args(["--port", &self.opts.port.to_string()])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                tracing::warn!(error = %e, binary = %self.opts.renderer_binary, "failed to spawn renderer");
                GraphicsError::RendererUnavailable
            })?;

        let mut stderr = child.stderr.take().ok_or(GraphicsError::RendererUnavailable)?;
        let stderr_drain = std::thread::spawn(move || {
            let mut bytes = Vec::new();
            stderr.read_to_end(&mut bytes)?;
            Ok(bytes)
        });

        let deadline = Instant::now() + self.opts.connect_timeout;
        let stream = loop {
            match TcpStream::connect((self.opts.host.as_str(), self.opts.port)) {
                Ok(stream) => break stream,
                Err(e) => {
                    if Instant::now() >= deadline {
                        tracing::warn!(error = %e, "timed out connecting to renderer");
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(GraphicsError::RendererUnavailable);
                    }
                    std::thread::sleep(Duration::from_millis(50));
                }
            }
        };

        let mut write_stream = stream.try_clone().map_err(|e| {
            tracing::warn!(error = %e, "failed to clone renderer socket");
            GraphicsError::RendererUnavailable
        })?;

        write_frame(
            &mut write_stream,
            &serde_json::json!({"type": "handshake", "token": self.opts.handshake_token}),
            None,
        )?;
        let ack = read_frame(&mut write_stream.try_clone().map_err(|e| {
            tracing::warn!(error = %e, "failed to clone renderer socket for handshake");
            GraphicsError::RendererUnavailable
        })?)?;
        if !ack.header.get("accepted").and_then(|v| v.as_bool()).unwrap_or(false) {
            let _ = child.kill();
            let _ = child.wait();
            return Err(GraphicsError::RendererUnavailable);
        }

        let connected = Arc::clone(&self.connected);
        let events_tx = self.events_tx.clone();
        let mut read_stream = stream;
        let reader_handle = std::thread::spawn(move || {
            connected.store(true, Ordering::SeqCst);
            loop {
                match read_frame(&mut read_stream) {
                    Ok(frame) => {
                        if !dispatch_event(&frame.header, frame.payload, &events_tx) {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
            connected.store(false, Ordering::SeqCst);
            let _ = events_tx.send(RendererEvent::Disconnected);
        });

        self.child = Some(child);
        self.write_stream = Some(write_stream);
        self.reader_handle = Some(reader_handle);
        self.stderr_drain = Some(stderr_drain);
        Ok(())
    }

    fn send_command(&mut self, header: serde_json::Value) -> GraphicsResult<()> {
        if self.stub.is_some() {
            return Ok(());
        }
        self.ensure_connected()?;
        let stream = self
            .write_stream
            .as_mut()
            .ok_or(GraphicsError::RendererUnavailable)?;
        write_frame(stream, &header, None)
    }

    pub fn set_assets(&mut self, assets: &BTreeMap<String, (PathBuf, String)>) -> GraphicsResult<()> {
        if let Some(stub) = self.stub.as_mut() {
            stub.set_assets(assets);
            return Ok(());
        }
        let map: serde_json::Map<String, serde_json::Value> = assets
            .iter()
            .map(|(id, (path, mime))| {
                (
                    id.clone(),
                    serde_json::json!({"filePath": path.to_string_lossy(), "mime": mime}),
                )
            })
            .collect();
        self.send_command(serde_json::json!({"type": "set_assets", "assets": map}))
    }

    pub fn render_layer(&mut self, req: RenderLayerRequest<'_>) -> GraphicsResult<()> {
        if let Some(stub) = self.stub.as_mut() {
            stub.render_layer(req.layer_id, req.width, req.height);
            return Ok(());
        }
        self.send_command(serde_json::json!({
            "type": "render_layer",
            "layerId": req.layer_id,
            "html": req.html,
            "css": req.css,
            "values": req.values,
            "bindings": req.bindings,
            "layout": req.layout,
            "backgroundMode": req.background_mode,
            "width": req.width,
            "height": req.height,
            "fps": req.fps,
            "zIndex": req.z_index,
        }))
    }

    pub fn update_values(
        &mut self,
        layer_id: &str,
        values: &serde_json::Value,
        bindings: &DerivedBindings,
    ) -> GraphicsResult<()> {
        if let Some(stub) = self.stub.as_mut() {
            stub.touch(layer_id);
            return Ok(());
        }
        self.send_command(serde_json::json!({
            "type": "update_values",
            "layerId": layer_id,
            "values": values,
            "bindings": bindings,
        }))
    }

    pub fn update_layout(&mut self, layer_id: &str, layout: Layout) -> GraphicsResult<()> {
        if let Some(stub) = self.stub.as_mut() {
            stub.touch(layer_id);
            return Ok(());
        }
        self.send_command(serde_json::json!({
            "type": "update_layout",
            "layerId": layer_id,
            "layout": layout,
        }))
    }

    pub fn remove_layer(&mut self, layer_id: &str) -> GraphicsResult<()> {
        if let Some(stub) = self.stub.as_mut() {
            stub.remove_layer(layer_id);
            return Ok(());
        }
        self.send_command(serde_json::json!({
            "type": "remove_layer",
            "layerId": layer_id,
        }))
    }
}

impl RendererSession for RendererClient {
    fn configure_session(
        &mut self,
        width: u32,
        height: u32,
        fps: u32,
        frame_bus: &FrameBusConfig,
    ) -> GraphicsResult<()> {
        if self.stub.is_some() {
            return Ok(());
        }
        self.send_command(serde_json::json!({
            "type": "configure_session",
            "w": width,
            "h": height,
            "fps": fps,
            "frameBus": frame_bus,
        }))
    }
}

impl Drop for RendererClient {
    fn drop(&mut self) {
        self.teardown_transport();
    }
}

fn dispatch_event(
    header: &serde_json::Value,
    payload: Option<Vec<u8>>,
    events_tx: &Sender<RendererEvent>,
) -> bool {
    match header.get("type").and_then(|v| v.as_str()) {
        Some("frame") => {
            let (Some(layer_id), Some(width), Some(height), Some(rgba)) = (
                header.get("layerId").and_then(|v| v.as_str()),
                header.get("width").and_then(|v| v.as_u64()),
                header.get("height").and_then(|v| v.as_u64()),
                payload,
            ) else {
                return true;
            };
            events_tx
                .send(RendererEvent::Frame {
                    layer_id: layer_id.to_string(),
                    width: width as u32,
                    height: height as u32,
                    rgba,
                })
                .is_ok()
        }
        Some("error") => {
            let message = header
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("renderer error")
                .to_string();
            events_tx.send(RendererEvent::Error(message)).is_ok()
        }
        _ => true,
    }
}

/// In-process fallback renderer used when the primary subprocess fails to initialize on startup.
///
/// Emits a single synthetic mid-gray opaque frame per layer whenever asked to render or touch it,
/// so the public facade and compositor remain exercisable without a real renderer present.
struct StubRenderer {
    events_tx: Sender<RendererEvent>,
    layers: std::collections::HashMap<String, (u32, u32)>,
}

const STUB_FILL: [u8; 4] = [128, 128, 128, 255];

impl StubRenderer {
    fn new(events_tx: Sender<RendererEvent>) -> Self {
        Self {
            events_tx,
            layers: std::collections::HashMap::new(),
        }
    }

    fn set_assets(&mut self, _assets: &BTreeMap<String, (PathBuf, String)>) {}

    fn render_layer(&mut self, layer_id: &str, width: u32, height: u32) {
        self.layers.insert(layer_id.to_string(), (width, height));
        self.emit(layer_id);
    }

    fn touch(&mut self, layer_id: &str) {
        if self.layers.contains_key(layer_id) {
            self.emit(layer_id);
        }
    }

    fn remove_layer(&mut self, layer_id: &str) {
        self.layers.remove(layer_id);
    }

    fn emit(&self, layer_id: &str) {
        let Some(&(width, height)) = self.layers.get(layer_id) else {
            return;
        };
        let mut rgba = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..(width * height) {
            rgba.extend_from_slice(&STUB_FILL);
        }
        let _ = self.events_tx.send(RendererEvent::Frame {
            layer_id: layer_id.to_string(),
            width,
            height,
            rgba,
        });
    }
}

#[cfg(test)]
#[path = "../../tests/unit/renderer/client.rs"]
mod tests;
