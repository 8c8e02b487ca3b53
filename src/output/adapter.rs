//! Pluggable output sinks selected by [`OutputKey`] (`spec.md` §4.7).
//!
//! The real SDI/HDMI/NDI output helper is an external collaborator out of scope for this core
//! (`spec.md` §1); what lives here is the contract each adapter implements plus a process-spawning
//! transport for talking to that helper, grounded on the teacher's `FfmpegSink` subprocess pattern
//! (`encode::ffmpeg::FfmpegSink`): a piped child stdin plus a dedicated stderr-drain thread.

use std::io::{Read, Write as _};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};

use crate::foundation::error::{GraphicsError, GraphicsResult};
use crate::output::config::{OutputConfig, OutputKey};

/// Environment variable naming the output helper binary; falls back to [`DEFAULT_HELPER_BINARY`].
pub const HELPER_BINARY_ENV: &str = "OVERLAY_GFX_OUTPUT_HELPER";
const DEFAULT_HELPER_BINARY: &str = "gfx-output-helper";

/// A single premultiplied RGBA8 frame ready for a downstream output.
pub struct OutputFrame<'a> {
    pub width: u32,
    pub height: u32,
    pub rgba: &'a [u8],
    pub timestamp_ms: u64,
}

/// Contract every output implementation satisfies (`spec.md` §4.7).
///
/// `send_frame` must be non-blocking from the cadence loop's perspective beyond its current tick
/// budget: implementations write into an already-open pipe rather than perform any blocking setup
/// per frame.
pub trait OutputAdapter: Send {
    fn configure(&mut self, config: &OutputConfig) -> GraphicsResult<()>;
    fn send_frame(&mut self, frame: OutputFrame<'_>) -> GraphicsResult<()>;
    fn stop(&mut self) -> GraphicsResult<()>;
}

/// Discards every frame; used when `outputKey == stub` and as the safe default before the first
/// successful [`OutputTransitionService`](crate::output::transition::OutputTransitionService) run.
#[derive(Default)]
pub struct StubAdapter {
    frames_sent: u64,
}

impl StubAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of frames discarded since the last `configure`. Test/diagnostic hook.
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }
}

impl OutputAdapter for StubAdapter {
    fn configure(&mut self, _config: &OutputConfig) -> GraphicsResult<()> {
        self.frames_sent = 0;
        Ok(())
    }

    fn send_frame(&mut self, _frame: OutputFrame<'_>) -> GraphicsResult<()> {
        self.frames_sent += 1;
        Ok(())
    }

    fn stop(&mut self) -> GraphicsResult<()> {
        Ok(())
    }
}

/// One correlated lane of a helper process (a plain video lane, or a fill/key lane pair).
enum Lane {
    Single,
    Fill,
    Key,
}

impl Lane {
    fn arg(&self) -> &'static str {
        match self {
            Lane::Single => "single",
            Lane::Fill => "fill",
            Lane::Key => "key",
        }
    }
}

struct HelperHandle {
    lane: Lane,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,
}

impl HelperHandle {
    fn new(lane: Lane) -> Self {
        Self {
            lane,
            child: None,
            stdin: None,
            stderr_drain: None,
        }
    }

    fn spawn(&mut self, helper_binary: &str, target_arg: &str) -> GraphicsResult<()> {
        self.stop()?;

        let mut cmd = Command::new(helper_binary);
        cmd.args(["--lane", self.lane.arg(), "--target", target_arg])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| GraphicsError::output_helper(format!("spawn {helper_binary}: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| GraphicsError::output_helper("helper stdin unavailable"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| GraphicsError::output_helper("helper stderr unavailable"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut bytes = Vec::new();
            stderr.read_to_end(&mut bytes)?;
            Ok(bytes)
        });

        self.child = Some(child);
        self.stdin = Some(stdin);
        self.stderr_drain = Some(stderr_drain);
        Ok(())
    }

    fn send(&mut self, frame: &OutputFrame<'_>) -> GraphicsResult<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| GraphicsError::output_helper("helper not configured"))?;

        let header = serde_json::json!({
            "width": frame.width,
            "height": frame.height,
            "timestampMs": frame.timestamp_ms,
        });
        let header_bytes = serde_json::to_vec(&header)
            .map_err(|e| GraphicsError::output_helper(format!("encode frame header: {e}")))?;
        let len = (header_bytes.len() as u32).to_be_bytes();

        stdin
            .write_all(&len)
            .and_then(|_| stdin.write_all(&header_bytes))
            .and_then(|_| stdin.write_all(frame.rgba))
            .map_err(|e| GraphicsError::output_helper(format!("write frame: {e}")))?;
        Ok(())
    }

    fn stop(&mut self) -> GraphicsResult<()> {
        drop(self.stdin.take());
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child
            .wait()
            .map_err(|e| GraphicsError::output_helper(format!("wait for helper: {e}")))?;
        let stderr_bytes = match self.stderr_drain.take() {
            Some(handle) => handle.join().ok().and_then(|r| r.ok()).unwrap_or_default(),
            None => Vec::new(),
        };
        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(GraphicsError::output_helper(format!(
                "helper exited with {status}: {}",
                stderr.trim()
            )));
        }
        Ok(())
    }
}

/// A single correlated-lane output: `video_sdi` or `video_hdmi` (`spec.md` §4.7, §9 — `video_hdmi`
/// shares this implementation rather than being a distinct adapter type; [`create_adapter`] maps
/// both keys to the same constructor and the adapter itself carries no device-type branch, since
/// it never inspects device type — it only forwards whatever target id `configure` resolves).
pub struct SingleLaneAdapter {
    helper_binary: String,
    lane: HelperHandle,
}

impl SingleLaneAdapter {
    fn new(helper_binary: String) -> Self {
        Self {
            helper_binary,
            lane: HelperHandle::new(Lane::Single),
        }
    }
}

impl OutputAdapter for SingleLaneAdapter {
    fn configure(&mut self, config: &OutputConfig) -> GraphicsResult<()> {
        let target = config
            .targets
            .output1_id
            .as_deref()
            .ok_or_else(|| GraphicsError::invalid_payload("output1Id required"))?;
        self.lane.spawn(&self.helper_binary, target)
    }

    fn send_frame(&mut self, frame: OutputFrame<'_>) -> GraphicsResult<()> {
        self.lane.send(&frame)
    }

    fn stop(&mut self) -> GraphicsResult<()> {
        self.lane.stop()
    }
}

/// Two correlated SDI lanes: `key_fill_sdi` and `key_fill_split_sdi` (`spec.md` §4.7).
pub struct DualLaneAdapter {
    helper_binary: String,
    fill: HelperHandle,
    key: HelperHandle,
}

impl DualLaneAdapter {
    fn new(helper_binary: String) -> Self {
        Self {
            helper_binary,
            fill: HelperHandle::new(Lane::Fill),
            key: HelperHandle::new(Lane::Key),
        }
    }
}

impl OutputAdapter for DualLaneAdapter {
    fn configure(&mut self, config: &OutputConfig) -> GraphicsResult<()> {
        let fill_target = config
            .targets
            .output1_id
            .as_deref()
            .ok_or_else(|| GraphicsError::invalid_payload("output1Id required"))?;
        let key_target = config
            .targets
            .output2_id
            .as_deref()
            .ok_or_else(|| GraphicsError::invalid_payload("output2Id required"))?;
        self.fill.spawn(&self.helper_binary, fill_target)?;
        if let Err(e) = self.key.spawn(&self.helper_binary, key_target) {
            let _ = self.fill.stop();
            return Err(e);
        }
        Ok(())
    }

    fn send_frame(&mut self, frame: OutputFrame<'_>) -> GraphicsResult<()> {
        self.fill.send(&OutputFrame {
            width: frame.width,
            height: frame.height,
            rgba: frame.rgba,
            timestamp_ms: frame.timestamp_ms,
        })?;
        self.key.send(&frame)
    }

    fn stop(&mut self) -> GraphicsResult<()> {
        let fill_result = self.fill.stop();
        let key_result = self.key.stop();
        fill_result.and(key_result)
    }
}

/// Network output over NDI: `key_fill_ndi` (`spec.md` §4.7). No device validation, unlike the SDI
/// lanes; the stream name is passed straight through to the helper.
pub struct NdiAdapter {
    helper_binary: String,
    lane: HelperHandle,
}

impl NdiAdapter {
    fn new(helper_binary: String) -> Self {
        Self {
            helper_binary,
            lane: HelperHandle::new(Lane::Single),
        }
    }
}

impl OutputAdapter for NdiAdapter {
    fn configure(&mut self, config: &OutputConfig) -> GraphicsResult<()> {
        let stream_name = config
            .targets
            .ndi_stream_name
            .as_deref()
            .ok_or_else(|| GraphicsError::invalid_payload("ndiStreamName required"))?;
        self.lane.spawn(&self.helper_binary, stream_name)
    }

    fn send_frame(&mut self, frame: OutputFrame<'_>) -> GraphicsResult<()> {
        self.lane.send(&frame)
    }

    fn stop(&mut self) -> GraphicsResult<()> {
        self.lane.stop()
    }
}

fn helper_binary() -> String {
    std::env::var(HELPER_BINARY_ENV).unwrap_or_else(|_| DEFAULT_HELPER_BINARY.to_string())
}

/// Construct the adapter implementation selected by `key`, per `spec.md` §4.7.
pub fn create_adapter(key: OutputKey) -> Box<dyn OutputAdapter> {
    let helper = helper_binary();
    match key {
        OutputKey::Stub => Box::new(StubAdapter::new()),
        OutputKey::VideoSdi | OutputKey::VideoHdmi => Box::new(SingleLaneAdapter::new(helper)),
        OutputKey::KeyFillSdi | OutputKey::KeyFillSplitSdi => {
            Box::new(DualLaneAdapter::new(helper))
        }
        OutputKey::KeyFillNdi => Box::new(NdiAdapter::new(helper)),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/output/adapter.rs"]
mod tests;
