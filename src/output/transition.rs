//! Atomic output-configuration transitions (`spec.md` §4.9).
//!
//! Staged apply/rollback pipeline grounded on the teacher's ordered, fallible-step render-to-file
//! pipelines (each stage propagates its error before the next begins); this service adds the
//! rollback ledger the teacher's pipelines never needed; because the engine runs as a single
//! logical task-serial core (`spec.md` §5), calls into [`OutputTransitionService::apply`] are
//! already FIFO-serialized by virtue of running on the one core worker thread — no additional lock
//! is taken here.

use std::path::PathBuf;

use crate::foundation::error::{GraphicsError, GraphicsResult};
use crate::output::adapter::{create_adapter, OutputAdapter, OutputFrame};
use crate::output::config::{frame_bus_config_for, FrameBusConfig, OutputConfig, OutputConfigStore};

/// Number of frame-bus slots this core requests (triple buffering).
pub const FRAME_BUS_SLOT_COUNT: u32 = 3;

/// Abstraction over `RendererClient::configure_session` (`spec.md` §4.6), kept as a trait here so
/// this module does not depend on the renderer's transport details.
pub trait RendererSession: Send {
    fn configure_session(
        &mut self,
        width: u32,
        height: u32,
        fps: u32,
        frame_bus: &FrameBusConfig,
    ) -> GraphicsResult<()>;
}

/// Abstraction over however the downstream output helper discovers the active shared frame bus.
pub trait FrameBusEnvironment: Send {
    fn apply(&mut self, frame_bus: &FrameBusConfig) -> GraphicsResult<()>;
    fn clear(&mut self) -> GraphicsResult<()>;
}

const ENV_NAME: &str = "OVERLAY_GFX_FRAME_BUS_NAME";
const ENV_SLOTS: &str = "OVERLAY_GFX_FRAME_BUS_SLOTS";
const ENV_WIDTH: &str = "OVERLAY_GFX_FRAME_BUS_WIDTH";
const ENV_HEIGHT: &str = "OVERLAY_GFX_FRAME_BUS_HEIGHT";
const ENV_FPS: &str = "OVERLAY_GFX_FRAME_BUS_FPS";
const ENV_FORMAT: &str = "OVERLAY_GFX_FRAME_BUS_FORMAT";

/// Publishes the active [`FrameBusConfig`] as process environment variables for the output
/// helper to discover on next spawn.
#[derive(Default)]
pub struct EnvVarFrameBusEnvironment;

impl FrameBusEnvironment for EnvVarFrameBusEnvironment {
    fn apply(&mut self, frame_bus: &FrameBusConfig) -> GraphicsResult<()> {
        // SAFETY: this core is the sole writer of these vars and only ever calls in from its one
        // worker thread (`spec.md` §5); no other thread reads or writes them concurrently.
        unsafe {
            std::env::set_var(ENV_NAME, &frame_bus.name);
            std::env::set_var(ENV_SLOTS, frame_bus.slot_count.to_string());
            std::env::set_var(ENV_WIDTH, frame_bus.width.to_string());
            std::env::set_var(ENV_HEIGHT, frame_bus.height.to_string());
            std::env::set_var(ENV_FPS, frame_bus.fps.to_string());
            std::env::set_var(ENV_FORMAT, frame_bus.pixel_format);
        }
        Ok(())
    }

    fn clear(&mut self) -> GraphicsResult<()> {
        // SAFETY: see `apply`.
        unsafe {
            std::env::remove_var(ENV_NAME);
            std::env::remove_var(ENV_SLOTS);
            std::env::remove_var(ENV_WIDTH);
            std::env::remove_var(ENV_HEIGHT);
            std::env::remove_var(ENV_FPS);
            std::env::remove_var(ENV_FORMAT);
        }
        Ok(())
    }
}

/// The live output runtime: config, derived frame-bus descriptor, and adapter, replaced
/// atomically by a successful [`OutputTransitionService::apply`].
pub struct OutputRuntime {
    pub config: OutputConfig,
    pub frame_bus: FrameBusConfig,
    pub adapter: Box<dyn OutputAdapter>,
}

/// Serializes all output-configuration changes and keeps the active [`OutputRuntime`].
pub struct OutputTransitionService {
    store: OutputConfigStore,
    env: Box<dyn FrameBusEnvironment>,
    runtime: Option<OutputRuntime>,
}

impl OutputTransitionService {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            store: OutputConfigStore::new(config_dir),
            env: Box::new(EnvVarFrameBusEnvironment),
            runtime: None,
        }
    }

    /// Construct with an injected [`FrameBusEnvironment`], for tests or alternate transports.
    pub fn with_environment(
        config_dir: impl Into<PathBuf>,
        env: Box<dyn FrameBusEnvironment>,
    ) -> Self {
        Self {
            store: OutputConfigStore::new(config_dir),
            env,
            runtime: None,
        }
    }

    /// Load the persisted config (if any) and bring the adapter/frame-bus up to match it.
    pub fn initialize(&mut self, renderer: &mut dyn RendererSession) -> GraphicsResult<()> {
        self.store.initialize()?;
        if let Some(config) = self.store.get_config().cloned() {
            self.apply(config, renderer)?;
        }
        Ok(())
    }

    pub fn runtime(&self) -> Option<&OutputRuntime> {
        self.runtime.as_ref()
    }

    /// Deliver a composited frame to the active adapter, a no-op while Idle.
    pub fn send_frame(&mut self, frame: OutputFrame<'_>) -> GraphicsResult<()> {
        match self.runtime.as_mut() {
            Some(runtime) => runtime.adapter.send_frame(frame),
            None => Ok(()),
        }
    }

    /// Apply `config` as the new active output configuration, per the staged pipeline in
    /// `spec.md` §4.9. On any stage failure, stage-appropriate rollback runs and the previous
    /// runtime remains in effect; if rollback itself fails, the frame-bus environment and
    /// persisted config are both cleared and the returned error carries the rollback diagnostics.
    pub fn apply(
        &mut self,
        config: OutputConfig,
        renderer: &mut dyn RendererSession,
    ) -> GraphicsResult<()> {
        let frame_bus = frame_bus_config_for(&config, FRAME_BUS_SLOT_COUNT);

        // next_adapter_select
        let mut next_adapter = create_adapter(config.output_key);

        // renderer_configure — nothing in `self` has changed yet if this fails.
        if let Err(e) = renderer.configure_session(
            config.format.width,
            config.format.height,
            config.format.fps,
            &frame_bus,
        ) {
            let _ = next_adapter.stop();
            return Err(GraphicsError::transition("renderer_configure", e.to_string()));
        }

        // Past this point the renderer session reflects the *new* config, so any failure needs
        // the full rollback sequence.
        let mut previous = self.runtime.take();

        // previous_adapter_stop
        if let Some(prev) = previous.as_mut() {
            if let Err(e) = prev.adapter.stop() {
                return self.rollback(
                    "previous_adapter_stop",
                    e.to_string(),
                    previous,
                    &mut next_adapter,
                    false,
                    renderer,
                );
            }
        }

        // apply frame-bus environment
        if let Err(e) = self.env.apply(&frame_bus) {
            return self.rollback(
                "apply_frame_bus_environment",
                e.to_string(),
                previous,
                &mut next_adapter,
                false,
                renderer,
            );
        }

        // next_adapter_configure
        if let Err(e) = next_adapter.configure(&config) {
            return self.rollback(
                "next_adapter_configure",
                e.to_string(),
                previous,
                &mut next_adapter,
                true,
                renderer,
            );
        }

        // persist
        if let Err(e) = self.store.set_config(config.clone()) {
            return self.rollback(
                "persist",
                e.to_string(),
                previous,
                &mut next_adapter,
                true,
                renderer,
            );
        }

        self.runtime = Some(OutputRuntime {
            config,
            frame_bus,
            adapter: next_adapter,
        });
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn rollback(
        &mut self,
        stage: &'static str,
        message: String,
        previous: Option<OutputRuntime>,
        next_adapter: &mut Box<dyn OutputAdapter>,
        next_started: bool,
        renderer: &mut dyn RendererSession,
    ) -> GraphicsResult<()> {
        let mut diagnostics = Vec::new();

        if next_started {
            if let Err(e) = next_adapter.stop() {
                diagnostics.push(format!("stop new adapter: {e}"));
            }
        }

        match previous.as_ref() {
            Some(prev) => {
                if let Err(e) = self.env.apply(&prev.frame_bus) {
                    diagnostics.push(format!("restore frame-bus environment: {e}"));
                }
            }
            None => {
                if let Err(e) = self.env.clear() {
                    diagnostics.push(format!("clear frame-bus environment: {e}"));
                }
            }
        }

        let mut previous = previous;
        if let Some(prev) = previous.as_ref() {
            if let Err(e) = renderer.configure_session(
                prev.config.format.width,
                prev.config.format.height,
                prev.config.format.fps,
                &prev.frame_bus,
            ) {
                diagnostics.push(format!("reconfigure renderer with previous config: {e}"));
            }
        }
        if let Some(prev) = previous.as_mut() {
            if let Err(e) = prev.adapter.configure(&prev.config) {
                diagnostics.push(format!("reconfigure previous adapter: {e}"));
            }
        }

        self.runtime = previous;

        if diagnostics.is_empty() {
            Err(GraphicsError::transition(stage, message))
        } else {
            let _ = self.env.clear();
            let _ = self.store.clear();
            self.runtime = None;
            Err(GraphicsError::transition(stage, message).with_rollback(diagnostics.join("; ")))
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/output/transition.rs"]
mod tests;
