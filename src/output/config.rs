use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::foundation::atomic_write::write_json_atomic;
use crate::foundation::error::GraphicsResult;

/// Current supported `OutputConfig` schema version.
pub const CURRENT_VERSION: u32 = 1;

const CONFIG_FILE: &str = "graphics-output.json";

/// The intended downstream output pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKey {
    Stub,
    KeyFillSdi,
    KeyFillSplitSdi,
    KeyFillNdi,
    VideoSdi,
    VideoHdmi,
}

impl OutputKey {
    /// Alpha-capable outputs force `backgroundMode = transparent` on accepted layers
    /// (`spec.md` §3, §6 glossary).
    pub fn is_alpha_capable(self) -> bool {
        matches!(
            self,
            OutputKey::KeyFillSdi | OutputKey::KeyFillSplitSdi | OutputKey::KeyFillNdi
        )
    }
}

/// Device/NDI targets for an output configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputTargets {
    #[serde(default)]
    pub output1_id: Option<String>,
    #[serde(default)]
    pub output2_id: Option<String>,
    #[serde(default)]
    pub ndi_stream_name: Option<String>,
}

/// Pixel format/cadence requested of the output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFormat {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

/// Legal vs full-range signaling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoRange {
    Legal,
    Full,
}

impl Default for VideoRange {
    fn default() -> Self {
        VideoRange::Legal
    }
}

/// Colorspace hint for the downstream helper.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Colorspace {
    Auto,
    Rec601,
    Rec709,
    Rec2020,
}

impl Default for Colorspace {
    fn default() -> Self {
        Colorspace::Auto
    }
}

/// Persisted, versioned output configuration (`spec.md` §3).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputConfig {
    pub version: u32,
    pub output_key: OutputKey,
    pub targets: OutputTargets,
    pub format: OutputFormat,
    #[serde(default)]
    pub range: VideoRange,
    #[serde(default)]
    pub colorspace: Colorspace,
}

/// Shared-memory transport descriptor derived deterministically from an [`OutputConfig`].
///
/// `spec.md` §6: always RGBA8 regardless of what is requested; a non-RGBA8 request is ignored
/// with a warning at the call site.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameBusConfig {
    pub name: String,
    pub slot_count: u32,
    pub pixel_format: &'static str,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub size: u64,
}

/// Build the [`FrameBusConfig`] for an [`OutputConfig`], per `spec.md` §6.
pub fn frame_bus_config_for(config: &OutputConfig, slot_count: u32) -> FrameBusConfig {
    let size = u64::from(config.format.width) * u64::from(config.format.height) * 4
        * u64::from(slot_count);
    FrameBusConfig {
        name: format!("overlay-gfx-{:?}", config.output_key).to_lowercase(),
        slot_count,
        pixel_format: "RGBA8",
        width: config.format.width,
        height: config.format.height,
        fps: config.format.fps,
        size,
    }
}

/// Persisted, atomically-written store for the active [`OutputConfig`].
pub struct OutputConfigStore {
    dir: PathBuf,
    config: Option<OutputConfig>,
}

impl OutputConfigStore {
    /// Construct a store rooted at `dir` without touching disk; call [`Self::initialize`] first.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            config: None,
        }
    }

    fn path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    /// Load the persisted config, if any.
    ///
    /// A stored `version` newer than [`CURRENT_VERSION`] is treated as absent (and a warning
    /// logged at the call site). A strict-JSON parse failure falls back to a legacy coercion
    /// (stripping unknown fields) and, on success, re-persists at the current version.
    pub fn initialize(&mut self) -> GraphicsResult<()> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| anyhow::anyhow!("create output config dir {}: {e}", self.dir.display()))?;

        let Ok(bytes) = std::fs::read(self.path()) else {
            self.config = None;
            return Ok(());
        };

        if let Ok(config) = serde_json::from_slice::<OutputConfig>(&bytes) {
            if config.version > CURRENT_VERSION {
                tracing::warn!(version = config.version, "output config version unsupported, treating as absent");
                self.config = None;
            } else {
                self.config = Some(config);
            }
            return Ok(());
        }

        match legacy_coerce(&bytes) {
            Some(mut config) => {
                config.version = CURRENT_VERSION;
                self.config = Some(config.clone());
                self.persist(&config)?;
            }
            None => {
                tracing::warn!("output config manifest corrupt, treating as absent");
                self.config = None;
            }
        }
        Ok(())
    }

    /// The currently loaded config, if any.
    pub fn get_config(&self) -> Option<&OutputConfig> {
        self.config.as_ref()
    }

    /// Persist `config`, normalizing its `version` to [`CURRENT_VERSION`].
    pub fn set_config(&mut self, mut config: OutputConfig) -> GraphicsResult<()> {
        config.version = CURRENT_VERSION;
        self.persist(&config)?;
        self.config = Some(config);
        Ok(())
    }

    /// Delete the persisted config file, swallowing only a not-found error.
    pub fn clear(&mut self) -> GraphicsResult<()> {
        match std::fs::remove_file(self.path()) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(anyhow::anyhow!("remove output config: {e}").into()),
        }
        self.config = None;
        Ok(())
    }

    fn persist(&self, config: &OutputConfig) -> GraphicsResult<()> {
        write_json_atomic(&self.path(), config)
    }
}

/// Strip unknown top-level fields and retry parsing, for migrating older config formats.
fn legacy_coerce(bytes: &[u8]) -> Option<OutputConfig> {
    let mut value: serde_json::Value = serde_json::from_slice(bytes).ok()?;
    let obj = value.as_object_mut()?;
    let known = [
        "version",
        "outputKey",
        "targets",
        "format",
        "range",
        "colorspace",
    ];
    obj.retain(|k, _| known.contains(&k.as_str()));
    serde_json::from_value(value).ok()
}

#[cfg(test)]
#[path = "../../tests/unit/output/config.rs"]
mod tests;
