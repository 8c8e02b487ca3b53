use std::time::Duration;

use anyhow::Context as _;
use overlay_gfx::{GraphicsManager, GraphicsManagerOpts, RendererClientOpts};

/// Local smoke entry point: brings up a `GraphicsManager` against the stub output and a renderer
/// that falls back to its in-process stub the moment the real subprocess fails to start, then
/// prints `getStatus()` once. No host transport (SDI/HDMI/NDI helper, real HTML renderer) is
/// exercised here.
fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let opts = GraphicsManagerOpts {
        renderer: RendererClientOpts {
            connect_timeout: Duration::from_millis(200),
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_millis(200),
            ..Default::default()
        },
        ..Default::default()
    };
    let manager = GraphicsManager::new(opts).context("start graphics manager")?;

    manager
        .configure_outputs(serde_json::json!({
            "outputKey": "stub",
            "format": {"width": 1920, "height": 1080, "fps": 60},
        }))
        .context("configure stub outputs")?;

    let status = manager.get_status().context("get status")?;
    println!("{}", serde_json::to_string_pretty(&status)?);

    Ok(())
}
