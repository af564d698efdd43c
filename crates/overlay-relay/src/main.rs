//! Input overlay relay: entry point.
//!
//! This binary reads captured input events from an input source and relays
//! them over WebSocket to overlay subscribers.  Each subscriber picks the
//! categories it wants with `{"listen":"<Category>"}` and must echo every
//! heartbeat `{"type":"Ping","ping":N}` with `{"ping":N}` before the next one.
//!
//! # Usage
//!
//! ```text
//! input-overlay-relay [OPTIONS]
//!
//! Options:
//!   --config <PATH>          TOML config file
//!   --bind <IP>              Bind address [default: 0.0.0.0]
//!   --port <PORT>            Listener port [default: 5000]
//!   --ws-path <PATH>         WebSocket upgrade path [default: /ws]
//!   --heartbeat-ms <MS>      Heartbeat interval [default: 1000]
//!   --max-message-size <N>   Largest inbound message [default: 256]
//!   --outbound-queue <N>     Per-subscriber queue length [default: 64]
//!   --event-queue <N>        Producer queue length [default: 1024]
//!   --source <stdin|none>    Input source [default: stdin]
//! ```
//!
//! # Configuration precedence
//!
//! Built-in defaults, then the `--config` file, then flags and environment
//! variables.  CLI args take precedence over environment variables.
//!
//! | Variable               | Flag              |
//! |------------------------|-------------------|
//! | `OVERLAY_CONFIG`       | `--config`        |
//! | `OVERLAY_BIND`         | `--bind`          |
//! | `OVERLAY_PORT`         | `--port`          |
//! | `OVERLAY_WS_PATH`      | `--ws-path`       |
//! | `OVERLAY_HEARTBEAT_MS` | `--heartbeat-ms`  |
//! | `OVERLAY_SOURCE`       | `--source`        |

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::time::timeout;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use overlay_relay::application::{event_channel, RelayState};
use overlay_relay::domain::{RelayConfig, RelayFileConfig, SourceKind};
use overlay_relay::infrastructure::{build_source, run_server};

/// How long shutdown waits for the broadcaster to drain queued events.
const DRAIN_GRACE: Duration = Duration::from_secs(1);

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Input overlay relay.
///
/// Every flag is optional; unset flags fall back to the config file and then
/// to the built-in defaults.
#[derive(Debug, Parser)]
#[command(
    name = "input-overlay-relay",
    about = "Relays captured input events to WebSocket overlay subscribers",
    version
)]
struct Cli {
    /// TOML config file.  Every key in it is optional.
    #[arg(long, env = "OVERLAY_CONFIG")]
    config: Option<PathBuf>,

    /// IP address to bind the WebSocket server to.
    ///
    /// Use `0.0.0.0` to accept connections from any interface, or `127.0.0.1`
    /// to accept only local overlays.
    #[arg(long, env = "OVERLAY_BIND")]
    bind: Option<String>,

    /// TCP port for the WebSocket server.
    #[arg(long, env = "OVERLAY_PORT")]
    port: Option<u16>,

    /// Request path accepted for the WebSocket upgrade.
    #[arg(long, env = "OVERLAY_WS_PATH")]
    ws_path: Option<String>,

    /// Heartbeat interval in milliseconds.
    ///
    /// A subscriber that has not echoed the previous ping when the next one
    /// is due is disconnected.
    #[arg(long, env = "OVERLAY_HEARTBEAT_MS")]
    heartbeat_ms: Option<u64>,

    /// Largest inbound message accepted, in bytes.
    #[arg(long)]
    max_message_size: Option<usize>,

    /// Frames queued per subscriber before samples are dropped for it.
    #[arg(long)]
    outbound_queue: Option<usize>,

    /// Events queued between the input source and the broadcaster.
    #[arg(long)]
    event_queue: Option<usize>,

    /// Where events come from: `stdin` (JSON lines) or `none`.
    #[arg(long, env = "OVERLAY_SOURCE")]
    source: Option<SourceKind>,
}

impl Cli {
    /// Layers the config file (if any) and the CLI overrides into the final
    /// settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, or if
    /// the merged settings are invalid.
    fn into_settings(self) -> anyhow::Result<(RelayConfig, SourceKind)> {
        let mut file = match &self.config {
            Some(path) => RelayFileConfig::load(path)
                .with_context(|| format!("failed to load config file {}", path.display()))?,
            None => RelayFileConfig::default(),
        };

        if let Some(bind) = self.bind {
            file.bind_address = bind;
        }
        if let Some(port) = self.port {
            file.port = port;
        }
        if let Some(ws_path) = self.ws_path {
            file.ws_path = ws_path;
        }
        if let Some(ms) = self.heartbeat_ms {
            file.heartbeat_interval_ms = ms;
        }
        if let Some(n) = self.max_message_size {
            file.max_message_size = n;
        }
        if let Some(n) = self.outbound_queue {
            file.outbound_queue_capacity = n;
        }
        if let Some(n) = self.event_queue {
            file.event_queue_capacity = n;
        }
        if let Some(source) = self.source {
            file.source = source;
        }

        let config = file
            .to_relay_config()
            .context("invalid relay configuration")?;
        Ok((config, file.source))
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// # What happens at startup
///
/// 1. `tracing_subscriber` is initialised; `RUST_LOG` controls the level.
/// 2. CLI arguments and the optional config file are merged.
/// 3. The event queue and the broadcaster task are created.
/// 4. The input source is started on its own thread.
/// 5. A Ctrl+C handler clears the shared `running` flag.
/// 6. [`run_server`] accepts subscribers until the flag is cleared, then
///    closes every session.
/// 7. The input source is stopped and the broadcaster drains.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // `EnvFilter::try_from_default_env()` reads the `RUST_LOG` environment
    // variable.  If it is absent or invalid, we fall back to `info` level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let (config, source_kind) = Cli::parse().into_settings()?;

    info!(
        "input overlay relay starting; ws={}{}, heartbeat={:?}, source={source_kind}",
        config.bind_addr, config.ws_path, config.heartbeat_interval
    );

    // ── Event pipeline ────────────────────────────────────────────────────────
    let state = RelayState::new();
    let (sink, events) = event_channel(config.event_queue_capacity);
    let broadcaster = tokio::spawn(state.broadcaster().run(events));

    let source = build_source(source_kind);
    source.start(sink).context("failed to start input source")?;

    // ── Graceful shutdown flag ────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; initiating graceful shutdown");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    // ── Main server loop ──────────────────────────────────────────────────────
    let served = run_server(config, state, running).await;

    source.stop();
    match timeout(DRAIN_GRACE, broadcaster).await {
        Ok(_) => debug!("broadcaster drained"),
        // The stdin reader may still be blocked in `read`.
        Err(_) => debug!("input source still open; not waiting for broadcaster"),
    }

    served?;
    info!("input overlay relay stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
