use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::broadcast;

use easel_engine::SessionRegistry;
use easel_server::{wait_for_idle, AgentOrchestrator, BroadcastSink, EngineOrchestrator, ServerConfig};
use easel_telemetry::{init_telemetry, TelemetryConfig};

/// How long cancelled runs get to report their terminal event.
const SHUTDOWN_DRAIN: Duration = Duration::from_secs(3);
/// Grace for the event bridge to push those events to sockets.
const FLUSH_GRACE: Duration = Duration::from_millis(200);

/// Canvas agent host: runs chat-model agents that build node graphs for a UI.
#[derive(Debug, Parser)]
#[command(name = "easel", version, about)]
struct Cli {
    /// Address to bind.
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    port: Option<u16>,
    /// Settings file (defaults to ~/.easel/settings.json).
    #[arg(long, value_name = "PATH")]
    settings: Option<PathBuf>,
    /// trace, debug, info, warn or error.
    #[arg(long)]
    log_level: Option<String>,
    /// One JSON object per log line.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let path = cli.settings.clone().unwrap_or_else(easel_settings::settings_path);
    let mut settings = easel_settings::load_settings_from_path(&path)
        .with_context(|| format!("loading settings from {}", path.display()))?;
    if let Some(host) = cli.host {
        settings.server.host = host;
    }
    if let Some(port) = cli.port {
        settings.server.port = port;
    }
    if let Some(level) = cli.log_level {
        settings.logging.level = level;
    }
    if cli.json_logs {
        settings.logging.json = true;
    }

    let _telemetry = init_telemetry(TelemetryConfig::from_level_name(&settings.logging.level, settings.logging.json))
        .context("initializing logging")?;
    tracing::info!(path = %path.display(), "starting easel");

    let settings = Arc::new(settings);
    let (event_tx, _) = broadcast::channel(1024);
    let sink = BroadcastSink::new(event_tx);
    let orchestrator = Arc::new(EngineOrchestrator::new(
        Arc::clone(&settings),
        Arc::new(SessionRegistry::default()),
        Arc::new(sink.clone()),
    ));

    let handle = easel_server::start(ServerConfig::from(&settings.server), orchestrator.clone(), &sink)
        .await
        .context("starting server")?;
    tracing::info!(addr = %handle.addr(), "easel ready");

    tokio::signal::ctrl_c().await.context("listening for ctrl-c")?;

    let cancelled = orchestrator.cancel_all();
    tracing::info!(cancelled, "shutting down");
    if wait_for_idle(orchestrator.as_ref(), SHUTDOWN_DRAIN).await {
        tokio::time::sleep(FLUSH_GRACE).await;
    } else {
        tracing::warn!(still_active = orchestrator.active_count(), "runs did not stop in time");
    }
    handle.shutdown().await;
    Ok(())
}
