// ABOUTME: Main entry point for the WhatsApp session bridge
// ABOUTME: Loads config, starts the driver, runs the event loop, and serves the control plane

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wa_bridge::{
    bridge::{run_heartbeat, EventLoop},
    client::SidecarClient,
    config::{Config, Overrides},
    dispatch::Dispatcher,
    inbound::InboundPipeline,
    server::{self, AppState},
    shutdown, BridgeState,
};
use wa_bridge_core::media::MediaStore;
use wa_bridge_core::SharedSessionClient;

#[derive(Debug, Parser)]
#[command(name = "wa-bridge", version, about = "Local WhatsApp session bridge")]
struct Args {
    /// Path to a TOML config file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Interface to bind the control plane to
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    port: Option<u16>,
    /// Directory holding the persisted session credentials
    #[arg(long)]
    session_dir: Option<PathBuf>,
    /// Directory inbound attachments are written to
    #[arg(long)]
    media_dir: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("\nPANIC! wa-bridge crashed:\n");
        eprintln!("{}", panic_info);
        eprintln!("\nBacktrace:");
        eprintln!("{:?}", std::backtrace::Backtrace::force_capture());
    }));

    // stdout is reserved for the pairing code
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting WhatsApp bridge");

    dotenvy::dotenv().ok();
    let args = Args::parse();
    let config = Config::load(
        args.config.as_deref(),
        Overrides {
            host: args.host,
            port: args.port,
            session_dir: args.session_dir,
            media_dir: args.media_dir,
        },
    )?;

    tracing::info!(
        bind = %config.bind_addr(),
        session_dir = %config.session.session_dir.display(),
        media_dir = %config.session.media_dir.display(),
        driver = %config.driver.command,
        "Configuration loaded"
    );

    std::fs::create_dir_all(&config.session.session_dir).with_context(|| {
        format!(
            "Failed to create session dir {}",
            config.session.session_dir.display()
        )
    })?;

    let shutdown = shutdown::install_signal_handler()?;

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let client: SharedSessionClient = Arc::new(SidecarClient::spawn(
        &config.driver,
        &config.session.session_dir,
        events_tx,
    )?);

    let state = BridgeState::new(config.server.subscriber_buffer);
    let media = Arc::new(MediaStore::new(config.session.media_dir.clone()));
    let pipeline = InboundPipeline::new(client.clone(), media);
    let dispatcher = Arc::new(Dispatcher::new(state.clone(), client.clone()));

    let event_loop = EventLoop::new(
        state.clone(),
        pipeline,
        client.clone(),
        &config.session,
        shutdown.clone(),
    );
    let loop_handle = tokio::spawn(event_loop.run(events_rx));
    let heartbeat_handle = tokio::spawn(run_heartbeat(
        state.clone(),
        Duration::from_secs(config.server.heartbeat_secs),
        shutdown.clone(),
    ));

    let listener = tokio::net::TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr()))?;

    let server_handle = tokio::spawn(server::serve(
        listener,
        AppState {
            bridge: state,
            dispatcher,
        },
        shutdown.clone(),
        server::SHUTDOWN_GRACE,
    ));

    if let Err(e) = client.initialize().await {
        shutdown.cancel();
        let _ = server_handle.await;
        return Err(e.context("Failed to initialize WhatsApp session"));
    }
    tracing::info!("WhatsApp session initializing");

    match server_handle.await {
        Ok(result) => result?,
        Err(e) => tracing::error!(error = %e, "Control plane task failed"),
    }

    // The server can also stop on its own; make sure the loops follow
    shutdown.cancel();

    tracing::info!("Destroying WhatsApp session");
    if let Err(e) = client.destroy().await {
        tracing::warn!(error = %e, "Session teardown failed");
    }

    let _ = heartbeat_handle.await;
    match loop_handle.await {
        // Driver exit is fatal
        Ok(result) => result?,
        Err(e) => tracing::error!(error = %e, "Event loop task failed"),
    }
    tracing::info!("WhatsApp bridge stopped");
    Ok(())
}
