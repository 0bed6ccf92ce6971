// ABOUTME: Process signal handling for graceful shutdown
// ABOUTME: SIGINT or SIGTERM cancels a token watched by the server, event loop, and heartbeat

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

/// Install SIGINT/SIGTERM handlers. The returned token is cancelled on the
/// first signal.
pub fn install_signal_handler() -> Result<CancellationToken> {
    let token = CancellationToken::new();
    let trigger = token.clone();

    #[cfg(unix)]
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .context("Failed to install SIGTERM handler")?;

    tokio::spawn(async move {
        #[cfg(unix)]
        tokio::select! {
            _ = tokio::signal::ctrl_c() => tracing::info!("Received SIGINT, shutting down"),
            _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down"),
        }

        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Received Ctrl+C, shutting down");
        }

        trigger.cancel();
    });

    Ok(token)
}
