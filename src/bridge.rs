// ABOUTME: Event loop consuming the adapter queue in order, plus the heartbeat ticker
// ABOUTME: Lifecycle events drive the state machine; messages go through the inbound pipeline

use anyhow::Result;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use wa_bridge_core::{BridgeEvent, ClientEvent, SessionState, SharedSessionClient};

use crate::client::sidecar::DRIVER_EXITED;
use crate::config::SessionConfig;
use crate::inbound::InboundPipeline;
use crate::qr;
use crate::state::BridgeState;

pub struct EventLoop {
    state: BridgeState,
    pipeline: InboundPipeline,
    client: SharedSessionClient,
    reconnect_delay: Option<Duration>,
    print_qr: bool,
    shutdown: CancellationToken,
    driver_exited: bool,
}

impl EventLoop {
    pub fn new(
        state: BridgeState,
        pipeline: InboundPipeline,
        client: SharedSessionClient,
        session: &SessionConfig,
        shutdown: CancellationToken,
    ) -> Self {
        let reconnect_delay = (session.reconnect_delay_secs > 0)
            .then(|| Duration::from_secs(session.reconnect_delay_secs));
        Self {
            state,
            pipeline,
            client,
            reconnect_delay,
            print_qr: session.print_qr,
            shutdown,
            driver_exited: false,
        }
    }

    /// Consume adapter events until the queue closes or shutdown is requested.
    ///
    /// Fails if the driver process went away. The session cannot come back
    /// without it, so shutdown is requested for the whole bridge.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<ClientEvent>) -> Result<()> {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::debug!("Event loop stopping on shutdown");
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => self.handle(event).await,
                    None => {
                        tracing::info!("Adapter event queue closed");
                        break;
                    }
                },
            }
            if self.driver_exited {
                break;
            }
        }

        if self.driver_exited {
            anyhow::bail!("WhatsApp driver exited; no session to reconnect");
        }
        Ok(())
    }

    /// Whether the driver process has gone away.
    pub fn driver_exited(&self) -> bool {
        self.driver_exited
    }

    /// Handle one adapter event to completion before the next is taken.
    pub async fn handle(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::Message(raw) => {
                if let Some(message) = self.pipeline.process(raw).await {
                    let delivered = self.state.publish(BridgeEvent::Message(message));
                    tracing::debug!(delivered, "Message broadcast");
                }
            }
            lifecycle => self.handle_lifecycle(lifecycle),
        }
    }

    fn handle_lifecycle(&mut self, event: ClientEvent) {
        let next = self.state.apply_lifecycle(&event);

        if matches!(&event, ClientEvent::Disconnected(reason) if reason == DRIVER_EXITED) {
            tracing::error!("WhatsApp driver exited; shutting down");
            self.driver_exited = true;
            self.shutdown.cancel();
            return;
        }

        let Some(next) = next else {
            return;
        };

        match &event {
            ClientEvent::Qr(code) => {
                tracing::info!("Pairing code received, waiting for scan");
                if self.print_qr {
                    qr::print(code);
                }
            }
            ClientEvent::Authenticated => tracing::info!("Session authenticated"),
            ClientEvent::Ready => tracing::info!("WhatsApp client ready"),
            ClientEvent::AuthFailure(message) => {
                tracing::error!(message = %message, "Authentication failed")
            }
            ClientEvent::Disconnected(reason) => {
                tracing::warn!(reason = %reason, "WhatsApp client disconnected");
                if next == SessionState::Disconnected {
                    self.schedule_reconnect();
                }
            }
            ClientEvent::Message(_) => {}
        }
    }

    fn schedule_reconnect(&self) {
        let Some(delay) = self.reconnect_delay else {
            tracing::info!("Reconnect disabled; staying disconnected");
            return;
        };

        let state = self.state.clone();
        let client = self.client.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            // Another event may have moved the session on while we slept
            if state.session_state() != SessionState::Disconnected {
                return;
            }
            tracing::info!(delay = ?delay, "Re-initializing session after disconnect");
            if let Err(e) = client.initialize().await {
                tracing::error!(error = %e, "Failed to re-initialize session");
            }
        });
    }
}

/// Push a heartbeat frame to every subscriber each `period` until shutdown.
pub async fn run_heartbeat(state: BridgeState, period: Duration, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {
                let delivered = state.heartbeat();
                tracing::trace!(delivered, "Heartbeat sent");
            }
        }
    }
}
