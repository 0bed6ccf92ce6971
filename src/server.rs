// ABOUTME: HTTP + SSE control plane - health, event stream, send, and typing endpoints
// ABOUTME: Handlers only delegate to BridgeState and Dispatcher and report {ok, error?} JSON

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::sse::{Event, Sse},
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use serde::Serialize;
use std::convert::Infallible;
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use wa_bridge_core::Frame;

use crate::dispatch::{DispatchError, Dispatcher, SendRequest, TypingRequest};
use crate::state::BridgeState;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct AppState {
    pub bridge: BridgeState,
    pub dispatcher: Arc<Dispatcher>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub ready: bool,
    pub qr_pending: bool,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiResponse {
    fn success() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
        }
    }
}

/// Build the control-plane router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/events", get(events_handler))
        .route("/send", post(send_handler))
        .route("/send-typing", post(typing_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// How long in-flight requests may run once shutdown starts.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Serve the control plane on `listener` until `shutdown` is cancelled.
///
/// Event streams are closed as soon as shutdown starts. Requests still in
/// flight after `grace` are abandoned rather than awaited.
pub async fn serve(
    listener: tokio::net::TcpListener,
    state: AppState,
    shutdown: CancellationToken,
    grace: Duration,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(addr = %addr, "Control plane listening");

    let bridge = state.bridge.clone();
    let signal = shutdown.clone();
    let server = axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            signal.cancelled().await;
            bridge.close_subscribers();
        })
        .into_future();

    tokio::select! {
        result = server => result?,
        _ = async {
            shutdown.cancelled().await;
            tokio::time::sleep(grace).await;
        } => {
            tracing::warn!(grace = ?grace, "Shutdown grace elapsed; abandoning in-flight requests");
        }
    }
    Ok(())
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let session = state.bridge.session_state();
    Json(HealthResponse {
        ok: true,
        ready: session == wa_bridge_core::SessionState::Ready,
        qr_pending: session == wa_bridge_core::SessionState::QrPending,
    })
}

async fn events_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.bridge.subscribe();
    tracing::info!(
        subscriber = ?subscription.id(),
        total = state.bridge.subscriber_count(),
        "Event stream opened"
    );
    // Dropping the stream (client gone or write failed) drops the
    // subscription, which removes it from the hub.
    Sse::new(subscription.filter_map(|frame| async move { frame_to_sse(frame).map(Ok) }))
}

/// Render a hub frame as an SSE event. Heartbeats become comment frames.
pub fn frame_to_sse(frame: Frame) -> Option<Event> {
    match frame {
        Frame::Heartbeat => Some(Event::default().comment("heartbeat")),
        Frame::Event(event) => match serde_json::to_string(&event) {
            Ok(json) => Some(Event::default().data(json)),
            Err(e) => {
                tracing::warn!(error = %e, event = event.kind(), "Failed to serialize event");
                None
            }
        },
    }
}

/// Malformed JSON still gets an `{ok: false}` body.
fn rejection_response(rejection: JsonRejection) -> (StatusCode, Json<ApiResponse>) {
    tracing::debug!(error = %rejection, "Rejected malformed request body");
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::failure(rejection.body_text())),
    )
}

async fn send_handler(
    State(state): State<AppState>,
    payload: Result<Json<SendRequest>, JsonRejection>,
) -> (StatusCode, Json<ApiResponse>) {
    let Json(request) = match payload {
        Ok(json) => json,
        Err(rejection) => return rejection_response(rejection),
    };
    match state.dispatcher.send(&request).await {
        Ok(()) => (StatusCode::OK, Json(ApiResponse::success())),
        Err(e) => {
            let status = match e {
                DispatchError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                DispatchError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
                DispatchError::Media(_) | DispatchError::Adapter(_) => {
                    tracing::error!(error = %e, "Send failed");
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };
            (status, Json(ApiResponse::failure(e.to_string())))
        }
    }
}

async fn typing_handler(
    State(state): State<AppState>,
    payload: Result<Json<TypingRequest>, JsonRejection>,
) -> (StatusCode, Json<ApiResponse>) {
    let Json(request) = match payload {
        Ok(json) => json,
        Err(rejection) => return rejection_response(rejection),
    };
    match state.dispatcher.send_typing(&request).await {
        Ok(()) => (StatusCode::OK, Json(ApiResponse::success())),
        Err(e) => {
            let status = match e {
                DispatchError::InvalidRequest(_) | DispatchError::NotReady => {
                    StatusCode::BAD_REQUEST
                }
                DispatchError::Media(_) | DispatchError::Adapter(_) => {
                    tracing::debug!(error = %e, "Typing indicator failed");
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };
            (status, Json(ApiResponse::failure(e.to_string())))
        }
    }
}
