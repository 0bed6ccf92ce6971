// ABOUTME: Session lifecycle state machine driven by adapter lifecycle signals
// ABOUTME: Pure transition table plus an owned SessionMachine that gates outbound operations

use serde::Serialize;
use std::fmt;

/// Authoritative lifecycle state of the chat-network session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Uninitialized,
    QrPending,
    Authenticated,
    Ready,
    Disconnected,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Uninitialized => "UNINITIALIZED",
            SessionState::QrPending => "QR_PENDING",
            SessionState::Authenticated => "AUTHENTICATED",
            SessionState::Ready => "READY",
            SessionState::Disconnected => "DISCONNECTED",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle signals reported by the session client adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleSignal {
    /// A new pairing challenge was issued
    PairingChallenge,
    /// The credential was accepted (fresh pairing or restored session)
    Authenticated,
    /// The session is fully established
    Ready,
    /// The credential was rejected
    AuthFailure,
    /// The transport was lost
    Disconnected,
}

/// Transition table. Returns the next state, or `None` when the signal is not
/// accepted in `current`.
///
/// `AuthFailure` is accepted everywhere and leaves the state unchanged.
/// `Authenticated` is also accepted from `Uninitialized` and `Disconnected`
/// because a session with persisted credentials never shows a pairing challenge.
pub fn next_state(current: SessionState, signal: LifecycleSignal) -> Option<SessionState> {
    use LifecycleSignal as S;
    use SessionState::*;

    match (current, signal) {
        (_, S::PairingChallenge) => Some(QrPending),
        (QrPending | Uninitialized | Disconnected, S::Authenticated) => Some(Authenticated),
        (Authenticated, S::Ready) => Some(Ready),
        (QrPending | Authenticated | Ready, S::Disconnected) => Some(Disconnected),
        (state, S::AuthFailure) => Some(state),
        _ => None,
    }
}

/// Owned holder of the single authoritative `SessionState`.
#[derive(Debug, Clone)]
pub struct SessionMachine {
    state: SessionState,
}

impl SessionMachine {
    pub fn new() -> Self {
        Self {
            state: SessionState::Uninitialized,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Outbound sends are permitted only while READY.
    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    pub fn qr_pending(&self) -> bool {
        self.state == SessionState::QrPending
    }

    /// Apply a signal. Returns the new state when the signal was accepted.
    pub fn apply(&mut self, signal: LifecycleSignal) -> Option<SessionState> {
        let next = next_state(self.state, signal)?;
        if next != self.state {
            tracing::info!(from = %self.state, to = %next, "Session state transition");
        }
        self.state = next;
        Some(next)
    }
}

impl Default for SessionMachine {
    fn default() -> Self {
        Self::new()
    }
}
