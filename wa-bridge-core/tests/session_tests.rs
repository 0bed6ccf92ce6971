// ABOUTME: Integration tests replaying lifecycle signal sequences through the session machine
// ABOUTME: Covers pairing, restored credentials, reconnection, and ignored out-of-order signals

use wa_bridge_core::{next_state, LifecycleSignal, SessionMachine, SessionState};

const ALL_STATES: [SessionState; 5] = [
    SessionState::Uninitialized,
    SessionState::QrPending,
    SessionState::Authenticated,
    SessionState::Ready,
    SessionState::Disconnected,
];

const ALL_SIGNALS: [LifecycleSignal; 5] = [
    LifecycleSignal::PairingChallenge,
    LifecycleSignal::Authenticated,
    LifecycleSignal::Ready,
    LifecycleSignal::AuthFailure,
    LifecycleSignal::Disconnected,
];

fn replay(signals: &[LifecycleSignal]) -> SessionState {
    let mut machine = SessionMachine::new();
    for signal in signals {
        machine.apply(*signal);
    }
    machine.state()
}

// =============================================================================
// Sequences
// =============================================================================

#[test]
fn test_fresh_pairing_sequence() {
    use LifecycleSignal::*;
    assert_eq!(
        replay(&[PairingChallenge, Authenticated, Ready]),
        SessionState::Ready
    );
}

#[test]
fn test_rotating_pairing_codes_stay_pending() {
    use LifecycleSignal::*;
    assert_eq!(
        replay(&[PairingChallenge, PairingChallenge, PairingChallenge]),
        SessionState::QrPending
    );
}

#[test]
fn test_restored_credentials_skip_pairing() {
    use LifecycleSignal::*;
    assert_eq!(replay(&[Authenticated, Ready]), SessionState::Ready);
}

#[test]
fn test_disconnect_then_repair() {
    use LifecycleSignal::*;
    assert_eq!(
        replay(&[
            PairingChallenge,
            Authenticated,
            Ready,
            Disconnected,
            PairingChallenge,
            Authenticated,
            Ready
        ]),
        SessionState::Ready
    );
}

#[test]
fn test_auth_failure_mid_pairing_keeps_pending() {
    use LifecycleSignal::*;
    assert_eq!(
        replay(&[PairingChallenge, AuthFailure]),
        SessionState::QrPending
    );
}

#[test]
fn test_out_of_order_ready_is_ignored() {
    use LifecycleSignal::*;
    assert_eq!(replay(&[Ready]), SessionState::Uninitialized);
    assert_eq!(replay(&[PairingChallenge, Ready]), SessionState::QrPending);
    assert_eq!(
        replay(&[Authenticated, Ready, Disconnected, Ready]),
        SessionState::Disconnected
    );
}

// =============================================================================
// Table properties
// =============================================================================

#[test]
fn test_ready_is_only_reachable_from_authenticated() {
    for state in ALL_STATES {
        for signal in ALL_SIGNALS {
            if next_state(state, signal) == Some(SessionState::Ready) && state != SessionState::Ready
            {
                assert_eq!(state, SessionState::Authenticated);
                assert_eq!(signal, LifecycleSignal::Ready);
            }
        }
    }
}

#[test]
fn test_pairing_challenge_is_accepted_everywhere() {
    for state in ALL_STATES {
        assert_eq!(
            next_state(state, LifecycleSignal::PairingChallenge),
            Some(SessionState::QrPending)
        );
    }
}

#[test]
fn test_ready_state_leaves_only_via_disconnect_or_pairing() {
    for signal in ALL_SIGNALS {
        match next_state(SessionState::Ready, signal) {
            Some(SessionState::Ready) | None => {}
            Some(SessionState::Disconnected) => assert_eq!(signal, LifecycleSignal::Disconnected),
            Some(SessionState::QrPending) => {
                assert_eq!(signal, LifecycleSignal::PairingChallenge)
            }
            Some(other) => panic!("unexpected transition Ready -> {other} on {signal:?}"),
        }
    }
}
