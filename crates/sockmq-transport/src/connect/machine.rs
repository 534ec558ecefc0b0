//! Transition table for the connect endpoint.
//!
//! The table is pure: `step` maps the current state and an input to the
//! next state plus at most one action, and the driver executes actions
//! against the collaborators. Every `(state, input)` pair not listed below
//! is a programming invariant violation and aborts through
//! [`invalid_transition`], never a silent no-op.

/// States of the connect endpoint lifecycle.
///
/// `Idle` is both the initial state and the terminal state re-entered once
/// a final teardown path has drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectState {
    /// Created, or fully stopped after teardown.
    Idle,
    /// A connect attempt is in flight.
    Connecting,
    /// Draining the socket after a failed attempt; retry follows.
    StoppingSocket,
    /// Backoff timer armed before the next attempt.
    Waiting,
    /// Draining the timer before the next attempt.
    StoppingTimer,
    /// Draining the socket on the way to a final stop.
    StoppingSocketFinal,
    /// Draining the timer on the way to a final stop.
    StoppingTimerFinal,
    /// Connected; the session handler owns the data phase.
    Active,
    /// Draining the session on the way to a final stop.
    StoppingSession,
}

/// Inputs consumed by the connect machine.
///
/// `Begin` and `DialUnavailable` are self-directed; the rest arrive from a
/// specific collaborator's event channel or from the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectInput {
    /// Kick off the first connect attempt.
    Begin,
    /// Socket allocation failed synchronously; skip the attempt.
    DialUnavailable,
    /// Socket: connect completed.
    SocketConnected,
    /// Socket: connect failed.
    SocketError,
    /// Socket: stop drained.
    SocketStopped,
    /// Timer: interval elapsed.
    TimerTimeout,
    /// Timer: stop drained.
    TimerStopped,
    /// Session: data phase failed.
    SessionError,
    /// Session: stop drained.
    SessionStopped,
    /// Owner: stop request.
    Stop,
}

/// Collaborator commands issued by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectAction {
    /// Start the socket and issue a non-blocking connect.
    Dial,
    /// Stop the socket.
    StopSocket,
    /// Arm the backoff timer.
    StartTimer,
    /// Stop the backoff timer.
    StopTimer,
    /// Start the session handler on the connected socket.
    StartSession,
    /// Stop the session handler.
    StopSession,
    /// Deliver the exactly-once stopped notification to the owner.
    ReportStopped,
}

/// Result of one transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Command to execute, if the transition carries one.
    pub action: Option<ConnectAction>,
    /// State after the transition.
    pub next: ConnectState,
}

/// Advances the machine by one input.
///
/// # Panics
///
/// Panics on any `(state, input)` pair outside the transition table.
pub fn step(state: ConnectState, input: ConnectInput) -> Transition {
    use ConnectAction as A;
    use ConnectInput as I;
    use ConnectState as S;

    let (action, next) = match (state, input) {
        (S::Idle, I::Begin) => (Some(A::Dial), S::Connecting),

        // Allocation failed synchronously: skip the attempt and back off
        // instead of busy-looping on an exhausted resource.
        (S::Connecting, I::DialUnavailable) => (Some(A::StartTimer), S::Waiting),
        (S::Connecting, I::SocketConnected) => (Some(A::StartSession), S::Active),
        (S::Connecting, I::SocketError) => (Some(A::StopSocket), S::StoppingSocket),
        (S::Connecting, I::Stop) => (Some(A::StopSocket), S::StoppingSocketFinal),

        (S::StoppingSocket, I::SocketStopped) => (Some(A::StartTimer), S::Waiting),
        // Socket stop already in flight; merge the owner stop.
        (S::StoppingSocket, I::Stop) => (None, S::StoppingSocketFinal),

        (S::Waiting, I::TimerTimeout) => (Some(A::StopTimer), S::StoppingTimer),
        (S::Waiting, I::Stop) => (Some(A::StopTimer), S::StoppingTimerFinal),

        (S::StoppingTimer, I::TimerStopped) => (Some(A::Dial), S::Connecting),
        // Timer stop already in flight; merge the owner stop.
        (S::StoppingTimer, I::Stop) => (None, S::StoppingTimerFinal),

        (S::StoppingSocketFinal, I::SocketStopped) => (Some(A::ReportStopped), S::Idle),
        (S::StoppingTimerFinal, I::TimerStopped) => (Some(A::ReportStopped), S::Idle),

        (S::Active, I::SessionError) => (Some(A::StopSocket), S::StoppingSocket),
        (S::Active, I::Stop) => (Some(A::StopSession), S::StoppingSession),

        (S::StoppingSession, I::SessionStopped) => (Some(A::StopSocket), S::StoppingSocketFinal),

        (state, input) => invalid_transition(state, input),
    };
    Transition { action, next }
}

#[cold]
fn invalid_transition(state: ConnectState, input: ConnectInput) -> ! {
    panic!("invalid connect endpoint transition: {input:?} in state {state:?}");
}

#[cfg(test)]
mod tests {
    use super::ConnectAction as A;
    use super::ConnectInput as I;
    use super::ConnectState as S;
    use super::*;

    fn assert_step(state: S, input: I, action: Option<A>, next: S) {
        assert_eq!(
            step(state, input),
            Transition { action, next },
            "({state:?}, {input:?})"
        );
    }

    #[test]
    fn happy_path_reaches_active() {
        assert_step(S::Idle, I::Begin, Some(A::Dial), S::Connecting);
        assert_step(S::Connecting, I::SocketConnected, Some(A::StartSession), S::Active);
    }

    #[test]
    fn retry_cycle_passes_through_every_state() {
        // Connecting -> StoppingSocket -> Waiting -> StoppingTimer ->
        // Connecting, N times, with no state skipped.
        let mut state = step(S::Idle, I::Begin).next;
        for _ in 0..3 {
            assert_eq!(state, S::Connecting);
            let t = step(state, I::SocketError);
            assert_eq!((t.action, t.next), (Some(A::StopSocket), S::StoppingSocket));
            let t = step(t.next, I::SocketStopped);
            assert_eq!((t.action, t.next), (Some(A::StartTimer), S::Waiting));
            let t = step(t.next, I::TimerTimeout);
            assert_eq!((t.action, t.next), (Some(A::StopTimer), S::StoppingTimer));
            let t = step(t.next, I::TimerStopped);
            assert_eq!((t.action, t.next), (Some(A::Dial), S::Connecting));
            state = t.next;
        }
        // Attempt N+1 succeeds.
        assert_step(state, I::SocketConnected, Some(A::StartSession), S::Active);
    }

    #[test]
    fn allocation_failure_skips_straight_to_waiting() {
        let state = step(S::Idle, I::Begin).next;
        assert_step(state, I::DialUnavailable, Some(A::StartTimer), S::Waiting);
    }

    #[test]
    fn stop_from_connecting_drains_socket() {
        assert_step(S::Connecting, I::Stop, Some(A::StopSocket), S::StoppingSocketFinal);
        assert_step(S::StoppingSocketFinal, I::SocketStopped, Some(A::ReportStopped), S::Idle);
    }

    #[test]
    fn stop_from_waiting_drains_timer_without_reconnecting() {
        assert_step(S::Waiting, I::Stop, Some(A::StopTimer), S::StoppingTimerFinal);
        assert_step(S::StoppingTimerFinal, I::TimerStopped, Some(A::ReportStopped), S::Idle);
    }

    #[test]
    fn stop_during_transient_teardown_is_merged_not_dropped() {
        // The in-flight collaborator stop is reused; only the destination
        // changes to the final-stopping variant.
        assert_step(S::StoppingSocket, I::Stop, None, S::StoppingSocketFinal);
        assert_step(S::StoppingTimer, I::Stop, None, S::StoppingTimerFinal);
    }

    #[test]
    fn session_error_routes_back_into_retry() {
        assert_step(S::Active, I::SessionError, Some(A::StopSocket), S::StoppingSocket);
        assert_step(S::StoppingSocket, I::SocketStopped, Some(A::StartTimer), S::Waiting);
    }

    #[test]
    fn stop_while_active_tears_down_session_then_socket() {
        assert_step(S::Active, I::Stop, Some(A::StopSession), S::StoppingSession);
        assert_step(S::StoppingSession, I::SessionStopped, Some(A::StopSocket), S::StoppingSocketFinal);
        assert_step(S::StoppingSocketFinal, I::SocketStopped, Some(A::ReportStopped), S::Idle);
    }

    #[test]
    #[should_panic(expected = "invalid connect endpoint transition")]
    fn connected_while_idle_is_fatal() {
        step(S::Idle, I::SocketConnected);
    }

    #[test]
    #[should_panic(expected = "invalid connect endpoint transition")]
    fn timeout_while_active_is_fatal() {
        step(S::Active, I::TimerTimeout);
    }

    #[test]
    #[should_panic(expected = "invalid connect endpoint transition")]
    fn socket_stopped_while_waiting_is_fatal() {
        step(S::Waiting, I::SocketStopped);
    }

    #[test]
    fn every_unlisted_pair_is_fatal() {
        use std::panic::{AssertUnwindSafe, catch_unwind};

        const STATES: [S; 9] = [
            S::Idle,
            S::Connecting,
            S::StoppingSocket,
            S::Waiting,
            S::StoppingTimer,
            S::StoppingSocketFinal,
            S::StoppingTimerFinal,
            S::Active,
            S::StoppingSession,
        ];
        const INPUTS: [I; 10] = [
            I::Begin,
            I::DialUnavailable,
            I::SocketConnected,
            I::SocketError,
            I::SocketStopped,
            I::TimerTimeout,
            I::TimerStopped,
            I::SessionError,
            I::SessionStopped,
            I::Stop,
        ];
        const LISTED: [(S, I); 16] = [
            (S::Idle, I::Begin),
            (S::Connecting, I::DialUnavailable),
            (S::Connecting, I::SocketConnected),
            (S::Connecting, I::SocketError),
            (S::Connecting, I::Stop),
            (S::StoppingSocket, I::SocketStopped),
            (S::StoppingSocket, I::Stop),
            (S::Waiting, I::TimerTimeout),
            (S::Waiting, I::Stop),
            (S::StoppingTimer, I::TimerStopped),
            (S::StoppingTimer, I::Stop),
            (S::StoppingSocketFinal, I::SocketStopped),
            (S::StoppingTimerFinal, I::TimerStopped),
            (S::Active, I::SessionError),
            (S::Active, I::Stop),
            (S::StoppingSession, I::SessionStopped),
        ];
        for state in STATES {
            for input in INPUTS {
                let is_listed = LISTED.contains(&(state, input));
                let result = catch_unwind(AssertUnwindSafe(|| step(state, input)));
                assert_eq!(
                    result.is_ok(),
                    is_listed,
                    "exhaustiveness mismatch for ({state:?}, {input:?})"
                );
            }
        }
    }
}
