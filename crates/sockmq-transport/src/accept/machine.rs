//! Transition table for the accept endpoint.
//!
//! Structurally symmetric to the connect table but smaller: there is no
//! retry concept per accepted connection, so an accept failure reports
//! completion to the owner immediately instead of backing off.

/// States of the accept endpoint lifecycle.
///
/// `Idle` is initial and terminal; the `idle()` predicate of the endpoint
/// is true exactly in this state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptState {
    /// Holds no socket or session; safe to destroy or recycle.
    Idle,
    /// An accept on the borrowed listener socket is in flight.
    Accepting,
    /// Accepted; the session handler owns the data phase.
    Active,
    /// Draining the session during teardown.
    StoppingSession,
    /// Draining the accepted socket during teardown.
    StoppingSocket,
}

/// Inputs consumed by the accept machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptInput {
    /// Kick off the accept on the borrowed listener.
    Begin,
    /// Socket: accept completed; the new socket is owned now.
    SocketAccepted,
    /// Socket: accept failed; no socket was ever owned.
    SocketError,
    /// Socket: stop drained.
    SocketStopped,
    /// Session: data phase failed.
    SessionError,
    /// Session: stop drained.
    SessionStopped,
    /// Owner: stop request.
    Stop,
}

/// Collaborator commands issued by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptAction {
    /// Issue the non-blocking accept on the borrowed listener.
    IssueAccept,
    /// Start the session handler on the accepted socket.
    StartSession,
    /// Stop the session handler.
    StopSession,
    /// Stop the accepted socket (or cancel the in-flight accept).
    StopSocket,
    /// Report completion to the owner; `idle()` becomes true.
    ReportDone,
}

/// Result of one transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Command to execute, if the transition carries one.
    pub action: Option<AcceptAction>,
    /// State after the transition.
    pub next: AcceptState,
}

/// Advances the machine by one input.
///
/// # Panics
///
/// Panics on any `(state, input)` pair outside the transition table.
pub fn step(state: AcceptState, input: AcceptInput) -> Transition {
    use AcceptAction as A;
    use AcceptInput as I;
    use AcceptState as S;

    let (action, next) = match (state, input) {
        (S::Idle, I::Begin) => (Some(A::IssueAccept), S::Accepting),

        (S::Accepting, I::SocketAccepted) => (Some(A::StartSession), S::Active),
        // No socket was ever owned; report upward immediately.
        (S::Accepting, I::SocketError) => (Some(A::ReportDone), S::Idle),
        (S::Accepting, I::Stop) => (Some(A::StopSocket), S::StoppingSocket),

        (S::Active, I::Stop) | (S::Active, I::SessionError) => {
            (Some(A::StopSession), S::StoppingSession)
        },

        (S::StoppingSession, I::SessionStopped) => (Some(A::StopSocket), S::StoppingSocket),
        // Teardown already in flight; merge the owner stop.
        (S::StoppingSession, I::Stop) => (None, S::StoppingSession),

        (S::StoppingSocket, I::SocketStopped) => (Some(A::ReportDone), S::Idle),
        (S::StoppingSocket, I::Stop) => (None, S::StoppingSocket),

        (state, input) => invalid_transition(state, input),
    };
    Transition { action, next }
}

#[cold]
fn invalid_transition(state: AcceptState, input: AcceptInput) -> ! {
    panic!("invalid accept endpoint transition: {input:?} in state {state:?}");
}
