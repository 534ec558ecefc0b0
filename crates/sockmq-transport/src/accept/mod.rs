//! Accept endpoint: drives a single passively-accepted connection from
//! listener hand-off through active session to termination.
//!
//! The owning listener creates one accept endpoint per connection it
//! decides to accept, lends it the listener socket for the duration of the
//! accept phase, and keeps the handle in a collection keyed by
//! [`EndpointId`]. The endpoint posts [`AcceptNotice::Accepted`] when the
//! hand-off completes (so the listener can arm a successor) and
//! [`AcceptNotice::Done`] once it has fully wound down, at which point
//! [`AcceptHandle::is_idle`] is true and the handle may be reclaimed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::BoxFuture;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, trace, warn};

pub mod machine;

pub use machine::AcceptState;

use crate::endpoint::{Endpoint, EndpointId};
use crate::session::{SessionDriver, SessionEvent, SessionHandler};
use crate::socket::{SocketDriver, SocketEvent};

use machine::{AcceptAction, AcceptInput};

/// Lifecycle notices an accept endpoint posts to its owning listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptNotice {
    /// The posting endpoint's membership token.
    pub id: EndpointId,
    /// What happened.
    pub kind: AcceptNoticeKind,
}

/// Kinds of owner notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptNoticeKind {
    /// The pending accept completed; the listener socket is released and
    /// the owner may arm a successor endpoint.
    Accepted,
    /// The endpoint reached idle again (after teardown or an accept
    /// failure) and may be reclaimed.
    Done,
}

/// Owner-facing handle to a running accept endpoint.
#[derive(Debug)]
pub struct AcceptHandle {
    id: EndpointId,
    stop_tx: mpsc::Sender<()>,
    stopped_rx: Option<oneshot::Receiver<()>>,
    state_rx: watch::Receiver<AcceptState>,
    idle: Arc<AtomicBool>,
}

impl AcceptHandle {
    /// This endpoint's membership token.
    #[must_use]
    pub fn id(&self) -> EndpointId {
        self.id
    }

    /// Requests teardown. Idempotent; repeats are ignored.
    pub fn stop(&self) {
        let _ = self.stop_tx.try_send(());
    }

    /// Completes once teardown has fully drained.
    pub async fn wait_stopped(&mut self) {
        if let Some(stopped) = self.stopped_rx.take() {
            let _ = stopped.await;
        }
    }

    /// True exactly while the endpoint holds no socket or session, i.e.
    /// while it is safe for the owner to destroy or recycle it.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.idle.load(Ordering::Acquire)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> AcceptState {
        *self.state_rx.borrow()
    }
}

impl Endpoint for AcceptHandle {
    fn id(&self) -> EndpointId {
        self.id
    }

    fn stop(&self) {
        Self::stop(self);
    }

    fn stopped(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(self.wait_stopped())
    }
}

/// The accept endpoint driver task.
pub struct AcceptEndpoint {
    id: EndpointId,
    handler: Arc<dyn SessionHandler>,
    // Borrowed listener socket, valid only until the accept phase ends.
    listener: Option<Arc<UnixListener>>,
    notices: mpsc::UnboundedSender<AcceptNotice>,
    state: AcceptState,
    state_tx: watch::Sender<AcceptState>,
    socket: SocketDriver,
    socket_rx: mpsc::Receiver<SocketEvent>,
    session: SessionDriver,
    session_rx: mpsc::Receiver<SessionEvent>,
    stop_rx: mpsc::Receiver<()>,
    stopped_tx: Option<oneshot::Sender<()>>,
    pending_stream: Option<UnixStream>,
    idle: Arc<AtomicBool>,
    socket_stopping: bool,
    session_stopping: bool,
    stop_seen: bool,
}

impl AcceptEndpoint {
    /// Creates the endpoint, entrusts it with a pending accept on the
    /// borrowed `listener`, and starts its driver task.
    #[must_use]
    pub fn spawn(
        listener: &Arc<UnixListener>,
        handler: Arc<dyn SessionHandler>,
        notices: mpsc::UnboundedSender<AcceptNotice>,
    ) -> AcceptHandle {
        let id = EndpointId::next();
        let (socket, socket_rx) = SocketDriver::new();
        let (session, session_rx) = SessionDriver::new();
        let (stop_tx, stop_rx) = mpsc::channel(1);
        let (stopped_tx, stopped_rx) = oneshot::channel();
        let (state_tx, state_rx) = watch::channel(AcceptState::Idle);
        let idle = Arc::new(AtomicBool::new(false));

        let endpoint = Self {
            id,
            handler,
            listener: Some(Arc::clone(listener)),
            notices,
            state: AcceptState::Idle,
            state_tx,
            socket,
            socket_rx,
            session,
            session_rx,
            stop_rx,
            stopped_tx: Some(stopped_tx),
            pending_stream: None,
            idle: Arc::clone(&idle),
            socket_stopping: false,
            session_stopping: false,
            stop_seen: false,
        };
        tokio::spawn(endpoint.run());

        AcceptHandle {
            id,
            stop_tx,
            stopped_rx: Some(stopped_rx),
            state_rx,
            idle,
        }
    }

    async fn run(mut self) {
        debug!(endpoint = %self.id, "accept endpoint starting");
        self.apply(AcceptInput::Begin);

        while self.stopped_tx.is_some() {
            tokio::select! {
                biased;
                stop = self.stop_rx.recv(), if !self.stop_seen => {
                    // `None` means the owner dropped the handle without an
                    // explicit stop; treat it the same way.
                    let _ = stop;
                    self.stop_seen = true;
                    self.apply(AcceptInput::Stop);
                }
                Some(event) = self.socket_rx.recv() => self.on_socket_event(event),
                Some(event) = self.session_rx.recv() => self.on_session_event(event),
            }
        }
        debug!(endpoint = %self.id, "accept endpoint done");
    }

    fn on_socket_event(&mut self, event: SocketEvent) {
        match event {
            SocketEvent::Stopped => {
                self.socket_stopping = false;
                self.apply(AcceptInput::SocketStopped);
            },
            _ if self.socket_stopping => {
                trace!(endpoint = %self.id, "discarding socket completion superseded by stop");
            },
            SocketEvent::Ready(stream) => {
                self.pending_stream = Some(stream);
                self.apply(AcceptInput::SocketAccepted);
            },
            SocketEvent::Error(error) => {
                warn!(endpoint = %self.id, %error, "accept failed");
                // The accept task settled with the error; nothing to drain.
                self.socket.reap();
                self.apply(AcceptInput::SocketError);
            },
        }
    }

    fn on_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Stopped => {
                self.session_stopping = false;
                self.apply(AcceptInput::SessionStopped);
            },
            SessionEvent::Error(error) if self.session_stopping => {
                trace!(endpoint = %self.id, %error, "discarding session error superseded by stop");
            },
            SessionEvent::Error(error) => {
                warn!(endpoint = %self.id, %error, "session failed; tearing down");
                self.apply(AcceptInput::SessionError);
            },
        }
    }

    fn apply(&mut self, input: AcceptInput) {
        let transition = machine::step(self.state, input);
        trace!(
            endpoint = %self.id,
            from = ?self.state,
            input = ?input,
            to = ?transition.next,
            "transition"
        );
        self.state = transition.next;
        self.state_tx.send_replace(transition.next);

        let Some(action) = transition.action else {
            return;
        };
        match action {
            AcceptAction::IssueAccept => {
                let Some(listener) = self.listener.take() else {
                    unreachable!("accept endpoints are armed exactly once");
                };
                self.socket.begin_accept(listener);
            },
            AcceptAction::StartSession => {
                let Some(stream) = self.pending_stream.take() else {
                    unreachable!("SocketAccepted always stashes the stream first");
                };
                info!(endpoint = %self.id, "accepted; starting session");
                self.session.start(Arc::clone(&self.handler), stream);
                self.notify(AcceptNoticeKind::Accepted);
            },
            AcceptAction::StopSession => {
                self.session_stopping = true;
                self.session.stop();
            },
            AcceptAction::StopSocket => {
                self.socket_stopping = true;
                self.socket.stop();
            },
            AcceptAction::ReportDone => {
                self.idle.store(true, Ordering::Release);
                self.notify(AcceptNoticeKind::Done);
                if let Some(stopped) = self.stopped_tx.take() {
                    let _ = stopped.send(());
                }
            },
        }
    }

    fn notify(&self, kind: AcceptNoticeKind) {
        let notice = AcceptNotice { id: self.id, kind };
        if self.notices.send(notice).is_err() {
            trace!(endpoint = %self.id, ?kind, "owner notice channel closed");
        }
    }
}
