//! Connect endpoint: dials a remote address, retries with backoff, and
//! hands the established socket to a session handler.
//!
//! The endpoint runs as a single task that selects over its owner command
//! channel and one event channel per collaborator (socket, timer, session).
//! Events are therefore handled strictly one at a time, and the arrival
//! channel identifies the emitting collaborator structurally. Each event is
//! fed to the pure [`machine`] table; the resulting action is executed
//! against the owning collaborator before the next event is taken.
//!
//! Retries continue indefinitely until the owner issues a stop: a client
//! endpoint keeps trying to reconnect for as long as its owner wants it
//! alive. Teardown from any state drains every in-flight collaborator
//! operation before the exactly-once stopped notification fires.

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::net::UnixStream;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, trace, warn};

pub mod machine;

pub use machine::ConnectState;

use crate::config::ConnectConfig;
use crate::endpoint::{Endpoint, EndpointId};
use crate::retry::{RetryTimer, TimerEvent};
use crate::session::{SessionDriver, SessionEvent, SessionHandler};
use crate::socket::{SocketDriver, SocketEvent};

use machine::{ConnectAction, ConnectInput};

/// Owner-facing handle to a running connect endpoint.
#[derive(Debug)]
pub struct ConnectHandle {
    id: EndpointId,
    stop_tx: mpsc::Sender<()>,
    stopped_rx: Option<oneshot::Receiver<()>>,
    state_rx: watch::Receiver<ConnectState>,
}

impl ConnectHandle {
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

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectState {
        *self.state_rx.borrow()
    }

    /// Waits for the next state change and returns the new state.
    pub async fn state_changed(&mut self) -> ConnectState {
        let _ = self.state_rx.changed().await;
        *self.state_rx.borrow()
    }
}

impl Endpoint for ConnectHandle {
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

/// The connect endpoint driver task.
pub struct ConnectEndpoint {
    id: EndpointId,
    config: ConnectConfig,
    handler: Arc<dyn SessionHandler>,
    state: ConnectState,
    state_tx: watch::Sender<ConnectState>,
    socket: SocketDriver,
    socket_rx: mpsc::Receiver<SocketEvent>,
    timer: RetryTimer,
    timer_rx: mpsc::Receiver<TimerEvent>,
    session: SessionDriver,
    session_rx: mpsc::Receiver<SessionEvent>,
    stop_rx: mpsc::Receiver<()>,
    stopped_tx: Option<oneshot::Sender<()>>,
    pending_stream: Option<UnixStream>,
    socket_stopping: bool,
    timer_stopping: bool,
    session_stopping: bool,
    stop_seen: bool,
}

impl ConnectEndpoint {
    /// Creates the endpoint and immediately begins its first connect
    /// attempt on a spawned driver task.
    #[must_use]
    pub fn spawn(config: ConnectConfig, handler: Arc<dyn SessionHandler>) -> ConnectHandle {
        let id = EndpointId::next();
        let (socket, socket_rx) = SocketDriver::new();
        let (timer, timer_rx) = RetryTimer::new(config.retry.clone());
        let (session, session_rx) = SessionDriver::new();
        let (stop_tx, stop_rx) = mpsc::channel(1);
        let (stopped_tx, stopped_rx) = oneshot::channel();
        let (state_tx, state_rx) = watch::channel(ConnectState::Idle);

        let endpoint = Self {
            id,
            config,
            handler,
            state: ConnectState::Idle,
            state_tx,
            socket,
            socket_rx,
            timer,
            timer_rx,
            session,
            session_rx,
            stop_rx,
            stopped_tx: Some(stopped_tx),
            pending_stream: None,
            socket_stopping: false,
            timer_stopping: false,
            session_stopping: false,
            stop_seen: false,
        };
        tokio::spawn(endpoint.run());

        ConnectHandle {
            id,
            stop_tx,
            stopped_rx: Some(stopped_rx),
            state_rx,
        }
    }

    async fn run(mut self) {
        debug!(endpoint = %self.id, addr = %self.config.addr, "connect endpoint starting");
        self.apply(ConnectInput::Begin);

        while self.stopped_tx.is_some() {
            tokio::select! {
                biased;
                stop = self.stop_rx.recv(), if !self.stop_seen => {
                    // `None` means the owner dropped the handle without an
                    // explicit stop; treat it the same way.
                    let _ = stop;
                    self.stop_seen = true;
                    self.apply(ConnectInput::Stop);
                }
                Some(event) = self.socket_rx.recv() => self.on_socket_event(event),
                Some(event) = self.timer_rx.recv() => self.on_timer_event(event),
                Some(event) = self.session_rx.recv() => self.on_session_event(event),
            }
        }
        info!(endpoint = %self.id, addr = %self.config.addr, "connect endpoint stopped");
    }

    fn on_socket_event(&mut self, event: SocketEvent) {
        match event {
            SocketEvent::Stopped => {
                self.socket_stopping = false;
                self.apply(ConnectInput::SocketStopped);
            },
            // A completion that raced the stop request; the stop drain
            // supersedes it.
            _ if self.socket_stopping => {
                trace!(endpoint = %self.id, "discarding socket completion superseded by stop");
            },
            SocketEvent::Ready(stream) => {
                self.pending_stream = Some(stream);
                self.apply(ConnectInput::SocketConnected);
            },
            SocketEvent::Error(error) => {
                warn!(endpoint = %self.id, addr = %self.config.addr, %error, "connect attempt failed");
                self.apply(ConnectInput::SocketError);
            },
        }
    }

    fn on_timer_event(&mut self, event: TimerEvent) {
        match event {
            TimerEvent::Stopped => {
                self.timer_stopping = false;
                self.apply(ConnectInput::TimerStopped);
            },
            TimerEvent::Timeout if self.timer_stopping => {
                trace!(endpoint = %self.id, "discarding timeout superseded by stop");
            },
            TimerEvent::Timeout => self.apply(ConnectInput::TimerTimeout),
        }
    }

    fn on_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Stopped => {
                self.session_stopping = false;
                self.apply(ConnectInput::SessionStopped);
            },
            SessionEvent::Error(error) if self.session_stopping => {
                trace!(endpoint = %self.id, %error, "discarding session error superseded by stop");
            },
            SessionEvent::Error(error) => {
                warn!(endpoint = %self.id, addr = %self.config.addr, %error, "session failed; reconnecting");
                // The handler task already terminated with the error.
                self.session.reap();
                self.apply(ConnectInput::SessionError);
            },
        }
    }

    fn apply(&mut self, input: ConnectInput) {
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
            ConnectAction::Dial => {
                if let Err(error) = self.socket.begin_connect(&self.config.addr) {
                    debug!(endpoint = %self.id, %error, "socket allocation failed; backing off");
                    self.apply(ConnectInput::DialUnavailable);
                }
            },
            ConnectAction::StopSocket => {
                self.socket_stopping = true;
                self.socket.stop();
            },
            ConnectAction::StartTimer => self.timer.start(),
            ConnectAction::StopTimer => {
                self.timer_stopping = true;
                self.timer.stop();
            },
            ConnectAction::StartSession => {
                let Some(stream) = self.pending_stream.take() else {
                    unreachable!("SocketConnected always stashes the stream first");
                };
                info!(endpoint = %self.id, addr = %self.config.addr, "connected; starting session");
                self.timer.note_connected();
                self.session.start(Arc::clone(&self.handler), stream);
            },
            ConnectAction::StopSession => {
                self.session_stopping = true;
                self.session.stop();
            },
            ConnectAction::ReportStopped => {
                if let Some(stopped) = self.stopped_tx.take() {
                    let _ = stopped.send(());
                }
            },
        }
    }
}
