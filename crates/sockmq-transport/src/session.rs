//! Session handler boundary.
//!
//! The session handler owns an established socket and runs the data-phase
//! protocol; the framing itself is outside this crate. Endpoints interact
//! with it through [`SessionDriver`], which enforces the lifecycle
//! contract: start only once a socket is established, at most one
//! [`SessionEvent::Error`] reported upward, and exactly one
//! [`SessionEvent::Stopped`] per stop request, delivered only after the
//! handler task has settled.

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::net::UnixStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::TransportError;

/// Completion events delivered by a [`SessionDriver`].
#[derive(Debug)]
pub enum SessionEvent {
    /// The data phase failed. Emitted at most once per session.
    Error(TransportError),
    /// A requested stop has fully drained.
    Stopped,
}

/// Runs the data-phase protocol on an established stream.
///
/// Implementations should return `Ok(())` once `shutdown` resolves and
/// `Err(_)` on a data-phase failure (including an unexpected peer close,
/// which the owning endpoint treats like any other session error).
pub trait SessionHandler: Send + Sync + 'static {
    /// Takes ownership of `stream` and runs until failure or shutdown.
    fn run(
        self: Arc<Self>,
        stream: UnixStream,
        shutdown: oneshot::Receiver<()>,
    ) -> BoxFuture<'static, Result<(), TransportError>>;
}

/// Drives one session handler activation at a time.
#[derive(Debug)]
pub struct SessionDriver {
    events: mpsc::Sender<SessionEvent>,
    task: Option<JoinHandle<()>>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl SessionDriver {
    /// Creates a driver and the receiving half of its event channel.
    #[must_use]
    pub fn new() -> (Self, mpsc::Receiver<SessionEvent>) {
        let (events, events_rx) = mpsc::channel(4);
        let driver = Self {
            events,
            task: None,
            shutdown: None,
        };
        (driver, events_rx)
    }

    /// Starts the handler on an established stream.
    ///
    /// # Panics
    ///
    /// Panics if a session is already running; the previous activation must
    /// be stopped or reaped first.
    pub fn start(&mut self, handler: Arc<dyn SessionHandler>, stream: UnixStream) {
        assert!(self.task.is_none(), "session already running");

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let events = self.events.clone();
        self.shutdown = Some(shutdown_tx);
        self.task = Some(tokio::spawn(async move {
            if let Err(e) = handler.run(stream, shutdown_rx).await {
                let _ = events.send(SessionEvent::Error(e)).await;
            }
        }));
    }

    /// Signals shutdown and schedules the `Stopped` completion.
    ///
    /// Also valid on a session that already failed: the finished task is
    /// joined and `Stopped` is still delivered exactly once.
    pub fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        let task = self.task.take();
        let events = self.events.clone();
        tokio::spawn(async move {
            if let Some(task) = task {
                let _ = task.await;
            }
            let _ = events.send(SessionEvent::Stopped).await;
        });
    }

    /// Discards a failed activation without a stop cycle.
    ///
    /// Used by the connect endpoint, which answers a session error by
    /// stopping its socket rather than the already-dead session.
    pub fn reap(&mut self) {
        self.shutdown = None;
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
