//! Async socket collaborator driver.
//!
//! Wraps the non-blocking connect/accept primitives behind the
//! start-then-complete contract the endpoint state machines rely on:
//! every `begin_*` spawns at most one in-flight operation which delivers
//! exactly one terminal [`SocketEvent`], and `stop` cancels whatever is in
//! flight and delivers exactly one [`SocketEvent::Stopped`] once the
//! operation task has settled.
//!
//! Event-source identity is structural: each endpoint owns its driver and
//! the receiving half of its event channel, so a socket completion can
//! never be confused with a timer or session completion.

use std::io;
use std::sync::Arc;

use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::trace;

use crate::addr::IpcAddr;
use crate::error::TransportError;

/// Completion events delivered by a [`SocketDriver`].
#[derive(Debug)]
pub enum SocketEvent {
    /// A connect or accept completed; the stream is ready for the data
    /// phase and ownership transfers with the event.
    Ready(UnixStream),
    /// The in-flight operation failed.
    Error(io::Error),
    /// A requested stop has fully drained.
    Stopped,
}

/// Non-blocking socket wrapper with exactly-once completion events.
#[derive(Debug)]
pub struct SocketDriver {
    events: mpsc::Sender<SocketEvent>,
    op: Option<JoinHandle<()>>,
    cancel: Option<oneshot::Sender<()>>,
}

impl SocketDriver {
    /// Creates a driver and the receiving half of its event channel.
    #[must_use]
    pub fn new() -> (Self, mpsc::Receiver<SocketEvent>) {
        let (events, events_rx) = mpsc::channel(4);
        let driver = Self {
            events,
            op: None,
            cancel: None,
        };
        (driver, events_rx)
    }

    /// Begins a non-blocking connect to `addr`.
    ///
    /// The connect outcome arrives later as [`SocketEvent::Ready`] or
    /// [`SocketEvent::Error`].
    ///
    /// # Errors
    ///
    /// `Err` means the attempt could not be started at all and no
    /// completion event will be delivered; callers skip the attempt and
    /// back off. Spawning onto the runtime cannot fail, so the current
    /// implementation always returns `Ok`.
    ///
    /// # Panics
    ///
    /// Panics if an operation is already in flight.
    pub fn begin_connect(&mut self, addr: &IpcAddr) -> Result<(), TransportError> {
        assert!(self.op.is_none(), "socket operation already in flight");
        trace!(addr = %addr, "dialing");

        let path = addr.path().to_owned();
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        let events = self.events.clone();
        self.cancel = Some(cancel_tx);
        self.op = Some(tokio::spawn(async move {
            tokio::select! {
                _ = cancel_rx => {}
                result = UnixStream::connect(&path) => {
                    let event = match result {
                        Ok(stream) => SocketEvent::Ready(stream),
                        Err(e) => SocketEvent::Error(e),
                    };
                    let _ = events.send(event).await;
                }
            }
        }));
        Ok(())
    }

    /// Begins a non-blocking accept on the borrowed `listener`.
    ///
    /// The `Arc` is the borrowed listener reference from the owning
    /// acceptor; it is released when the operation settles.
    ///
    /// # Panics
    ///
    /// Panics if an operation is already in flight.
    pub fn begin_accept(&mut self, listener: Arc<UnixListener>) {
        assert!(self.op.is_none(), "socket operation already in flight");

        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        let events = self.events.clone();
        self.cancel = Some(cancel_tx);
        self.op = Some(tokio::spawn(async move {
            tokio::select! {
                _ = cancel_rx => {}
                result = listener.accept() => {
                    let event = match result {
                        Ok((stream, _peer)) => SocketEvent::Ready(stream),
                        Err(e) => SocketEvent::Error(e),
                    };
                    let _ = events.send(event).await;
                }
            }
        }));
    }

    /// Cancels any in-flight operation and schedules the `Stopped`
    /// completion.
    ///
    /// Safe to call with nothing in flight (the connected stream may have
    /// been handed to a session); `Stopped` is still delivered exactly
    /// once.
    pub fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
        let op = self.op.take();
        let events = self.events.clone();
        tokio::spawn(async move {
            if let Some(op) = op {
                let _ = op.await;
            }
            let _ = events.send(SocketEvent::Stopped).await;
        });
    }

    /// Discards a settled operation without emitting a stop completion.
    ///
    /// Used when an accept fails: the endpoint owns no socket and returns
    /// to idle directly, so there is no stop cycle to drain.
    pub fn reap(&mut self) {
        self.cancel = None;
        if let Some(op) = self.op.take() {
            op.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tempfile::TempDir;
    use tokio::time::timeout;

    use super::*;

    #[tokio::test]
    async fn connect_to_missing_path_reports_error_then_stop_drains() {
        let tmp = TempDir::new().unwrap();
        let addr = IpcAddr::new(tmp.path().join("nobody.sock")).unwrap();

        let (mut socket, mut rx) = SocketDriver::new();
        socket.begin_connect(&addr).unwrap();

        match rx.recv().await {
            Some(SocketEvent::Error(_)) => {},
            other => panic!("expected error completion, got {other:?}"),
        }

        socket.stop();
        assert!(matches!(rx.recv().await, Some(SocketEvent::Stopped)));
    }

    #[tokio::test]
    async fn connect_to_live_listener_delivers_stream() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("live.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let addr = IpcAddr::new(&path).unwrap();

        let (mut socket, mut rx) = SocketDriver::new();
        socket.begin_connect(&addr).unwrap();

        let accepted = tokio::spawn(async move { listener.accept().await });
        match timeout(Duration::from_secs(1), rx.recv()).await.unwrap() {
            Some(SocketEvent::Ready(_stream)) => {},
            other => panic!("expected ready completion, got {other:?}"),
        }
        accepted.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn stop_cancels_inflight_accept() {
        let tmp = TempDir::new().unwrap();
        let listener = Arc::new(UnixListener::bind(tmp.path().join("l.sock")).unwrap());

        let (mut socket, mut rx) = SocketDriver::new();
        socket.begin_accept(listener);
        socket.stop();

        let event = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("stop did not drain");
        assert!(matches!(event, Some(SocketEvent::Stopped)));
    }

    #[tokio::test]
    #[should_panic(expected = "socket operation already in flight")]
    async fn double_start_panics() {
        let tmp = TempDir::new().unwrap();
        let addr = IpcAddr::new(tmp.path().join("x.sock")).unwrap();
        let (mut socket, _rx) = SocketDriver::new();
        socket.begin_connect(&addr).unwrap();
        socket.begin_connect(&addr).unwrap();
    }
}
