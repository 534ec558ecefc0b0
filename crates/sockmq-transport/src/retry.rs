//! Retry timer collaborator.
//!
//! A one-shot timer used by the connect endpoint to wait between failed
//! connection attempts. `start` and `stop` return immediately; each delivers
//! exactly one completion event on the timer's event channel:
//!
//! - `start()` arms the timer and eventually delivers [`TimerEvent::Timeout`]
//!   unless the timer is stopped first.
//! - `stop()` cancels any in-flight wait and delivers
//!   [`TimerEvent::Stopped`] once the wait task has settled, whether or not
//!   the timeout already fired.
//!
//! The timer owns interval selection: it tracks the attempt counter and
//! derives each interval from its [`RetryConfig`], so growth and jitter
//! policy never leak into the endpoint state machines.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::trace;

use crate::config::RetryConfig;

/// Completion events delivered by a [`RetryTimer`].
#[derive(Debug, PartialEq, Eq)]
pub enum TimerEvent {
    /// The armed interval elapsed.
    Timeout,
    /// A requested stop has fully drained.
    Stopped,
}

/// One-shot backoff timer with exactly-once completion events.
#[derive(Debug)]
pub struct RetryTimer {
    config: RetryConfig,
    events: mpsc::Sender<TimerEvent>,
    attempt: u32,
    wait: Option<JoinHandle<()>>,
    cancel: Option<oneshot::Sender<()>>,
}

impl RetryTimer {
    /// Creates a timer and the receiving half of its event channel.
    #[must_use]
    pub fn new(config: RetryConfig) -> (Self, mpsc::Receiver<TimerEvent>) {
        let (events, events_rx) = mpsc::channel(4);
        let timer = Self {
            config,
            events,
            attempt: 0,
            wait: None,
            cancel: None,
        };
        (timer, events_rx)
    }

    /// Arms the timer for the next retry interval.
    ///
    /// # Panics
    ///
    /// Panics if a wait is already in flight; every `start` must be paired
    /// with a terminating event before the timer is started again.
    pub fn start(&mut self) {
        assert!(self.wait.is_none(), "retry timer already armed");
        self.attempt += 1;
        let interval = self.config.interval_for_attempt(self.attempt);
        trace!(attempt = self.attempt, ?interval, "arming retry timer");

        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        let events = self.events.clone();
        self.cancel = Some(cancel_tx);
        self.wait = Some(tokio::spawn(async move {
            tokio::select! {
                _ = cancel_rx => {}
                () = sleep(interval) => {
                    let _ = events.send(TimerEvent::Timeout).await;
                }
            }
        }));
    }

    /// Cancels any in-flight wait and schedules the `Stopped` completion.
    ///
    /// The completion is delivered only after the wait task has settled, so
    /// the timer may be re-armed as soon as `Stopped` is observed.
    pub fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
        let wait = self.wait.take();
        let events = self.events.clone();
        tokio::spawn(async move {
            if let Some(wait) = wait {
                let _ = wait.await;
            }
            let _ = events.send(TimerEvent::Stopped).await;
        });
    }

    /// Resets backoff growth after a successful connect.
    pub fn note_connected(&mut self) {
        self.attempt = 0;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;

    #[tokio::test]
    async fn timeout_then_stop_delivers_both_events() {
        let (mut timer, mut rx) = RetryTimer::new(RetryConfig::fixed(Duration::from_millis(5)));
        timer.start();
        assert_eq!(rx.recv().await, Some(TimerEvent::Timeout));

        timer.stop();
        assert_eq!(rx.recv().await, Some(TimerEvent::Stopped));
    }

    #[tokio::test]
    async fn stop_before_timeout_suppresses_timeout() {
        let (mut timer, mut rx) = RetryTimer::new(RetryConfig::fixed(Duration::from_secs(60)));
        timer.start();
        timer.stop();

        let event = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("stop did not drain");
        assert_eq!(event, Some(TimerEvent::Stopped));

        // No timeout may sneak in afterwards.
        assert!(
            timeout(Duration::from_millis(50), rx.recv()).await.is_err(),
            "unexpected event after stop drained"
        );
    }

    #[tokio::test]
    async fn rearm_after_stop_cycle() {
        let (mut timer, mut rx) = RetryTimer::new(RetryConfig::fixed(Duration::from_millis(1)));
        for _ in 0..3 {
            timer.start();
            assert_eq!(rx.recv().await, Some(TimerEvent::Timeout));
            timer.stop();
            assert_eq!(rx.recv().await, Some(TimerEvent::Stopped));
        }
    }

    #[tokio::test]
    #[should_panic(expected = "retry timer already armed")]
    async fn double_start_panics() {
        let (mut timer, _rx) = RetryTimer::new(RetryConfig::fixed(Duration::from_secs(1)));
        timer.start();
        timer.start();
    }
}
