//! Endpoint capability surface.
//!
//! Owners hold endpoints of different kinds (dialing, accepted) behind the
//! same small interface: request a stop, await the exactly-once stopped
//! notification. The set of endpoint kinds is closed, so a trait over the
//! concrete handles replaces any deeper abstraction.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::BoxFuture;

/// Membership token identifying an endpoint within an owner's collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointId(u64);

impl EndpointId {
    /// Allocates a process-unique endpoint id.
    #[must_use]
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ep-{}", self.0)
    }
}

/// Common control surface exposed by every endpoint handle.
pub trait Endpoint: Send {
    /// This endpoint's membership token.
    fn id(&self) -> EndpointId;

    /// Requests asynchronous teardown. Idempotent per endpoint lifetime.
    fn stop(&self);

    /// Completes once teardown has fully drained.
    ///
    /// The underlying notification is delivered exactly once; later calls
    /// complete immediately.
    fn stopped(&mut self) -> BoxFuture<'_, ()>;
}
