//! sockmq-transport - Connection-lifecycle engine for local-socket
//! messaging endpoints.
//!
//! This crate turns raw non-blocking socket primitives into durable
//! logical endpoints. A [`connect::ConnectEndpoint`] dials a configured
//! address, retries with backoff on failure, and hands the established
//! socket to a [`session::SessionHandler`]; an
//! [`accept::AcceptEndpoint`] drives a single passively-accepted
//! connection from listener hand-off through active session to
//! termination. Both tear down cleanly and exactly once regardless of the
//! state they are in when asked to stop.
//!
//! The lifecycle logic is split into pure transition tables
//! ([`connect::machine`], [`accept::machine`]) and driver tasks that
//! execute transition actions against three asynchronous collaborators:
//! the socket ([`socket::SocketDriver`]), the backoff timer
//! ([`retry::RetryTimer`]), and the session ([`session::SessionDriver`]).
//! Each collaborator delivers exactly one terminal completion event per
//! started operation on its own channel, so event-source identity is
//! structural rather than compared by reference.
//!
//! # Modules
//!
//! - [`addr`]: validated local-domain socket addresses
//! - [`config`]: endpoint and retry configuration
//! - [`error`]: the [`TransportError`] taxonomy
//! - [`endpoint`]: the [`Endpoint`] capability trait and membership tokens
//! - [`retry`]: the backoff timer collaborator
//! - [`socket`]: the async socket collaborator
//! - [`session`]: the session handler boundary
//! - [`connect`]: the actively-dialing endpoint state machine
//! - [`accept`]: the passively-accepted endpoint state machine
//!
//! The wire framing protocol, the listener accept-loop itself, and message
//! queueing above the individual connection are out of scope; they live
//! with the session handler and the endpoint owner.

pub mod accept;
pub mod addr;
pub mod config;
pub mod connect;
pub mod endpoint;
pub mod error;
pub mod retry;
pub mod session;
pub mod socket;

pub use accept::{AcceptEndpoint, AcceptHandle, AcceptNotice, AcceptNoticeKind, AcceptState};
pub use addr::{IpcAddr, MAX_ADDR_LEN};
pub use config::{ConnectConfig, RetryConfig, RetryStrategy};
pub use connect::{ConnectEndpoint, ConnectHandle, ConnectState};
pub use endpoint::{Endpoint, EndpointId};
pub use error::TransportError;
pub use session::{SessionEvent, SessionHandler};
