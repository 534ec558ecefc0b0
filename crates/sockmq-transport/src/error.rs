//! Error types for the transport endpoint layer.
//!
//! This module provides structured error types for endpoint-level failures,
//! enabling callers to distinguish between different failure modes.
//!
//! # Error Classification
//!
//! - **Configuration errors**: rejected at construction time
//!   ([`TransportError::AddressTooLong`]); an endpoint is never created with
//!   an address it cannot encode.
//! - **Socket errors**: I/O failures reported by the async socket
//!   collaborator inside its completion events. These never cross the
//!   endpoint boundary: the owning state machine converts them into a
//!   teardown-and-retry or teardown-and-report transition.
//! - **Session errors**: data-phase failures reported by a session handler.
//!
//! Invalid `(state, event)` combinations are *not* represented here: they
//! are programming invariant violations and abort through a dedicated panic
//! path in the state-machine modules.

use std::io;

use thiserror::Error;

/// Errors produced at the transport endpoint boundary.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The configured address does not fit the platform address buffer.
    ///
    /// This is a configuration error, detected before any socket is created.
    #[error("address too long: {len} bytes exceeds {max} byte limit")]
    AddressTooLong {
        /// Encoded length of the supplied address.
        len: usize,
        /// Maximum encodable length for the transport.
        max: usize,
    },

    /// An I/O failure reported by the socket layer.
    #[error("socket i/o failure: {0}")]
    Io(#[from] io::Error),

    /// The session handler failed during the data phase.
    #[error("session failed: {reason}")]
    Session {
        /// Description of the data-phase failure.
        reason: String,
    },
}

impl TransportError {
    /// Convenience constructor for session-phase failures.
    pub fn session(reason: impl Into<String>) -> Self {
        Self::Session {
            reason: reason.into(),
        }
    }
}
