//! Address handling for the local-domain stream transport.
//!
//! A connect endpoint is configured with a filesystem path. The path must
//! fit the platform's fixed-size `sockaddr_un` buffer; a path that does not
//! is a configuration error and is rejected before any endpoint exists.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::TransportError;

/// Maximum encodable path length for a local-domain socket address.
///
/// `sockaddr_un.sun_path` is 108 bytes on Linux; one byte is reserved for
/// the terminating NUL.
pub const MAX_ADDR_LEN: usize = 107;

/// A validated local-domain stream socket address.
///
/// Construction enforces the [`MAX_ADDR_LEN`] limit, so every `IpcAddr`
/// held by an endpoint is guaranteed to be encodable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpcAddr {
    path: PathBuf,
}

impl IpcAddr {
    /// Validates `path` against the transport addressing limits.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::AddressTooLong`] if the encoded path does
    /// not fit the platform address buffer.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, TransportError> {
        let path = path.into();
        let len = path.as_os_str().len();
        if len > MAX_ADDR_LEN {
            return Err(TransportError::AddressTooLong {
                len,
                max: MAX_ADDR_LEN,
            });
        }
        Ok(Self { path })
    }

    /// The filesystem path this address refers to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for IpcAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ipc://{}", self.path.display())
    }
}
