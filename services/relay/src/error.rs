//! Relay errors.

use std::io;
use std::net::SocketAddr;

use relay_pool::PoolError;
use thiserror::Error;

/// Errors surfaced by upstream acquisition and relay setup.
///
/// Failures inside an established pairing never reach this type: a read
/// error ends the pairing and a write error is swallowed.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The pool had no connection to hand out, or the one it picked failed
    /// to open.
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// A direct backend connection could not be established.
    #[error("failed to open backend connection to {addr}: {source}")]
    ConnectionOpenFailed {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// A pooled connection reported open but had no socket to hand over.
    #[error("connection {0} is open but has no socket")]
    MissingSocket(relay_id::ConnectionId),

    #[error("socket I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl RelayError {
    /// Returns true if the client should be told no backend is available.
    pub fn is_backend_unavailable(&self) -> bool {
        matches!(
            self,
            RelayError::Pool(_) | RelayError::ConnectionOpenFailed { .. } | RelayError::MissingSocket(_)
        )
    }

    /// Returns true if a pool had no connection left to hand out.
    pub fn is_pool_exhausted(&self) -> bool {
        matches!(self, RelayError::Pool(e) if e.is_exhausted())
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
