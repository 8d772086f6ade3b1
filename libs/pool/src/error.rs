//! Pool errors.

use relay_id::ConnectionId;
use thiserror::Error;

/// Errors returned by [`crate::ConnectionPool`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// A pool must be able to hold at least one connection.
    #[error("connection pool capacity must be at least 1")]
    ZeroCapacity,

    /// No connection is available and the strategy does not allow a refill.
    #[error("connection pool exhausted (capacity {capacity})")]
    Exhausted { capacity: usize },

    /// The selected connection failed to open.
    ///
    /// The connection stays in the pool; callers must re-acquire rather than
    /// retry on the same handle.
    #[error("connection {id} failed to open")]
    ConnectionUnavailable { id: ConnectionId },

    /// The pool has been torn down with `close_all`.
    #[error("connection pool is closed")]
    Closed,
}

impl PoolError {
    /// Returns true if the pool had nothing left to hand out.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, PoolError::Exhausted { .. })
    }
}
