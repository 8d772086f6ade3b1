//! The connection capability and the pool's shared handle to it.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use relay_id::ConnectionId;

/// One usable channel to a backend.
///
/// Implementations must make `close` idempotent and keep `response_time`
/// meaningful after close: it reports the last completed open/close cycle.
pub trait Connection: Send {
    /// Stable identity, fixed when the connection is minted.
    fn id(&self) -> ConnectionId;

    /// Establishes the underlying channel. Returns whether the connection is
    /// open afterwards; calling it on an open connection is a no-op.
    fn open(&mut self) -> bool;

    /// Tears down the channel and finalizes the latency measurement.
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Latency of the most recent open/close cycle.
    fn response_time(&self) -> Duration;
}

/// Shared handle to a connection owned by a pool.
///
/// The pool keeps one clone in its available or in-use set; callers hold
/// another while the connection is acquired. Identity comparisons use the
/// connection ID captured at mint time, so they never take the lock.
pub struct Pooled<C> {
    id: ConnectionId,
    inner: Arc<Mutex<C>>,
}

impl<C: Connection> Pooled<C> {
    pub(crate) fn new(connection: C) -> Self {
        Self {
            id: connection.id(),
            inner: Arc::new(Mutex::new(connection)),
        }
    }
}

impl<C> Pooled<C> {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Locks the connection for direct access.
    ///
    /// The pool takes this lock while holding its own partition lock, so do
    /// not call back into the pool while holding the guard.
    pub fn lock(&self) -> MutexGuard<'_, C> {
        self.inner.lock()
    }
}

impl<C> Clone for Pooled<C> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C> std::fmt::Debug for Pooled<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pooled").field("id", &self.id).finish()
    }
}
