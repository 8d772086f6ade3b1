//! # relay-pool
//!
//! A bounded pool of reusable backend connections.
//!
//! The pool owns every connection its factory mints and keeps them split
//! between an *available* queue and an *in-use* set. Callers claim a
//! connection with [`ConnectionPool::acquire`] and hand it back with
//! [`ConnectionPool::release`]; which available connection is claimed is
//! decided by the pool's [`SelectionStrategy`]:
//!
//! - [`SelectionStrategy::RoundRobin`] claims the oldest released connection
//!   (FIFO), refilling the pool from the factory when it runs dry.
//! - [`SelectionStrategy::LeastResponseTime`] claims the connection whose last
//!   open/close cycle was fastest, and never refills.
//!
//! ## Usage
//!
//! ```ignore
//! use relay_pool::{ConnectionPool, PoolConfig, SelectionStrategy};
//!
//! let pool = ConnectionPool::new(
//!     PoolConfig::new(3, SelectionStrategy::RoundRobin),
//!     move || SocketConnection::new(cycle.next_addr(), timeout),
//! )?;
//! let conn = pool.acquire()?;
//! // ... use the connection ...
//! pool.release(&conn);
//! ```

mod connection;
mod error;
mod pool;
mod strategy;

pub use connection::{Connection, Pooled};
pub use error::PoolError;
pub use pool::{ConnectionPool, PoolConfig, PoolStats};
pub use strategy::{SelectionStrategy, UnknownStrategy};
