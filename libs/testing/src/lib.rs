//! Test doubles for the relay workspace.
//!
//! - [`MockConnection`]: in-memory [`relay_pool::Connection`] with a synthetic
//!   response time and a switchable open failure
//! - [`TcpEchoBackend`]: loopback TCP server echoing every chunk it reads
//! - [`ScriptedBackend`]: loopback TCP server answering each chunk with a
//!   fixed reply and counting the connections it sees closed

mod backend;
mod connection;

pub use backend::{eventually, ScriptedBackend, TcpEchoBackend};
pub use connection::MockConnection;
