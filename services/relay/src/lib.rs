//! # relay-server
//!
//! A TCP relay that pairs every accepted client with one backend socket and
//! pumps bytes between them on a single readiness-driven loop.
//!
//! Two shapes share the [`reactor`]:
//! - [`balancer`]: backends come from a [`relay_pool::ConnectionPool`]
//!   filled round-robin over a list of addresses, and the pool's
//!   [`relay_pool::SelectionStrategy`] decides which one a client gets
//! - [`proxy`]: every client gets a fresh connection to one fixed backend,
//!   with an optional [`audit`] log of the traffic
//!
//! The [`demo_backend`] module is a small HTTP server for trying the
//! balancer out by hand.

pub mod audit;
pub mod balancer;
pub mod config;
pub mod demo_backend;
pub mod error;
pub mod proxy;
pub mod reactor;
pub mod upstream;

pub use error::{RelayError, Result};
pub use reactor::{Reactor, ReactorConfig, ReactorStats};
