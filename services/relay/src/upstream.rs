//! Upstream (backend) connections and the policies that hand them out.
//!
//! The reactor asks an [`UpstreamSource`] for a connected backend socket on
//! every accept and gives the lease back when the pairing ends:
//! - [`PooledUpstream`]: load balancer, sockets come from a
//!   [`ConnectionPool`] of [`SocketConnection`]s
//! - [`DirectUpstream`]: proxy, one fresh connect per client

use std::io;
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use relay_id::ConnectionId;
use relay_pool::{Connection, ConnectionPool, Pooled};
use tracing::{debug, warn};

use crate::error::{RelayError, Result};

/// Default connect timeout for backend connections.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Pool connection backed by a TCP socket to one backend address.
///
/// `open` connects synchronously. The connected socket is handed to the
/// reactor with [`SocketConnection::take_stream`]; the connection keeps
/// tracking open/closed state and the open/close latency on its own.
#[derive(Debug)]
pub struct SocketConnection {
    id: ConnectionId,
    addr: SocketAddr,
    connect_timeout: Duration,
    stream: Option<TcpStream>,
    open: bool,
    opened_at: Option<Instant>,
    response_time: Duration,
}

impl SocketConnection {
    pub fn new(addr: SocketAddr, connect_timeout: Duration) -> Self {
        Self {
            id: ConnectionId::new(),
            addr,
            connect_timeout,
            stream: None,
            open: false,
            opened_at: None,
            response_time: Duration::ZERO,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Hand the connected socket over to the caller. Returns `None` if the
    /// connection is closed or the socket was already taken.
    pub fn take_stream(&mut self) -> Option<TcpStream> {
        self.stream.take()
    }
}

impl Connection for SocketConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn open(&mut self) -> bool {
        if self.open {
            return true;
        }

        self.opened_at = Some(Instant::now());
        match TcpStream::connect_timeout(&self.addr, self.connect_timeout) {
            Ok(stream) => {
                debug!(connection_id = %self.id, backend_addr = %self.addr, "Backend connected");
                self.stream = Some(stream);
                self.open = true;
            }
            Err(e) => {
                warn!(
                    connection_id = %self.id,
                    backend_addr = %self.addr,
                    error = %e,
                    "Backend connection failed"
                );
                self.open = false;
            }
        }
        self.open
    }

    fn close(&mut self) {
        if let Some(opened_at) = self.opened_at.take() {
            self.response_time = opened_at.elapsed();
        }
        self.stream = None;
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn response_time(&self) -> Duration {
        self.response_time
    }
}

/// Round-robin cursor over a fixed backend address list.
///
/// Advanced once per factory invocation, so backend choice happens when the
/// pool fills, not when a connection is acquired.
#[derive(Debug)]
pub struct BackendCycle {
    addrs: Vec<SocketAddr>,
    next: AtomicUsize,
}

impl BackendCycle {
    pub fn new(addrs: Vec<SocketAddr>) -> Result<Self> {
        if addrs.is_empty() {
            return Err(RelayError::Config(
                "at least one upstream address is required".to_string(),
            ));
        }
        Ok(Self {
            addrs,
            next: AtomicUsize::new(0),
        })
    }

    pub fn next_addr(&self) -> SocketAddr {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.addrs.len();
        self.addrs[index]
    }

    pub fn len(&self) -> usize {
        self.addrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }
}

/// A connected backend socket plus whatever must be handed back on teardown.
#[derive(Debug)]
pub struct Upstream<L> {
    pub stream: TcpStream,
    pub addr: SocketAddr,
    pub lease: L,
}

/// Where the reactor gets backend sockets from.
///
/// Both calls happen on the dispatch loop. `acquire` may block on a connect.
pub trait UpstreamSource {
    /// Returned to [`UpstreamSource::release`] when the pairing ends.
    type Lease;

    fn acquire(&self) -> Result<Upstream<Self::Lease>>;

    fn release(&self, lease: Self::Lease);
}

/// Upstream source backed by a connection pool.
pub struct PooledUpstream {
    pool: Arc<ConnectionPool<SocketConnection>>,
}

impl PooledUpstream {
    pub fn new(pool: Arc<ConnectionPool<SocketConnection>>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> Arc<ConnectionPool<SocketConnection>> {
        Arc::clone(&self.pool)
    }
}

impl UpstreamSource for PooledUpstream {
    type Lease = Pooled<SocketConnection>;

    fn acquire(&self) -> Result<Upstream<Self::Lease>> {
        let connection = self.pool.acquire()?;
        let (stream, addr) = {
            let mut guard = connection.lock();
            (guard.take_stream(), guard.addr())
        };

        match stream {
            Some(stream) => Ok(Upstream {
                stream,
                addr,
                lease: connection,
            }),
            None => {
                let id = connection.id();
                self.pool.release(&connection);
                Err(RelayError::MissingSocket(id))
            }
        }
    }

    fn release(&self, lease: Self::Lease) {
        self.pool.release(&lease);
    }
}

/// Upstream source that opens a new connection to one fixed backend for
/// every client. Nothing is reused.
#[derive(Debug, Clone)]
pub struct DirectUpstream {
    addr: SocketAddr,
    connect_timeout: Duration,
}

impl DirectUpstream {
    pub fn new(addr: SocketAddr, connect_timeout: Duration) -> Self {
        Self {
            addr,
            connect_timeout,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl UpstreamSource for DirectUpstream {
    type Lease = ();

    fn acquire(&self) -> Result<Upstream<()>> {
        let stream = TcpStream::connect_timeout(&self.addr, self.connect_timeout).map_err(
            |source: io::Error| RelayError::ConnectionOpenFailed {
                addr: self.addr,
                source,
            },
        )?;
        debug!(backend_addr = %self.addr, "Backend connected");
        Ok(Upstream {
            stream,
            addr: self.addr,
            lease: (),
        })
    }

    fn release(&self, _lease: ()) {}
}
