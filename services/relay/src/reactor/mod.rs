//! Single-loop relay reactor.
//!
//! One task multiplexes readiness over every relayed socket. Sockets are
//! keyed by a [`Token`] and have two registration slots, one for reading
//! and one for writing (a pending connect uses the write slot). Each
//! registration is a readiness wait pushed into a shared `FuturesUnordered`
//! and tagged with the token, the interest and a generation number. Teardown
//! aborts every outstanding wait, and any event whose generation no longer
//! matches its slot is counted and skipped.
//!
//! ## Hops
//!
//! A pairing has one [`Session`] per direction, and each session owns its
//! buffer. The session moves between the two sockets of the pairing:
//!
//! ```text
//!            accept
//! listener ---------> client: read slot armed      upstream: connect armed
//!
//! connect-ready  upstream read slot armed (and write slot if a hop is waiting)
//! read-ready     buffer filled, session moves to the peer's write slot
//!                end of stream or error tears the pairing down
//! write-ready    buffer drained and reset, session moves back to the
//!                reader's read slot
//! ```
//!
//! Each direction advances one buffer at a time, independently of the other.

mod session;

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{abortable, AbortHandle, BoxFuture, FutureExt};
use futures_util::stream::{FuturesUnordered, StreamExt};
use relay_id::PairingId;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, trace, warn};

use crate::upstream::{Upstream, UpstreamSource};

pub use session::{
    FlowSide, RelayBuffer, Session, WriteHook, WriteProgress, DEFAULT_BUFFER_SIZE,
};

/// Back-off after a failed accept.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Key of one registered socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(u64);

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Readiness a socket is registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    Connect,
    Read,
    Write,
}

/// Reactor configuration.
#[derive(Debug, Clone)]
pub struct ReactorConfig {
    /// Address to listen on.
    pub bind_addr: SocketAddr,
    /// Size of each direction's relay buffer.
    pub buffer_size: usize,
}

impl ReactorConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

/// Reactor counters.
#[derive(Debug, Default)]
pub struct ReactorStats {
    /// Clients accepted and paired with an upstream.
    pub connections_accepted: AtomicU64,
    /// Clients closed because no upstream was available.
    pub connections_rejected: AtomicU64,
    /// Pairings currently relaying.
    pub pairings_active: AtomicU64,
    /// Pairings torn down.
    pub pairings_closed: AtomicU64,
    /// Bytes written to either side.
    pub bytes_relayed: AtomicU64,
    /// Writes that failed and dropped their hop.
    pub write_errors: AtomicU64,
    /// Readiness events skipped because their registration was cancelled or
    /// replaced.
    pub stale_events: AtomicU64,
}

/// One outstanding readiness wait.
#[derive(Default)]
struct Registration {
    generation: u64,
    abort: Option<AbortHandle>,
}

impl Registration {
    fn is_current(&self, generation: u64) -> bool {
        self.abort.is_some() && self.generation == generation
    }

    fn cancel(&mut self) {
        if let Some(handle) = self.abort.take() {
            handle.abort();
        }
    }
}

struct SocketEntry {
    stream: Arc<TcpStream>,
    pairing: PairingId,
    /// False while an outbound connect is in flight.
    connected: bool,
    /// Session this socket reads into, present while its read is pending.
    inbound: Option<Session>,
    /// Session waiting to be written into this socket.
    outbound: Option<Session>,
    read: Registration,
    write: Registration,
}

impl SocketEntry {
    fn new(stream: TcpStream, pairing: PairingId, connected: bool, inbound: Session) -> Self {
        Self {
            stream: Arc::new(stream),
            pairing,
            connected,
            inbound: Some(inbound),
            outbound: None,
            read: Registration::default(),
            write: Registration::default(),
        }
    }

    fn slot(&self, interest: Interest) -> &Registration {
        match interest {
            Interest::Read => &self.read,
            Interest::Connect | Interest::Write => &self.write,
        }
    }

    fn slot_mut(&mut self, interest: Interest) -> &mut Registration {
        match interest {
            Interest::Read => &mut self.read,
            Interest::Connect | Interest::Write => &mut self.write,
        }
    }
}

struct Pairing<L> {
    client: Token,
    upstream: Token,
    peer_addr: SocketAddr,
    upstream_addr: SocketAddr,
    lease: Option<L>,
}

/// A completed (or cancelled) readiness wait.
struct Readiness {
    token: Token,
    generation: u64,
    interest: Interest,
    /// `None` if the wait was aborted.
    result: Option<io::Result<()>>,
}

enum Event {
    Accepted(io::Result<(TcpStream, SocketAddr)>),
    Ready(Readiness),
}

/// The relay loop.
pub struct Reactor<S: UpstreamSource> {
    config: ReactorConfig,
    listener: TcpListener,
    upstreams: S,
    write_hook: Option<Arc<dyn WriteHook>>,
    sockets: HashMap<Token, SocketEntry>,
    pairings: HashMap<PairingId, Pairing<S::Lease>>,
    pending: FuturesUnordered<BoxFuture<'static, Readiness>>,
    next_token: u64,
    next_generation: u64,
    stats: Arc<ReactorStats>,
}

impl<S: UpstreamSource> Reactor<S> {
    /// Bind the listening socket.
    pub async fn bind(config: ReactorConfig, upstreams: S) -> io::Result<Self> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        let local_addr = listener.local_addr()?;

        info!(
            bind_addr = %local_addr,
            buffer_size = config.buffer_size,
            "Reactor bound"
        );

        Ok(Self {
            config,
            listener,
            upstreams,
            write_hook: None,
            sockets: HashMap::new(),
            pairings: HashMap::new(),
            pending: FuturesUnordered::new(),
            next_token: 0,
            next_generation: 0,
            stats: Arc::new(ReactorStats::default()),
        })
    }

    /// Install a hook invoked after every completed write.
    pub fn with_write_hook(mut self, hook: Arc<dyn WriteHook>) -> Self {
        self.write_hook = Some(hook);
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn stats(&self) -> Arc<ReactorStats> {
        Arc::clone(&self.stats)
    }

    pub fn upstreams(&self) -> &S {
        &self.upstreams
    }

    /// Run the dispatch loop forever.
    pub async fn run(mut self) -> io::Result<()> {
        let local_addr = self.listener.local_addr()?;
        info!(bind_addr = %local_addr, "Reactor started");

        loop {
            self.turn().await;
        }
    }

    /// Wait for one event and dispatch it.
    async fn turn(&mut self) {
        let event = tokio::select! {
            accepted = self.listener.accept() => Event::Accepted(accepted),
            Some(ready) = self.pending.next() => Event::Ready(ready),
        };

        match event {
            Event::Accepted(Ok((stream, peer_addr))) => self.on_accept(stream, peer_addr),
            Event::Accepted(Err(e)) => {
                error!(error = %e, "Accept error");
                tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
            }
            Event::Ready(ready) => self.dispatch(ready),
        }
    }

    fn allocate_token(&mut self) -> Token {
        let token = Token(self.next_token);
        self.next_token += 1;
        token
    }

    fn on_accept(&mut self, client: TcpStream, peer_addr: SocketAddr) {
        let upstream = match self.upstreams.acquire() {
            Ok(upstream) => upstream,
            Err(e) => {
                self.stats
                    .connections_rejected
                    .fetch_add(1, Ordering::Relaxed);
                if e.is_backend_unavailable() {
                    warn!(
                        peer_addr = %peer_addr,
                        pool_exhausted = e.is_pool_exhausted(),
                        error = %e,
                        "No backend available, closing client"
                    );
                } else {
                    error!(peer_addr = %peer_addr, error = %e, "Upstream acquire failed, closing client");
                }
                return;
            }
        };

        let Upstream {
            stream,
            addr: upstream_addr,
            lease,
        } = upstream;

        let backend = match stream
            .set_nonblocking(true)
            .and_then(|()| TcpStream::from_std(stream))
        {
            Ok(backend) => backend,
            Err(e) => {
                self.upstreams.release(lease);
                self.stats
                    .connections_rejected
                    .fetch_add(1, Ordering::Relaxed);
                warn!(peer_addr = %peer_addr, error = %e, "Failed to register backend socket");
                return;
            }
        };

        self.stats
            .connections_accepted
            .fetch_add(1, Ordering::Relaxed);
        self.insert_pairing(client, backend, peer_addr, upstream_addr, lease);
    }

    /// Register a client and its upstream as a new pairing. The client is
    /// armed for read and the upstream for connect.
    fn insert_pairing(
        &mut self,
        client: TcpStream,
        upstream: TcpStream,
        peer_addr: SocketAddr,
        upstream_addr: SocketAddr,
        lease: S::Lease,
    ) -> (Token, Token) {
        let pairing = PairingId::new();
        let client_token = self.allocate_token();
        let upstream_token = self.allocate_token();

        let requests = Session::new(
            RelayBuffer::with_capacity(self.config.buffer_size),
            upstream_token,
            pairing,
            FlowSide::ClientToServer,
        );
        let responses = Session::new(
            RelayBuffer::with_capacity(self.config.buffer_size),
            client_token,
            pairing,
            FlowSide::ServerToClient,
        );

        self.sockets.insert(
            client_token,
            SocketEntry::new(client, pairing, true, requests),
        );
        self.sockets.insert(
            upstream_token,
            SocketEntry::new(upstream, pairing, false, responses),
        );
        self.pairings.insert(
            pairing,
            Pairing {
                client: client_token,
                upstream: upstream_token,
                peer_addr,
                upstream_addr,
                lease: Some(lease),
            },
        );

        self.register(client_token, Interest::Read);
        self.register(upstream_token, Interest::Connect);

        self.stats.pairings_active.fetch_add(1, Ordering::Relaxed);
        debug!(
            pairing_id = %pairing,
            peer_addr = %peer_addr,
            upstream_addr = %upstream_addr,
            "Pairing established"
        );
        (client_token, upstream_token)
    }

    /// Arm the slot of `token` that serves `interest`.
    fn register(&mut self, token: Token, interest: Interest) {
        let Some(entry) = self.sockets.get_mut(&token) else {
            return;
        };

        self.next_generation += 1;
        let generation = self.next_generation;

        let stream = Arc::clone(&entry.stream);

        let slot = entry.slot_mut(interest);
        slot.cancel();
        slot.generation = generation;

        let (wait, handle) = abortable(async move {
            match interest {
                Interest::Read => stream.readable().await,
                Interest::Connect | Interest::Write => stream.writable().await,
            }
        });
        slot.abort = Some(handle);

        self.pending.push(
            async move {
                Readiness {
                    token,
                    generation,
                    interest,
                    result: wait.await.ok(),
                }
            }
            .boxed(),
        );
    }

    fn dispatch(&mut self, ready: Readiness) {
        let current = self
            .sockets
            .get_mut(&ready.token)
            .filter(|entry| entry.slot(ready.interest).is_current(ready.generation));
        let (Some(entry), Some(result)) = (current, ready.result) else {
            self.stats.stale_events.fetch_add(1, Ordering::Relaxed);
            debug!(
                token = %ready.token,
                interest = ?ready.interest,
                generation = ready.generation,
                "Stale readiness event skipped"
            );
            return;
        };
        entry.slot_mut(ready.interest).abort = None;
        let pairing = entry.pairing;

        if let Err(e) = result {
            debug!(token = %ready.token, error = %e, "Readiness wait failed");
            self.teardown(pairing, "readiness error");
            return;
        }

        match ready.interest {
            Interest::Connect => self.on_connect(ready.token),
            Interest::Read => self.on_readable(ready.token),
            Interest::Write => self.on_writable(ready.token),
        }
    }

    fn on_connect(&mut self, token: Token) {
        let Some(entry) = self.sockets.get_mut(&token) else {
            return;
        };
        let pairing = entry.pairing;

        match entry.stream.take_error() {
            Ok(None) => {}
            Ok(Some(e)) | Err(e) => {
                debug!(pairing_id = %pairing, error = %e, "Upstream connect failed");
                self.teardown(pairing, "connect error");
                return;
            }
        }

        entry.connected = true;
        let hop_waiting = entry.outbound.is_some();
        trace!(pairing_id = %pairing, hop_waiting, "Upstream connected");

        self.register(token, Interest::Read);
        if hop_waiting {
            self.register(token, Interest::Write);
        }
    }

    fn on_readable(&mut self, token: Token) {
        let Some(entry) = self.sockets.get_mut(&token) else {
            return;
        };
        let pairing = entry.pairing;

        let Some(mut session) = entry.inbound.take() else {
            warn!(pairing_id = %pairing, token = %token, "Read readiness without a session");
            return;
        };

        match session.buffer.read_from(&entry.stream) {
            Ok(0) => {
                self.teardown(pairing, "end of stream");
            }
            Ok(n) => {
                trace!(pairing_id = %pairing, token = %token, bytes = n, flow = %session.flow, "Hop read");
                let writer = session.peer;
                self.hand_to_writer(writer, session.hand_off(token));
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                entry.inbound = Some(session);
                self.register(token, Interest::Read);
            }
            Err(e) => {
                debug!(pairing_id = %pairing, error = %e, "Read failed");
                self.teardown(pairing, "read error");
            }
        }
    }

    /// Queue a filled session on the socket that must write it.
    fn hand_to_writer(&mut self, writer: Token, session: Session) {
        let pairing = session.pairing;
        let Some(entry) = self.sockets.get_mut(&writer) else {
            self.teardown(pairing, "peer gone");
            return;
        };

        if entry.outbound.replace(session).is_some() {
            error!(pairing_id = %pairing, token = %writer, "Socket already has a hop queued, dropping pairing");
            self.teardown(pairing, "session conflict");
            return;
        }

        // A pending connect holds the write slot; the hop is picked up once
        // it completes.
        if entry.connected {
            self.register(writer, Interest::Write);
        }
    }

    fn on_writable(&mut self, token: Token) {
        let Some(entry) = self.sockets.get_mut(&token) else {
            return;
        };
        let pairing = entry.pairing;

        let Some(mut session) = entry.outbound.take() else {
            warn!(pairing_id = %pairing, token = %token, "Write readiness without a session");
            return;
        };

        match session.buffer.write_to(&entry.stream) {
            Ok(WriteProgress::Pending) => {
                entry.outbound = Some(session);
                self.register(token, Interest::Write);
                return;
            }
            Ok(WriteProgress::Complete) => {
                let written = session.buffer.written();
                self.stats
                    .bytes_relayed
                    .fetch_add(written.len() as u64, Ordering::Relaxed);
                if let Some(hook) = &self.write_hook {
                    hook.on_write(session.flow, written);
                }
            }
            Err(e) => {
                self.stats.write_errors.fetch_add(1, Ordering::Relaxed);
                debug!(
                    pairing_id = %pairing,
                    error = %e,
                    dropped = session.buffer.filled().len() - session.buffer.written().len(),
                    "Write failed, dropping hop"
                );
            }
        }

        session.buffer.reset();
        let reader = session.peer;
        self.hand_to_reader(reader, session.hand_off(token));
    }

    /// Give a drained session back to the socket that fills it.
    fn hand_to_reader(&mut self, reader: Token, session: Session) {
        let pairing = session.pairing;
        let Some(entry) = self.sockets.get_mut(&reader) else {
            self.teardown(pairing, "peer gone");
            return;
        };

        if entry.inbound.replace(session).is_some() {
            error!(pairing_id = %pairing, token = %reader, "Socket already reading, dropping pairing");
            self.teardown(pairing, "session conflict");
            return;
        }
        self.register(reader, Interest::Read);
    }

    /// Close both sockets of a pairing, cancel their registrations and give
    /// the upstream lease back.
    fn teardown(&mut self, pairing_id: PairingId, reason: &'static str) {
        let Some(mut pairing) = self.pairings.remove(&pairing_id) else {
            return;
        };

        for token in [pairing.client, pairing.upstream] {
            if let Some(mut entry) = self.sockets.remove(&token) {
                entry.read.cancel();
                entry.write.cancel();
            }
        }

        if let Some(lease) = pairing.lease.take() {
            self.upstreams.release(lease);
        }

        self.stats.pairings_active.fetch_sub(1, Ordering::Relaxed);
        self.stats.pairings_closed.fetch_add(1, Ordering::Relaxed);
        debug!(
            pairing_id = %pairing_id,
            peer_addr = %pairing.peer_addr,
            upstream_addr = %pairing.upstream_addr,
            reason,
            "Pairing closed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::DirectUpstream;
    use crate::upstream::DEFAULT_CONNECT_TIMEOUT;
    use relay_testing::{eventually, ScriptedBackend};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    const WAIT: Duration = Duration::from_secs(2);

    async fn spawn_reactor(backend: SocketAddr) -> (SocketAddr, Arc<ReactorStats>) {
        let config = ReactorConfig::new("127.0.0.1:0".parse().unwrap());
        let reactor = Reactor::bind(config, DirectUpstream::new(backend, DEFAULT_CONNECT_TIMEOUT))
            .await
            .unwrap();
        let addr = reactor.local_addr().unwrap();
        let stats = reactor.stats();
        tokio::spawn(reactor.run());
        (addr, stats)
    }

    async fn socket_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (connected, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        (connected.unwrap(), accepted.unwrap().0)
    }

    #[test]
    fn test_reactor_config_default() {
        let config = ReactorConfig::new("127.0.0.1:0".parse().unwrap());
        assert_eq!(config.buffer_size, DEFAULT_BUFFER_SIZE);
    }

    #[tokio::test]
    async fn test_relay_ping_pong() {
        let backend = ScriptedBackend::spawn(b"PONG").await.unwrap();
        let (addr, stats) = spawn_reactor(backend.addr).await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"PING").await.unwrap();

        let mut reply = [0u8; 4];
        tokio::time::timeout(WAIT, client.read_exact(&mut reply))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&reply, b"PONG");
        assert_eq!(backend.received(), b"PING");
        assert_eq!(stats.pairings_active.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_client_disconnect_cancels_registrations() {
        let backend = ScriptedBackend::spawn(b"ok").await.unwrap();
        let (addr, stats) = spawn_reactor(backend.addr).await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"hello").await.unwrap();
        let mut reply = [0u8; 2];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(stats.stale_events.load(Ordering::Relaxed), 0);
        drop(client);

        assert!(eventually(WAIT, || stats.pairings_closed.load(Ordering::Relaxed) == 1).await);
        assert!(eventually(WAIT, || backend.closed_count() == 1).await);
        assert_eq!(stats.pairings_active.load(Ordering::Relaxed), 0);

        // The upstream's pending read was cancelled by the teardown and comes
        // back as a skipped event, never as a dispatch.
        assert!(eventually(WAIT, || stats.stale_events.load(Ordering::Relaxed) == 1).await);
        assert_eq!(stats.pairings_closed.load(Ordering::Relaxed), 1);
        assert_eq!(stats.bytes_relayed.load(Ordering::Relaxed), 7);
    }

    #[tokio::test]
    async fn test_unreachable_backend_rejects_client() {
        let dead = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let (addr, stats) = spawn_reactor(dead).await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        let mut buf = [0u8; 8];
        let n = tokio::time::timeout(WAIT, client.read(&mut buf))
            .await
            .unwrap()
            .unwrap_or(0);
        assert_eq!(n, 0);
        assert_eq!(stats.connections_rejected.load(Ordering::Relaxed), 1);
        assert_eq!(stats.connections_accepted.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_write_error_is_swallowed_and_reader_rearmed() {
        let config = ReactorConfig::new("127.0.0.1:0".parse().unwrap());
        let unused: SocketAddr = "127.0.0.1:9".parse().unwrap();
        let mut reactor = Reactor::bind(config, DirectUpstream::new(unused, DEFAULT_CONNECT_TIMEOUT))
            .await
            .unwrap();

        let (mut relay_client, mut remote_client) = socket_pair().await;
        let (relay_upstream, mut remote_backend) = socket_pair().await;
        // Writes towards the client now fail with a broken pipe, reads still
        // work.
        relay_client.shutdown().await.unwrap();

        let peer_addr = remote_client.local_addr().unwrap();
        let (client, upstream) =
            reactor.insert_pairing(relay_client, relay_upstream, peer_addr, unused, ());
        reactor.on_connect(upstream);
        assert!(reactor.sockets[&upstream].read.abort.is_some());

        remote_backend.write_all(b"PONG").await.unwrap();
        let upstream_stream = Arc::clone(&reactor.sockets[&upstream].stream);
        upstream_stream.readable().await.unwrap();
        reactor.on_readable(upstream);
        assert!(reactor.sockets[&client].outbound.is_some());

        let client_stream = Arc::clone(&reactor.sockets[&client].stream);
        client_stream.writable().await.unwrap();
        reactor.on_writable(client);

        let stats = reactor.stats();
        assert_eq!(stats.write_errors.load(Ordering::Relaxed), 1);
        assert_eq!(stats.bytes_relayed.load(Ordering::Relaxed), 0);
        assert_eq!(stats.pairings_closed.load(Ordering::Relaxed), 0);

        let upstream_entry = &reactor.sockets[&upstream];
        let session = upstream_entry.inbound.as_ref().unwrap();
        assert!(session.buffer.filled().is_empty());
        assert_eq!(session.peer, client);
        assert!(upstream_entry.read.abort.is_some());
        assert!(reactor.sockets[&client].outbound.is_none());

        // The other direction keeps relaying.
        remote_client.write_all(b"PING").await.unwrap();
        client_stream.readable().await.unwrap();
        reactor.on_readable(client);
        upstream_stream.writable().await.unwrap();
        reactor.on_writable(upstream);

        let mut received = [0u8; 4];
        tokio::time::timeout(WAIT, remote_backend.read_exact(&mut received))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&received, b"PING");
        assert_eq!(stats.bytes_relayed.load(Ordering::Relaxed), 4);
    }

    #[tokio::test]
    async fn test_hop_read_before_connect_waits_for_it() {
        let config = ReactorConfig::new("127.0.0.1:0".parse().unwrap());
        let unused: SocketAddr = "127.0.0.1:9".parse().unwrap();
        let mut reactor = Reactor::bind(config, DirectUpstream::new(unused, DEFAULT_CONNECT_TIMEOUT))
            .await
            .unwrap();

        let (relay_client, mut remote_client) = socket_pair().await;
        let (relay_upstream, _remote_backend) = socket_pair().await;
        let peer_addr = remote_client.local_addr().unwrap();
        let (client, upstream) =
            reactor.insert_pairing(relay_client, relay_upstream, peer_addr, unused, ());

        remote_client.write_all(b"early").await.unwrap();
        let client_stream = Arc::clone(&reactor.sockets[&client].stream);
        client_stream.readable().await.unwrap();
        reactor.on_readable(client);

        // Only the connect wait is armed on the upstream write slot.
        let generation = reactor.sockets[&upstream].write.generation;
        assert!(reactor.sockets[&upstream].outbound.is_some());
        assert!(reactor.sockets[&upstream].read.abort.is_none());

        reactor.on_connect(upstream);
        let entry = &reactor.sockets[&upstream];
        assert!(entry.read.abort.is_some());
        assert!(entry.write.abort.is_some());
        assert_ne!(entry.write.generation, generation);
    }
}
