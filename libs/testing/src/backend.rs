use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

/// Counters shared between a backend handle and its accept loop.
#[derive(Debug, Default)]
struct BackendCounters {
    connections: AtomicU64,
    closed: AtomicU64,
    bytes_received: AtomicU64,
}

/// Spawn an accept loop on a fresh loopback port, handing every accepted
/// stream to `serve`.
async fn spawn_backend<F, Fut>(
    counters: Arc<BackendCounters>,
    serve: F,
) -> io::Result<(SocketAddr, oneshot::Sender<()>)>
where
    F: Fn(TcpStream, Arc<BackendCounters>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, _)) => {
                            counters.connections.fetch_add(1, Ordering::Relaxed);
                            tokio::spawn(serve(stream, Arc::clone(&counters)));
                        }
                        Err(_) => break,
                    }
                }
                _ = &mut shutdown_rx => break,
            }
        }
    });

    Ok((addr, shutdown_tx))
}

/// Echoes every chunk back to the sender until the peer closes.
#[derive(Debug)]
pub struct TcpEchoBackend {
    pub addr: SocketAddr,
    counters: Arc<BackendCounters>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl TcpEchoBackend {
    pub async fn spawn() -> io::Result<Self> {
        let counters = Arc::new(BackendCounters::default());
        let (addr, shutdown_tx) =
            spawn_backend(Arc::clone(&counters), |mut stream, counters| async move {
                let mut buf = vec![0u8; 8192];
                loop {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            counters.bytes_received.fetch_add(n as u64, Ordering::Relaxed);
                            if stream.write_all(&buf[..n]).await.is_err() {
                                break;
                            }
                        }
                    }
                }
                counters.closed.fetch_add(1, Ordering::Relaxed);
            })
            .await?;

        Ok(Self {
            addr,
            counters,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn connection_count(&self) -> u64 {
        self.counters.connections.load(Ordering::Relaxed)
    }

    pub fn closed_count(&self) -> u64 {
        self.counters.closed.load(Ordering::Relaxed)
    }

    pub fn bytes_received(&self) -> u64 {
        self.counters.bytes_received.load(Ordering::Relaxed)
    }
}

impl Drop for TcpEchoBackend {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Answers every chunk it reads with a fixed reply and records what it read.
#[derive(Debug)]
pub struct ScriptedBackend {
    pub addr: SocketAddr,
    counters: Arc<BackendCounters>,
    received: Arc<Mutex<Vec<u8>>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl ScriptedBackend {
    pub async fn spawn(reply: &'static [u8]) -> io::Result<Self> {
        let counters = Arc::new(BackendCounters::default());
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);

        let (addr, shutdown_tx) = spawn_backend(Arc::clone(&counters), move |mut stream, counters| {
            let sink = Arc::clone(&sink);
            async move {
                let mut buf = vec![0u8; 8192];
                loop {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            counters.bytes_received.fetch_add(n as u64, Ordering::Relaxed);
                            if let Ok(mut received) = sink.lock() {
                                received.extend_from_slice(&buf[..n]);
                            }
                            if stream.write_all(reply).await.is_err() {
                                break;
                            }
                        }
                    }
                }
                counters.closed.fetch_add(1, Ordering::Relaxed);
            }
        })
        .await?;

        Ok(Self {
            addr,
            counters,
            received,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn connection_count(&self) -> u64 {
        self.counters.connections.load(Ordering::Relaxed)
    }

    /// Connections on which this backend has observed end-of-stream.
    pub fn closed_count(&self) -> u64 {
        self.counters.closed.load(Ordering::Relaxed)
    }

    /// Every byte received so far, across all connections.
    pub fn received(&self) -> Vec<u8> {
        self.received
            .lock()
            .map(|received| received.clone())
            .unwrap_or_default()
    }
}

impl Drop for ScriptedBackend {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Poll `condition` every 10ms until it holds or `deadline` elapses.
pub async fn eventually<F>(deadline: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let poll = async {
        loop {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    tokio::time::timeout(deadline, poll).await.is_ok()
}
