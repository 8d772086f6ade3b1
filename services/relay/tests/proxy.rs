
use std::fs;
use std::path::Path;
use std::sync::atomic::Ordering;

use harness::{exchange, is_refused, roundtrip, RelayHandle, WAIT};
use relay_testing::{eventually, ScriptedBackend, TcpEchoBackend};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

const HEADER_MARK: &str = "--------------------";

/// Audit file contents split into (timestamp, payload) blocks.
fn audit_blocks(path: &Path) -> Vec<(String, String)> {
    let contents = fs::read_to_string(path).unwrap_or_default();
    let mut blocks = Vec::new();
    let mut lines = contents.split('\n');
    while let Some(line) = lines.next() {
        if let Some(rest) = line.strip_prefix(HEADER_MARK) {
            let stamp = rest.trim_end_matches('-').to_string();
            let payload = lines.next().unwrap_or_default().to_string();
            blocks.push((stamp, payload));
        }
    }
    blocks
}

#[tokio::test]
async fn proxy_relays_and_logs_each_direction_once() {
    let dir = tempfile::tempdir().unwrap();
    let request_log = dir.path().join("request.log");
    let response_log = dir.path().join("response.log");

    let backend = ScriptedBackend::spawn(b"PONG").await.unwrap();
    let relay = RelayHandle::proxy(
        backend.addr,
        Some(request_log.clone()),
        Some(response_log.clone()),
    )
    .await
    .unwrap();

    let (_client, reply) = roundtrip(relay.addr, b"PING", 4).await.unwrap();
    assert_eq!(reply, b"PONG");

    assert!(eventually(WAIT, || audit_blocks(&response_log).len() == 1).await);
    let requests = audit_blocks(&request_log);
    let responses = audit_blocks(&response_log);

    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].1, "PING");
    assert_eq!(responses[0].1, "PONG");

    // HH:MM:SS.mmm
    let stamp = &requests[0].0;
    assert_eq!(stamp.len(), 12, "{stamp}");
    assert!(fs::read_to_string(&request_log).unwrap().starts_with('\n'));
}

#[tokio::test]
async fn proxy_appends_a_block_per_hop() {
    let dir = tempfile::tempdir().unwrap();
    let request_log = dir.path().join("request.log");

    let backend = TcpEchoBackend::spawn().await.unwrap();
    let relay = RelayHandle::proxy(backend.addr, Some(request_log.clone()), None)
        .await
        .unwrap();

    let (mut client, _) = roundtrip(relay.addr, b"first", 5).await.unwrap();
    exchange(&mut client, b"second", 6).await.unwrap();

    assert!(eventually(WAIT, || audit_blocks(&request_log).len() == 2).await);
    let payloads: Vec<_> = audit_blocks(&request_log)
        .into_iter()
        .map(|(_, payload)| payload)
        .collect();
    assert_eq!(payloads, vec!["first", "second"]);
    assert!(!dir.path().join("response.log").exists());
}

#[tokio::test]
async fn proxy_without_logs_just_relays() {
    let backend = TcpEchoBackend::spawn().await.unwrap();
    let relay = RelayHandle::proxy(backend.addr, None, None).await.unwrap();

    let (_client, reply) = roundtrip(relay.addr, b"hello", 5).await.unwrap();
    assert_eq!(reply, b"hello");
    assert_eq!(relay.stats.bytes_relayed.load(Ordering::Relaxed), 10);
}

#[tokio::test]
async fn proxy_opens_a_connection_per_client() {
    let backend = TcpEchoBackend::spawn().await.unwrap();
    let relay = RelayHandle::proxy(backend.addr, None, None).await.unwrap();

    let (first, _) = roundtrip(relay.addr, b"a", 1).await.unwrap();
    let (_second, _) = roundtrip(relay.addr, b"b", 1).await.unwrap();
    assert!(eventually(WAIT, || backend.connection_count() == 2).await);

    drop(first);
    assert!(eventually(WAIT, || backend.closed_count() == 1).await);
}

#[tokio::test]
async fn proxy_rejects_client_when_backend_is_down() {
    let dead = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let relay = RelayHandle::proxy(dead, None, None).await.unwrap();

    assert!(is_refused(relay.addr).await);
    assert_eq!(relay.stats.connections_rejected.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn proxy_relays_backend_that_speaks_first() {
    let dir = tempfile::tempdir().unwrap();
    let response_log = dir.path().join("response.log");

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let backend_addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        stream.write_all(b"220 hello\r\n").await.unwrap();
        let mut command = [0u8; 6];
        stream.read_exact(&mut command).await.unwrap();
        assert_eq!(&command, b"QUIT\r\n");
        stream.write_all(b"221 bye\r\n").await.unwrap();
    });

    let relay = RelayHandle::proxy(backend_addr, None, Some(response_log.clone()))
        .await
        .unwrap();
    let mut client = TcpStream::connect(relay.addr).await.unwrap();

    let mut banner = [0u8; 11];
    timeout(WAIT, client.read_exact(&mut banner))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&banner, b"220 hello\r\n");

    let reply = exchange(&mut client, b"QUIT\r\n", 9).await.unwrap();
    assert_eq!(reply, b"221 bye\r\n");

    // The backend hangs up after its goodbye.
    let mut buf = [0u8; 8];
    let closed = timeout(WAIT, client.read(&mut buf)).await.unwrap();
    assert!(matches!(closed, Ok(0) | Err(_)));

    assert!(eventually(WAIT, || audit_blocks(&response_log).len() == 2).await);
    let payloads: Vec<_> = audit_blocks(&response_log)
        .into_iter()
        .map(|(_, payload)| payload)
        .collect();
    assert_eq!(payloads, vec!["220 hello\r", "221 bye\r"]);
}
