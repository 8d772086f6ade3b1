//! Demo HTTP backend for load-balancing experiments.
//!
//! `GET /delay/{millis}` waits `millis` milliseconds and answers with the
//! name of the worker thread that served it. Run a few of these on
//! different ports and point the balancer at them.

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::Path;
use axum::routing::get;
use axum::Router;
use tracing::{debug, info};

pub fn router() -> Router {
    Router::new().route("/delay/{millis}", get(delay))
}

async fn delay(Path(millis): Path<u64>) -> String {
    tokio::time::sleep(Duration::from_millis(millis)).await;
    let thread = std::thread::current();
    let name = thread.name().unwrap_or("unnamed");
    debug!(millis, thread = name, "Delayed response");
    format!("{name}\n")
}

/// Serve the demo backend until the process is killed.
pub async fn serve(addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Demo backend listening");
    axum::serve(listener, router()).await
}
