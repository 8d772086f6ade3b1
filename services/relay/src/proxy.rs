//! Transparent proxy: one fresh backend connection per client, with an
//! optional audit log of the relayed traffic.

use std::sync::Arc;

use tracing::info;

use crate::audit::AuditLog;
use crate::config::ProxyConfig;
use crate::error::Result;
use crate::reactor::{Reactor, ReactorConfig};
use crate::upstream::DirectUpstream;

/// Bind the proxy listener.
pub async fn bind(config: &ProxyConfig) -> Result<Reactor<DirectUpstream>> {
    let mut reactor_config = ReactorConfig::new(config.bind_addr);
    reactor_config.buffer_size = config.buffer_size;

    let upstream = DirectUpstream::new(config.backend_addr, config.connect_timeout);
    let mut reactor = Reactor::bind(reactor_config, upstream).await?;

    let audit = AuditLog::new(config.request_log.clone(), config.response_log.clone());
    if audit.is_enabled() {
        reactor = reactor.with_write_hook(Arc::new(audit));
    }

    info!(
        bind_addr = %reactor.local_addr()?,
        backend_addr = %config.backend_addr,
        request_log = ?config.request_log,
        response_log = ?config.response_log,
        "Proxy listening"
    );
    Ok(reactor)
}
