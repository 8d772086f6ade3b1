//! Load balancer: a reactor fed from a pool of backend connections.

use std::sync::Arc;

use relay_pool::{ConnectionPool, PoolConfig};
use tracing::info;

use crate::config::BalancerConfig;
use crate::error::Result;
use crate::reactor::{Reactor, ReactorConfig};
use crate::upstream::{BackendCycle, PooledUpstream, SocketConnection};

/// Build the pool for `config`: one connection per backend, minted in
/// backend order.
pub fn build_pool(config: &BalancerConfig) -> Result<ConnectionPool<SocketConnection>> {
    let cycle = BackendCycle::new(config.upstreams.clone())?;
    let pool_config = PoolConfig::new(cycle.len(), config.strategy).with_growth(config.allow_growth);
    let connect_timeout = config.connect_timeout;

    let pool = ConnectionPool::new(pool_config, move || {
        SocketConnection::new(cycle.next_addr(), connect_timeout)
    })?;
    Ok(pool)
}

/// Bind the load balancer listener.
pub async fn bind(config: &BalancerConfig) -> Result<Reactor<PooledUpstream>> {
    let pool = Arc::new(build_pool(config)?);

    let mut reactor_config = ReactorConfig::new(config.bind_addr);
    reactor_config.buffer_size = config.buffer_size;
    let reactor = Reactor::bind(reactor_config, PooledUpstream::new(pool)).await?;

    info!(
        bind_addr = %reactor.local_addr()?,
        strategy = %config.strategy,
        upstreams = ?config.upstreams,
        allow_growth = config.allow_growth,
        "Load balancer listening"
    );
    Ok(reactor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RelayError;
    use relay_pool::SelectionStrategy;
    use std::time::Duration;

    fn config(upstreams: Vec<u16>) -> BalancerConfig {
        BalancerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            strategy: SelectionStrategy::LeastResponseTime,
            upstreams: upstreams
                .into_iter()
                .map(|p| ([127, 0, 0, 1], p).into())
                .collect(),
            buffer_size: 1024,
            connect_timeout: Duration::from_millis(200),
            allow_growth: true,
        }
    }

    #[test]
    fn test_pool_sized_to_backend_list() {
        let pool = build_pool(&config(vec![9001, 9002, 9003])).unwrap();
        let stats = pool.stats();
        assert_eq!(stats.capacity, 3);
        assert_eq!(stats.available, 3);
        assert_eq!(pool.config().strategy, SelectionStrategy::LeastResponseTime);
    }

    #[test]
    fn test_empty_backend_list_is_rejected() {
        assert!(matches!(
            build_pool(&config(Vec::new())),
            Err(RelayError::Config(_))
        ));
    }
}
