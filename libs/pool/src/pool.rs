//! Connection pool.
//!
//! Every connection the factory mints lives in exactly one of two sets until
//! the pool is torn down:
//! - `available`: ordered queue, head is the next round-robin pick
//! - `in_use`: connections currently held by a caller
//!
//! Both sets sit behind one lock. `open` and `close` on individual
//! connections run with that lock held, so no two callers can ever observe
//! the same connection as available.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::connection::{Connection, Pooled};
use crate::error::PoolError;
use crate::strategy::SelectionStrategy;

/// Pool sizing and selection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Connections minted at construction and on each refill.
    pub max_connections: usize,
    /// How `acquire` picks among available connections.
    pub strategy: SelectionStrategy,
    /// Whether round-robin may refill an empty pool, letting the total
    /// number of minted connections grow past `max_connections`.
    pub allow_growth: bool,
}

impl PoolConfig {
    /// Create a config with elastic round-robin refill enabled.
    pub fn new(max_connections: usize, strategy: SelectionStrategy) -> Self {
        Self {
            max_connections,
            strategy,
            allow_growth: true,
        }
    }

    /// Set whether round-robin may refill beyond capacity.
    pub fn with_growth(mut self, allow_growth: bool) -> Self {
        self.allow_growth = allow_growth;
        self
    }
}

/// Point-in-time view of the pool partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub capacity: usize,
    pub available: usize,
    pub in_use: usize,
    /// Connections minted by the factory so far, refills included.
    pub minted: usize,
}

type Factory<C> = Box<dyn FnMut() -> C + Send>;

struct PoolState<C> {
    factory: Factory<C>,
    available: VecDeque<Pooled<C>>,
    in_use: Vec<Pooled<C>>,
    minted: usize,
    closed: bool,
}

impl<C: Connection> PoolState<C> {
    fn fill(&mut self, count: usize) {
        for _ in 0..count {
            let connection = Pooled::new((self.factory)());
            debug!(connection_id = %connection.id(), "Minted pool connection");
            self.available.push_back(connection);
            self.minted += 1;
        }
    }

    /// Index of the available connection with the smallest response time.
    /// Ties go to the connection nearest the head of the queue.
    fn least_response_time_index(&self) -> Option<usize> {
        let mut best: Option<(usize, std::time::Duration)> = None;
        for (idx, connection) in self.available.iter().enumerate() {
            let response_time = connection.lock().response_time();
            match best {
                Some((_, fastest)) if fastest <= response_time => {}
                _ => best = Some((idx, response_time)),
            }
        }
        best.map(|(idx, _)| idx)
    }

    fn is_in_use(&self, connection: &Pooled<C>) -> Option<usize> {
        self.in_use.iter().position(|c| c.id() == connection.id())
    }

    fn is_available(&self, connection: &Pooled<C>) -> bool {
        self.available.iter().any(|c| c.id() == connection.id())
    }
}

/// A bounded pool of connections of one type.
pub struct ConnectionPool<C> {
    config: PoolConfig,
    state: Mutex<PoolState<C>>,
}

impl<C: Connection> ConnectionPool<C> {
    /// Create a pool and eagerly fill it to capacity.
    pub fn new<F>(config: PoolConfig, factory: F) -> Result<Self, PoolError>
    where
        F: FnMut() -> C + Send + 'static,
    {
        if config.max_connections == 0 {
            return Err(PoolError::ZeroCapacity);
        }

        let mut state = PoolState {
            factory: Box::new(factory),
            available: VecDeque::with_capacity(config.max_connections),
            in_use: Vec::with_capacity(config.max_connections),
            minted: 0,
            closed: false,
        };
        state.fill(config.max_connections);

        debug!(
            capacity = config.max_connections,
            strategy = %config.strategy,
            allow_growth = config.allow_growth,
            "Connection pool filled"
        );

        Ok(Self {
            config,
            state: Mutex::new(state),
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Claim an available connection and open it.
    ///
    /// On success the connection moves from available to in-use. If the
    /// selected connection fails to open it goes back to the tail of the
    /// available queue and `ConnectionUnavailable` is returned.
    pub fn acquire(&self) -> Result<Pooled<C>, PoolError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(PoolError::Closed);
        }

        let exhausted = PoolError::Exhausted {
            capacity: self.config.max_connections,
        };

        let candidate = match self.config.strategy {
            SelectionStrategy::RoundRobin => {
                if state.available.is_empty() {
                    if !self.config.allow_growth {
                        return Err(exhausted);
                    }
                    debug!(
                        capacity = self.config.max_connections,
                        minted = state.minted,
                        "Pool empty, refilling"
                    );
                    state.fill(self.config.max_connections);
                }
                state.available.pop_front()
            }
            SelectionStrategy::LeastResponseTime => state
                .least_response_time_index()
                .and_then(|idx| state.available.remove(idx)),
        };

        let Some(connection) = candidate else {
            return Err(exhausted);
        };

        let opened = connection.lock().open();
        if !opened {
            warn!(connection_id = %connection.id(), "Pooled connection failed to open");
            let id = connection.id();
            state.available.push_back(connection);
            return Err(PoolError::ConnectionUnavailable { id });
        }

        state.in_use.push(connection.clone());
        debug!(
            connection_id = %connection.id(),
            strategy = %self.config.strategy,
            available = state.available.len(),
            in_use = state.in_use.len(),
            "Connection acquired"
        );

        Ok(connection)
    }

    /// Return a connection to the pool.
    ///
    /// The connection is closed and appended to the available tail. Releasing
    /// a connection that is not in use closes it but leaves the bookkeeping
    /// untouched, so a double release never duplicates it.
    pub fn release(&self, connection: &Pooled<C>) {
        let mut state = self.state.lock();

        let Some(idx) = state.is_in_use(connection) else {
            connection.lock().close();
            debug!(
                connection_id = %connection.id(),
                already_available = state.is_available(connection),
                "Release of connection not in use ignored"
            );
            return;
        };

        let connection = state.in_use.swap_remove(idx);
        connection.lock().close();
        debug!(connection_id = %connection.id(), "Connection released");
        state.available.push_back(connection);
    }

    /// Close every connection in both sets and mark the pool terminated.
    ///
    /// The sets keep their members; later `acquire` calls fail with
    /// [`PoolError::Closed`].
    pub fn close_all(&self) {
        let mut state = self.state.lock();
        for connection in state.available.iter().chain(state.in_use.iter()) {
            connection.lock().close();
        }
        state.closed = true;
        debug!(
            available = state.available.len(),
            in_use = state.in_use.len(),
            "Connection pool closed"
        );
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        PoolStats {
            capacity: self.config.max_connections,
            available: state.available.len(),
            in_use: state.in_use.len(),
            minted: state.minted,
        }
    }
}
