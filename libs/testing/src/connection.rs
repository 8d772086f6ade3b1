use std::time::Duration;

use relay_id::ConnectionId;
use relay_pool::Connection;

/// In-memory connection with a fixed, caller-chosen response time.
#[derive(Debug)]
pub struct MockConnection {
    id: ConnectionId,
    open: bool,
    fail_open: bool,
    response_time: Duration,
    opens: u32,
    closes: u32,
}

impl MockConnection {
    pub fn new() -> Self {
        Self::with_response_time(Duration::ZERO)
    }

    pub fn with_response_time(response_time: Duration) -> Self {
        Self {
            id: ConnectionId::new(),
            open: false,
            fail_open: false,
            response_time,
            opens: 0,
            closes: 0,
        }
    }

    /// A connection whose `open` always fails.
    pub fn failing() -> Self {
        let mut connection = Self::new();
        connection.fail_open = true;
        connection
    }

    pub fn set_response_time(&mut self, response_time: Duration) {
        self.response_time = response_time;
    }

    pub fn set_fail_open(&mut self, fail_open: bool) {
        self.fail_open = fail_open;
    }

    /// Number of closed-to-open transitions.
    pub fn open_count(&self) -> u32 {
        self.opens
    }

    /// Number of open-to-closed transitions.
    pub fn close_count(&self) -> u32 {
        self.closes
    }
}

impl Default for MockConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl Connection for MockConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn open(&mut self) -> bool {
        if !self.open && !self.fail_open {
            self.open = true;
            self.opens += 1;
        }
        self.open
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            self.closes += 1;
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn response_time(&self) -> Duration {
        self.response_time
    }
}
