//! Connection selection strategies.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// How the pool picks among its available connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SelectionStrategy {
    /// Oldest released connection first; refills when empty.
    #[default]
    RoundRobin,
    /// Connection with the smallest last response time; never refills.
    LeastResponseTime,
}

impl SelectionStrategy {
    /// Canonical configuration name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionStrategy::RoundRobin => "ROUND_ROBIN",
            SelectionStrategy::LeastResponseTime => "LEAST_RESPONSE_TIME",
        }
    }
}

impl fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A strategy name that matched neither known strategy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown balancing strategy '{0}' (expected ROUND_ROBIN or LEAST_RESPONSE_TIME)")]
pub struct UnknownStrategy(pub String);

impl FromStr for SelectionStrategy {
    type Err = UnknownStrategy;

    /// Parses `ROUND_ROBIN` / `LEAST_RESPONSE_TIME`, ignoring case and
    /// accepting `-` in place of `_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        match normalized.as_str() {
            "ROUND_ROBIN" => Ok(SelectionStrategy::RoundRobin),
            "LEAST_RESPONSE_TIME" => Ok(SelectionStrategy::LeastResponseTime),
            _ => Err(UnknownStrategy(s.to_string())),
        }
    }
}
