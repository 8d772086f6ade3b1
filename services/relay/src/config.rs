//! Relay configuration.
//!
//! Values come from the command line first and fall back to a properties
//! file (`key=value`, top-level keys) overlaid with `RELAY_*` environment
//! variables, e.g. `RELAY_SERVER_PORT=8080`.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use ::config::{Environment, File, FileFormat};
use relay_pool::SelectionStrategy;
use serde::Deserialize;

use crate::reactor::DEFAULT_BUFFER_SIZE;
use crate::upstream::DEFAULT_CONNECT_TIMEOUT;

/// Default properties file name.
pub const DEFAULT_PROPERTIES_FILE: &str = "config.properties";

/// Environment prefix for property overrides.
pub const ENV_PREFIX: &str = "RELAY";

const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Raw properties as read from file and environment. Everything is a string
/// until a mode asks for it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Properties {
    pub balancing_strategy: Option<String>,
    pub server_port: Option<String>,
    pub upstream_ports: Option<String>,
    pub proxy_port: Option<String>,
    pub request_log: Option<String>,
    pub response_log: Option<String>,
    pub bind_host: Option<String>,
    pub backend_host: Option<String>,
    pub buffer_size: Option<String>,
    pub connect_timeout_ms: Option<String>,
    pub allow_growth: Option<String>,
}

impl Properties {
    /// Load `path` (missing file is fine) and apply `RELAY_*` overrides.
    pub fn load(path: &Path) -> Result<Self> {
        ::config::Config::builder()
            .add_source(File::from(path).format(FileFormat::Ini).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()
            .with_context(|| format!("Failed to read properties from {}", path.display()))?
            .try_deserialize()
            .with_context(|| format!("Invalid properties in {}", path.display()))
    }

    fn get<T>(value: &Option<String>, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| {
                v.parse::<T>()
                    .map_err(|e| anyhow!("{key} has invalid value {v:?}: {e}"))
            })
            .transpose()
    }

    fn bind_host(&self) -> Result<IpAddr> {
        Ok(Self::get(&self.bind_host, "bind_host")?.unwrap_or(DEFAULT_HOST))
    }

    fn backend_host(&self) -> Result<IpAddr> {
        Ok(Self::get(&self.backend_host, "backend_host")?.unwrap_or(DEFAULT_HOST))
    }

    fn buffer_size(&self) -> Result<usize> {
        let size = Self::get(&self.buffer_size, "buffer_size")?.unwrap_or(DEFAULT_BUFFER_SIZE);
        if size == 0 {
            return Err(anyhow!("buffer_size must be at least 1"));
        }
        Ok(size)
    }

    fn connect_timeout(&self) -> Result<Duration> {
        Ok(Self::get(&self.connect_timeout_ms, "connect_timeout_ms")?
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT))
    }
}

/// Parse a comma separated port list. Blank entries are skipped.
pub fn parse_port_list(raw: &str) -> Result<Vec<u16>> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            p.parse::<u16>()
                .with_context(|| format!("Invalid upstream port {p:?}"))
        })
        .collect()
}

fn required<T>(value: Option<T>, key: &str) -> Result<T> {
    value.with_context(|| {
        format!("{key} is not set. Pass it on the command line or set it in the properties file.")
    })
}

/// Command-line values for the load balancer. Unset fields fall back to
/// properties.
#[derive(Debug, Clone, Default)]
pub struct BalancerOverrides {
    pub strategy: Option<SelectionStrategy>,
    pub port: Option<u16>,
    pub upstream_ports: Vec<u16>,
}

/// Load balancer configuration.
#[derive(Debug, Clone)]
pub struct BalancerConfig {
    pub bind_addr: SocketAddr,
    pub strategy: SelectionStrategy,
    pub upstreams: Vec<SocketAddr>,
    pub buffer_size: usize,
    pub connect_timeout: Duration,
    /// Let round-robin refill an empty pool instead of failing.
    pub allow_growth: bool,
}

impl BalancerConfig {
    pub fn resolve(overrides: BalancerOverrides, props: &Properties) -> Result<Self> {
        let strategy = match overrides.strategy {
            Some(strategy) => strategy,
            None => required(
                Properties::get(&props.balancing_strategy, "balancing_strategy")?,
                "balancing_strategy",
            )?,
        };

        let port = match overrides.port {
            Some(port) => port,
            None => required(Properties::get(&props.server_port, "server_port")?, "server_port")?,
        };

        let upstream_ports = if overrides.upstream_ports.is_empty() {
            parse_port_list(required(props.upstream_ports.as_deref(), "upstream_ports")?)?
        } else {
            overrides.upstream_ports
        };
        if upstream_ports.is_empty() {
            return Err(anyhow!("upstream_ports must name at least one port"));
        }

        let backend_host = props.backend_host()?;
        Ok(Self {
            bind_addr: SocketAddr::new(props.bind_host()?, port),
            strategy,
            upstreams: upstream_ports
                .into_iter()
                .map(|p| SocketAddr::new(backend_host, p))
                .collect(),
            buffer_size: props.buffer_size()?,
            connect_timeout: props.connect_timeout()?,
            allow_growth: Properties::get(&props.allow_growth, "allow_growth")?.unwrap_or(true),
        })
    }
}

/// Command-line values for the proxy.
#[derive(Debug, Clone, Default)]
pub struct ProxyOverrides {
    pub port: Option<u16>,
    pub backend_port: Option<u16>,
    pub request_log: Option<PathBuf>,
    pub response_log: Option<PathBuf>,
}

/// Proxy configuration.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub bind_addr: SocketAddr,
    pub backend_addr: SocketAddr,
    /// Client to server bytes are appended here.
    pub request_log: Option<PathBuf>,
    /// Server to client bytes are appended here.
    pub response_log: Option<PathBuf>,
    pub buffer_size: usize,
    pub connect_timeout: Duration,
}

impl ProxyConfig {
    pub fn resolve(overrides: ProxyOverrides, props: &Properties) -> Result<Self> {
        let port = match overrides.port {
            Some(port) => port,
            None => required(Properties::get(&props.server_port, "server_port")?, "server_port")?,
        };
        let backend_port = match overrides.backend_port {
            Some(port) => port,
            None => required(Properties::get(&props.proxy_port, "proxy_port")?, "proxy_port")?,
        };

        let log_path = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        };

        Ok(Self {
            bind_addr: SocketAddr::new(props.bind_host()?, port),
            backend_addr: SocketAddr::new(props.backend_host()?, backend_port),
            request_log: overrides
                .request_log
                .or_else(|| log_path(&props.request_log)),
            response_log: overrides
                .response_log
                .or_else(|| log_path(&props.response_log)),
            buffer_size: props.buffer_size()?,
            connect_timeout: props.connect_timeout()?,
        })
    }
}
