//! relay
//!
//! Command-line entry point for the load balancer, the proxy and the demo
//! backend.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use relay_pool::SelectionStrategy;
use relay_server::config::{
    BalancerConfig, BalancerOverrides, Properties, ProxyConfig, ProxyOverrides,
    DEFAULT_PROPERTIES_FILE,
};
use relay_server::{balancer, demo_backend, proxy};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Single-loop TCP relay.
#[derive(Debug, Parser)]
#[command(name = "relay")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins if set.
    #[arg(long, global = true, env = "RELAY_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Balance clients over a pool of backend connections.
    Balancer(BalancerArgs),

    /// Relay clients to one backend, optionally logging the traffic.
    Proxy(ProxyArgs),

    /// Run the demo HTTP backend.
    DemoBackend {
        /// Port to listen on.
        port: u16,
    },
}

#[derive(Debug, Args)]
struct BalancerArgs {
    /// ROUND_ROBIN or LEAST_RESPONSE_TIME.
    strategy: Option<SelectionStrategy>,

    /// Port to listen on.
    port: Option<u16>,

    /// Backend ports.
    upstream_ports: Vec<u16>,

    /// Properties file consulted for anything not given on the command line.
    #[arg(long, default_value = DEFAULT_PROPERTIES_FILE)]
    config: PathBuf,
}

#[derive(Debug, Args)]
struct ProxyArgs {
    /// Port to listen on.
    #[arg(long)]
    port: Option<u16>,

    /// Backend port.
    #[arg(long)]
    backend_port: Option<u16>,

    /// Append client to server traffic to this file.
    #[arg(long)]
    request_log: Option<PathBuf>,

    /// Append server to client traffic to this file.
    #[arg(long)]
    response_log: Option<PathBuf>,

    /// Properties file consulted for anything not given on the command line.
    #[arg(long, default_value = DEFAULT_PROPERTIES_FILE)]
    config: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing (prefer RUST_LOG, fallback to --log-level)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| cli.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    match cli.command {
        Commands::Balancer(args) => current_thread()?.block_on(run_balancer(args)),
        Commands::Proxy(args) => current_thread()?.block_on(run_proxy(args)),
        Commands::DemoBackend { port } => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to start runtime")?;
            let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
            runtime
                .block_on(demo_backend::serve(addr))
                .with_context(|| format!("Demo backend on {addr} failed"))
        }
    }
}

/// The relay loop is a single task, so it gets a single-threaded runtime.
fn current_thread() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")
}

async fn run_balancer(args: BalancerArgs) -> Result<()> {
    let props = Properties::load(&args.config)?;
    let config = BalancerConfig::resolve(
        BalancerOverrides {
            strategy: args.strategy,
            port: args.port,
            upstream_ports: args.upstream_ports,
        },
        &props,
    )?;

    info!(
        bind_addr = %config.bind_addr,
        strategy = %config.strategy,
        upstream_count = config.upstreams.len(),
        "Starting load balancer"
    );

    let reactor = balancer::bind(&config)
        .await
        .context("Failed to start load balancer")?;
    reactor.run().await.context("Load balancer stopped")
}

async fn run_proxy(args: ProxyArgs) -> Result<()> {
    let props = Properties::load(&args.config)?;
    let config = ProxyConfig::resolve(
        ProxyOverrides {
            port: args.port,
            backend_port: args.backend_port,
            request_log: args.request_log,
            response_log: args.response_log,
        },
        &props,
    )?;

    info!(
        bind_addr = %config.bind_addr,
        backend_addr = %config.backend_addr,
        "Starting proxy"
    );

    let reactor = proxy::bind(&config)
        .await
        .context("Failed to start proxy")?;
    reactor.run().await.context("Proxy stopped")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_balancer_positionals() {
        let cli = Cli::try_parse_from([
            "relay",
            "balancer",
            "least_response_time",
            "8080",
            "9001",
            "9002",
        ])
        .unwrap();

        let Commands::Balancer(args) = cli.command else {
            panic!("expected balancer");
        };
        assert_eq!(args.strategy, Some(SelectionStrategy::LeastResponseTime));
        assert_eq!(args.port, Some(8080));
        assert_eq!(args.upstream_ports, vec![9001, 9002]);
        assert_eq!(args.config, PathBuf::from(DEFAULT_PROPERTIES_FILE));
    }

    #[test]
    fn test_parse_balancer_without_positionals() {
        let cli = Cli::try_parse_from(["relay", "balancer", "--config", "lb.properties"]).unwrap();
        let Commands::Balancer(args) = cli.command else {
            panic!("expected balancer");
        };
        assert!(args.strategy.is_none());
        assert!(args.upstream_ports.is_empty());
        assert_eq!(args.config, PathBuf::from("lb.properties"));
    }

    #[test]
    fn test_parse_rejects_unknown_strategy() {
        assert!(Cli::try_parse_from(["relay", "balancer", "RANDOM", "8080", "9001"]).is_err());
    }

    #[test]
    fn test_parse_proxy_flags() {
        let cli = Cli::try_parse_from([
            "relay",
            "proxy",
            "--port",
            "8080",
            "--backend-port",
            "9000",
            "--request-log",
            "req.log",
        ])
        .unwrap();
        let Commands::Proxy(args) = cli.command else {
            panic!("expected proxy");
        };
        assert_eq!(args.port, Some(8080));
        assert_eq!(args.backend_port, Some(9000));
        assert_eq!(args.request_log, Some(PathBuf::from("req.log")));
        assert!(args.response_log.is_none());
    }
}
