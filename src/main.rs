//! Forward HTTP proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!   Client ──▶ net::Listener ──▶ http::server ──▶ policy check ──▶ cache
//!                                                                   │ miss
//!   Client ◀──────────────── relay (and store if cacheable) ◀── forwarder ◀──▶ Origin
//!
//!   Control plane: admin API · config watcher · SIGHUP reload
//!   Observability: tracing · metrics · request log feed
//! ```

use std::path::PathBuf;

use clap::Parser;

use forward_proxy::config::watcher::{reload, ConfigWatcher};
use forward_proxy::config::{load_config, ProxyConfig};
use forward_proxy::lifecycle::{self, signals, Signal};
use forward_proxy::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "forward-proxy", version, about = "Forward HTTP proxy with access control and caching")]
struct Args {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };

    logging::init(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "forward-proxy starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        connect_timeout_secs = config.timeouts.connect_secs,
        read_timeout_secs = config.timeouts.read_secs,
        cache_ttl_secs = config.cache.ttl_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<std::net::SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let running = lifecycle::start(config).await?;

    // Kept alive for the life of the process.
    let _watcher = match &args.config {
        Some(path) => match ConfigWatcher::new(path, running.state.clone()).run() {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                tracing::warn!(error = %e, "Config hot reload unavailable");
                None
            }
        },
        None => None,
    };

    loop {
        match signals::next_signal().await? {
            Signal::Shutdown => break,
            Signal::Reload => match &args.config {
                Some(path) => {
                    reload(path, &running.state);
                }
                None => tracing::info!("No config file to reload"),
            },
        }
    }

    running.shutdown().await;
    Ok(())
}
