//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration
//! - Build the shared state
//! - Bind the proxy and admin listeners and spawn their servers
//! - Hand back a `RunningProxy` that can be shut down
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Both listeners are bound before either server is spawned, so a bind
//!   failure never leaves a half-started proxy behind
//! - Shutdown waits for in-flight requests up to a deadline

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::admin::{setup_admin_router, AdminState};
use crate::config::validation::validate_config;
use crate::config::{ConfigError, ProxyConfig};
use crate::http::HttpServer;
use crate::lifecycle::Shutdown;
use crate::net::{Listener, ListenerError};
use crate::security::PolicyError;
use crate::state::ProxyState;

const DRAIN_DEADLINE: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid policy: {0}")]
    Policy(#[from] PolicyError),

    #[error("Proxy listener: {0}")]
    Listener(#[from] ListenerError),

    #[error("Admin listener: {0}")]
    AdminBind(io::Error),
}

/// A started proxy: both servers running in background tasks.
pub struct RunningProxy {
    pub proxy_addr: SocketAddr,
    pub admin_addr: Option<SocketAddr>,
    pub state: Arc<ProxyState>,
    shutdown: Shutdown,
    tasks: Vec<(&'static str, JoinHandle<io::Result<()>>)>,
}

impl RunningProxy {
    /// Stop accepting, let in-flight requests finish, then return.
    pub async fn shutdown(self) {
        tracing::info!("Shutting down");
        self.shutdown.trigger();

        for (name, task) in self.tasks {
            match tokio::time::timeout(DRAIN_DEADLINE, task).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => tracing::error!(server = name, error = %e, "Server exited with error"),
                Ok(Err(e)) => tracing::error!(server = name, error = %e, "Server task failed"),
                Err(_) => tracing::warn!(server = name, "Drain deadline passed, abandoning connections"),
            }
        }
        tracing::info!("Shutdown complete");
    }
}

/// Start the proxy described by `config`.
pub async fn start(config: ProxyConfig) -> Result<RunningProxy, StartupError> {
    validate_config(&config).map_err(ConfigError::Validation)?;

    let state = Arc::new(ProxyState::from_config(&config)?);
    let shutdown = Shutdown::new();

    let listener = Listener::bind(
        &config.listener.bind_address,
        config.listener.max_connections,
        state.connections.clone(),
    )
    .await?
    .with_gate(state.listening_gate());
    let proxy_addr = listener
        .local_addr()
        .map_err(|e| StartupError::Listener(ListenerError::Bind(e)))?;

    let admin_listener = if config.admin.enabled {
        let admin = TcpListener::bind(&config.admin.bind_address)
            .await
            .map_err(StartupError::AdminBind)?;
        Some(admin)
    } else {
        None
    };

    let mut tasks = Vec::new();

    let server = HttpServer::new(&config, state.clone());
    tasks.push(("proxy", tokio::spawn(server.run(listener, shutdown.subscribe()))));

    let mut admin_addr = None;
    if let Some(admin) = admin_listener {
        let addr = admin.local_addr().map_err(StartupError::AdminBind)?;
        admin_addr = Some(addr);

        let router = setup_admin_router(AdminState {
            shared: state.clone(),
            api_key: Arc::from(config.admin.api_key.as_str()),
            proxy_addr,
        });
        let mut stop = shutdown.subscribe();
        tasks.push((
            "admin",
            tokio::spawn(async move {
                tracing::info!(address = %addr, "Admin API listening");
                axum::serve(admin, router)
                    .with_graceful_shutdown(async move {
                        let _ = stop.recv().await;
                    })
                    .await
            }),
        ));
    } else {
        tracing::info!("Admin API disabled");
    }

    state.feed.push(format!("> Proxy listening on {proxy_addr} <"));

    Ok(RunningProxy {
        proxy_addr,
        admin_addr,
        state,
        shutdown,
        tasks,
    })
}
