//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for SIGINT/SIGTERM (shutdown) and SIGHUP (config reload)
//! - Translate them into `Signal` values for the main loop
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGHUP triggers config reload, not shutdown
//! - On non-Unix targets only Ctrl-C is observed

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Shutdown,
    Reload,
}

/// Wait for the next signal the proxy reacts to.
#[cfg(unix)]
pub async fn next_signal() -> std::io::Result<Signal> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut hangup = signal(SignalKind::hangup())?;

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res?;
            tracing::info!("SIGINT received");
            Ok(Signal::Shutdown)
        }
        _ = terminate.recv() => {
            tracing::info!("SIGTERM received");
            Ok(Signal::Shutdown)
        }
        _ = hangup.recv() => {
            tracing::info!("SIGHUP received");
            Ok(Signal::Reload)
        }
    }
}

#[cfg(not(unix))]
pub async fn next_signal() -> std::io::Result<Signal> {
    tokio::signal::ctrl_c().await?;
    tracing::info!("Ctrl-C received");
    Ok(Signal::Shutdown)
}
