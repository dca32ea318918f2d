//! TCP listener implementation with backpressure.
//!
//! # Responsibilities
//! - Bind to the configured proxy address
//! - Accept incoming TCP connections
//! - Enforce max_connections limit via semaphore
//! - Graceful handling of accept errors
//!
//! `Listener` implements `axum::serve::Listener`, so each accepted stream
//! carries its semaphore permit and tracking guard until hyper drops it.
//! `PeerAddr` is the connect info handlers extract from those streams.
//!
//! An optional gate pauses the listener: while it reads `false`, new
//! connections are accepted and closed at once. Open connections are
//! unaffected.

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::extract::connect_info::Connected;
use axum::serve::IncomingStream;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};

use crate::net::connection::{ConnectionGuard, ConnectionTracker};

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("Failed to bind: {0}")]
    Bind(io::Error),
    #[error("Failed to accept: {0}")]
    Accept(io::Error),
    #[error("Connection limiter closed")]
    Closed,
}

/// A bounded TCP listener that limits concurrent connections.
///
/// When the limit is reached, accepting pauses until a connection closes.
pub struct Listener {
    inner: TcpListener,
    connection_limit: Arc<Semaphore>,
    tracker: ConnectionTracker,
    gate: Option<watch::Receiver<bool>>,
}

impl Listener {
    /// Bind to `address` allowing at most `max_connections` open connections.
    pub async fn bind(
        address: &str,
        max_connections: usize,
        tracker: ConnectionTracker,
    ) -> Result<Self, ListenerError> {
        let addr: SocketAddr = address
            .parse()
            .map_err(|e| ListenerError::Bind(io::Error::new(io::ErrorKind::InvalidInput, e)))?;

        let listener = TcpListener::bind(addr).await.map_err(ListenerError::Bind)?;
        let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;

        tracing::info!(
            address = %local_addr,
            max_connections,
            "Listener bound"
        );

        Ok(Self {
            inner: listener,
            connection_limit: Arc::new(Semaphore::new(max_connections)),
            tracker,
            gate: None,
        })
    }

    /// Only serve new connections while `gate` reads `true`.
    pub fn with_gate(mut self, gate: watch::Receiver<bool>) -> Self {
        self.gate = Some(gate);
        self
    }

    fn is_open(&self) -> bool {
        self.gate.as_ref().map_or(true, |gate| *gate.borrow())
    }

    /// Accept a new connection, respecting the connection limit.
    pub async fn accept_tracked(&self) -> Result<(TrackedStream, SocketAddr), ListenerError> {
        loop {
            // Acquire permit first (backpressure)
            let permit = self
                .connection_limit
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| ListenerError::Closed)?;

            let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;
            if !self.is_open() {
                tracing::debug!(peer_addr = %addr, "Listener paused, closing connection");
                drop(stream);
                continue;
            }
            let guard = self.tracker.track();

            tracing::debug!(
                peer_addr = %addr,
                connection_id = %guard.id(),
                available_permits = self.connection_limit.available_permits(),
                "Connection accepted"
            );

            return Ok((
                TrackedStream {
                    stream,
                    _permit: permit,
                    _guard: guard,
                },
                addr,
            ));
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    pub fn available_permits(&self) -> usize {
        self.connection_limit.available_permits()
    }
}

impl axum::serve::Listener for Listener {
    type Io = TrackedStream;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        loop {
            match self.accept_tracked().await {
                Ok(accepted) => return accepted,
                Err(e) => {
                    // Typically fd exhaustion; back off instead of spinning.
                    tracing::warn!(error = %e, "Accept failed");
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
            }
        }
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        self.inner.local_addr()
    }
}

/// Client address of a connection accepted by `Listener`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerAddr(pub SocketAddr);

impl Connected<IncomingStream<'_, Listener>> for PeerAddr {
    fn connect_info(stream: IncomingStream<'_, Listener>) -> Self {
        PeerAddr(*stream.remote_addr())
    }
}

/// An accepted client stream holding its connection slot.
///
/// Dropping it releases the slot, even if the connection task panicked.
#[derive(Debug)]
pub struct TrackedStream {
    stream: TcpStream,
    _permit: OwnedSemaphorePermit,
    _guard: ConnectionGuard,
}

impl AsyncRead for TrackedStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for TrackedStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().stream).poll_write(cx, buf)
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().stream).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.stream.is_write_vectored()
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn rejects_unparseable_address() {
        let result = Listener::bind("nowhere", 1, ConnectionTracker::new()).await;
        assert!(matches!(result, Err(ListenerError::Bind(_))));
    }

    #[tokio::test]
    async fn permit_released_when_stream_dropped() {
        let tracker = ConnectionTracker::new();
        let listener = Listener::bind("127.0.0.1:0", 1, tracker.clone()).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let mut client = TcpStream::connect(addr).await.unwrap();
        let (mut stream, _) = listener.accept_tracked().await.unwrap();
        assert_eq!(listener.available_permits(), 0);
        assert_eq!(tracker.active_count(), 1);

        client.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        drop(stream);
        assert_eq!(listener.available_permits(), 1);
        assert_eq!(tracker.active_count(), 0);
    }

    #[tokio::test]
    async fn closed_gate_drops_new_connections() {
        let tracker = ConnectionTracker::new();
        let (gate, rx) = watch::channel(false);
        let listener = Listener::bind("127.0.0.1:0", 4, tracker.clone())
            .await
            .unwrap()
            .with_gate(rx);
        let addr = listener.local_addr().unwrap();

        let accept = tokio::spawn(async move {
            let accepted = listener.accept_tracked().await.map(|(_, peer)| peer);
            (accepted, listener)
        });

        // Refused while paused: the server side closes without a byte.
        let mut refused = TcpStream::connect(addr).await.unwrap();
        let mut buf = [0u8; 1];
        assert_eq!(refused.read(&mut buf).await.unwrap_or(0), 0);
        assert_eq!(tracker.active_count(), 0);

        gate.send(true).unwrap();
        let admitted = TcpStream::connect(addr).await.unwrap();
        let (accepted, _listener) = accept.await.unwrap();
        assert_eq!(accepted.unwrap(), admitted.local_addr().unwrap());
    }
}
