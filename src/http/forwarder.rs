//! Origin forwarding.
//!
//! # Responsibilities
//! - Resolve and connect to the origin named in the request target
//! - Send the origin-form request and buffer the full response
//! - Enforce connect and read timeouts
//!
//! # Design Decisions
//! - One fresh connection per forwarded request, no pooling
//! - Single attempt; retries are the caller's decision and this proxy makes none
//! - The hyper connection task is aborted when the forward future is dropped,
//!   so a client that disconnects mid-relay also closes the origin connection

use std::time::Duration;

use axum::body::Body;
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::config::{CacheConfig, TimeoutConfig};
use crate::error::ProxyError;
use crate::http::request::ProxyRequest;
use crate::http::response::{strip_hop_by_hop, OriginResponse};

#[derive(Debug, Clone)]
pub struct OriginForwarder {
    connect_timeout: Duration,
    read_timeout: Duration,
    max_response_bytes: usize,
}

impl OriginForwarder {
    pub fn new(connect_timeout: Duration, read_timeout: Duration, max_response_bytes: usize) -> Self {
        Self {
            connect_timeout,
            read_timeout,
            max_response_bytes,
        }
    }

    pub fn from_config(timeouts: &TimeoutConfig, cache: &CacheConfig) -> Self {
        Self::new(
            Duration::from_secs(timeouts.connect_secs),
            Duration::from_secs(timeouts.read_secs),
            cache.max_response_bytes,
        )
    }

    /// Forward `request` to its origin and read back the whole response.
    pub async fn forward(&self, request: &ProxyRequest) -> Result<OriginResponse, ProxyError> {
        let host = request.authority();

        let stream = match timeout(
            self.connect_timeout,
            TcpStream::connect((request.connect_host(), request.port())),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(ProxyError::OriginUnreachable {
                    host,
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(ProxyError::OriginTimeout {
                    host,
                    stage: "connect",
                })
            }
        };

        tracing::debug!(origin = %host, "Connected to origin");

        match timeout(self.read_timeout, self.exchange(stream, request)).await {
            Ok(result) => result,
            Err(_) => Err(ProxyError::OriginTimeout { host, stage: "read" }),
        }
    }

    async fn exchange(
        &self,
        stream: TcpStream,
        request: &ProxyRequest,
    ) -> Result<OriginResponse, ProxyError> {
        let (mut sender, connection) = http1::handshake::<_, Body>(TokioIo::new(stream))
            .await
            .map_err(|e| ProxyError::OriginProtocolError(format!("handshake failed: {e}")))?;

        let _driver = AbortOnDrop(tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::debug!(error = %e, "Origin connection ended with error");
            }
        }));

        let outgoing = request.to_origin_request()?;
        let response = sender
            .send_request(outgoing)
            .await
            .map_err(|e| ProxyError::OriginProtocolError(e.to_string()))?;

        let (parts, body) = response.into_parts();
        let body = axum::body::to_bytes(Body::new(body), self.max_response_bytes)
            .await
            .map_err(|e| ProxyError::OriginProtocolError(format!("reading response body: {e}")))?;

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);

        Ok(OriginResponse {
            status: parts.status,
            headers,
            body,
        })
    }
}

/// Aborts the wrapped task when dropped.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Method, Request, StatusCode};
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn forwarder() -> OriginForwarder {
        OriginForwarder::new(Duration::from_secs(1), Duration::from_millis(300), 1024)
    }

    async fn request_to(addr: SocketAddr, path: &str) -> ProxyRequest {
        let request = Request::builder()
            .method(Method::GET)
            .uri(format!("http://{addr}{path}"))
            .body(Body::empty())
            .unwrap();
        ProxyRequest::parse(request, 1024)
            .await
            .unwrap()
    }

    /// Serve one connection with a canned reply after reading the request head.
    async fn one_shot_origin(reply: &'static [u8]) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = vec![0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(reply).await;
                let _ = socket.shutdown().await;
            }
        });
        addr
    }

    #[tokio::test]
    async fn reads_full_response() {
        let addr = one_shot_origin(
            b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\nContent-Type: text/plain\r\nConnection: close\r\n\r\nhello",
        )
        .await;
        let response = forwarder().forward(&request_to(addr, "/").await).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(&response.body[..], b"hello");
        assert_eq!(response.headers["content-type"], "text/plain");
        assert!(!response.headers.contains_key("connection"));
    }

    #[tokio::test]
    async fn closed_port_is_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = forwarder().forward(&request_to(addr, "/").await).await.unwrap_err();
        assert!(matches!(err, ProxyError::OriginUnreachable { .. }), "{err}");
    }

    #[tokio::test]
    async fn garbage_reply_is_protocol_error() {
        let addr = one_shot_origin(b"this is not http\r\n\r\n").await;
        let err = forwarder().forward(&request_to(addr, "/").await).await.unwrap_err();
        assert!(matches!(err, ProxyError::OriginProtocolError(_)), "{err}");
    }

    #[tokio::test]
    async fn silent_origin_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let err = forwarder().forward(&request_to(addr, "/").await).await.unwrap_err();
        assert!(
            matches!(err, ProxyError::OriginTimeout { stage: "read", .. }),
            "{err}"
        );
    }

    #[tokio::test]
    async fn oversized_response_is_protocol_error() {
        let addr = one_shot_origin(
            b"HTTP/1.1 200 OK\r\nContent-Length: 2048\r\nConnection: close\r\n\r\n",
        )
        .await;
        let err = forwarder().forward(&request_to(addr, "/").await).await.unwrap_err();
        assert!(matches!(err, ProxyError::OriginProtocolError(_)), "{err}");
    }
}
