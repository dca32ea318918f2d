//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use forward_proxy::{ProxyConfig, RunningProxy};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

/// Fixed so cached and relayed responses carry the same `Date`.
const DATE: &str = "Mon, 19 Oct 2026 00:00:00 GMT";

pub const ADMIN_KEY: &str = "integration-key";

/// A raw TCP origin server. Every response body ends with `#<hit number>`
/// so a repeated body proves the second response did not come from here.
pub struct MockOrigin {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    last_request: Arc<Mutex<String>>,
}

impl MockOrigin {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// Request line and headers of the most recent request.
    pub fn last_request(&self) -> String {
        self.last_request.lock().unwrap().clone()
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Origin answering `200 OK` with `body`.
pub async fn start_origin(body: &'static str) -> MockOrigin {
    start_programmable_origin("200 OK", "", body, Duration::ZERO).await
}

/// Origin with full control over status line, extra header lines
/// (each ending in `\r\n`) and a delay before replying.
pub async fn start_programmable_origin(
    status: &'static str,
    extra_headers: &'static str,
    body: &'static str,
    delay: Duration,
) -> MockOrigin {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let last_request = Arc::new(Mutex::new(String::new()));

    let (hits_task, last_task) = (hits.clone(), last_request.clone());
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let hit = hits_task.fetch_add(1, Ordering::SeqCst) + 1;
            let last = last_task.clone();
            tokio::spawn(async move {
                let head = read_request(&mut socket).await;
                *last.lock().unwrap() = head;
                tokio::time::sleep(delay).await;

                let body = format!("{body}#{hit}");
                let response = format!(
                    "HTTP/1.1 {status}\r\nDate: {DATE}\r\nContent-Type: text/plain\r\n{extra_headers}Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len(),
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    MockOrigin {
        addr,
        hits,
        last_request,
    }
}

/// Origin that accepts connections and never answers.
pub async fn start_silent_origin() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut open = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            open.push(socket);
        }
    });
    addr
}

/// Origin that reads one request, never answers, and reports once the
/// proxy side closes the connection.
pub async fn start_stalling_origin() -> (SocketAddr, oneshot::Receiver<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (closed_tx, closed_rx) = oneshot::channel();
    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            read_request(&mut socket).await;
            let mut buf = [0u8; 1024];
            while let Ok(n) = socket.read(&mut buf).await {
                if n == 0 {
                    break;
                }
            }
            let _ = closed_tx.send(());
        }
    });
    (addr, closed_rx)
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Read the request head plus any `Content-Length` body.
async fn read_request(socket: &mut TcpStream) -> String {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = match socket.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        data.extend_from_slice(&buf[..n]);
        if let Some(end) = find_head_end(&data) {
            let head = String::from_utf8_lossy(&data[..end]).to_string();
            let body_len = content_length(&head);
            while data.len() < end + 4 + body_len {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => data.extend_from_slice(&buf[..n]),
                }
            }
            return head;
        }
    }
    String::from_utf8_lossy(&data).to_string()
}

fn find_head_end(data: &[u8]) -> Option<usize> {
    data.windows(4).position(|w| w == b"\r\n\r\n")
}

fn content_length(head: &str) -> usize {
    head.lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}

/// Proxy config on ephemeral ports with short timeouts.
pub fn test_config() -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.admin.bind_address = "127.0.0.1:0".into();
    config.admin.api_key = ADMIN_KEY.into();
    config.timeouts.connect_secs = 2;
    config.timeouts.read_secs = 1;
    config
}

pub async fn start_proxy(configure: impl FnOnce(&mut ProxyConfig)) -> RunningProxy {
    let mut config = test_config();
    configure(&mut config);
    forward_proxy::start(config).await.unwrap()
}

/// A client that sends every plain-HTTP request through the proxy.
pub fn proxied_client(proxy: &RunningProxy) -> reqwest::Client {
    reqwest::Client::builder()
        .proxy(reqwest::Proxy::http(format!("http://{}", proxy.proxy_addr)).unwrap())
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

/// A client for the admin API, carrying the bearer token.
pub fn admin_client() -> reqwest::Client {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::AUTHORIZATION,
        format!("Bearer {ADMIN_KEY}").parse().unwrap(),
    );
    reqwest::Client::builder()
        .no_proxy()
        .default_headers(headers)
        .build()
        .unwrap()
}

pub fn admin_url(proxy: &RunningProxy, path: &str) -> String {
    format!("http://{}{}", proxy.admin_addr.unwrap(), path)
}

/// Send raw bytes to the proxy and return whatever it answers.
pub async fn raw_exchange(proxy: &RunningProxy, request: &str) -> String {
    let mut stream = TcpStream::connect(proxy.proxy_addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        match tokio::time::timeout(Duration::from_secs(5), stream.read(&mut buf)).await {
            Ok(Ok(0)) | Ok(Err(_)) | Err(_) => break,
            Ok(Ok(n)) => {
                response.extend_from_slice(&buf[..n]);
                if find_head_end(&response).is_some() {
                    break;
                }
            }
        }
    }
    String::from_utf8_lossy(&response).to_string()
}
