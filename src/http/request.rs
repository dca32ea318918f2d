//! Request parsing and preparation for forwarding.
//!
//! # Responsibilities
//! - Generate a request ID (UUID v4) for every incoming request
//! - Validate the absolute-form target required for proxying
//! - Buffer the body up to the configured limit
//! - Build the origin-form request sent to the origin
//!
//! # Design Decisions
//! - Only `http://` targets are proxied; TLS is never intercepted
//! - A parsed `ProxyRequest` is immutable; the forwarded copy is built from it

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, HeaderValue, Method, Request},
};
use tower_http::request_id::{MakeRequestId, RequestId};
use url::Url;

use crate::cache::CacheKey;
use crate::error::ProxyError;
use crate::http::response::strip_hop_by_hop;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Methods the proxy handles, advertised on OPTIONS and 405 responses.
pub const ALLOWED_METHODS: &str = "OPTIONS, GET, HEAD, POST, PUT, PATCH, DELETE";

/// Request ID generator for `SetRequestIdLayer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&uuid::Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// A fully read client request with an absolute `http` target.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ProxyRequest {
    /// Validate the target and read the body.
    pub async fn parse(
        request: Request<Body>,
        max_body_size: usize,
    ) -> Result<Self, ProxyError> {
        let (parts, body) = request.into_parts();

        if parts.uri.scheme().is_none() || parts.uri.authority().is_none() {
            return Err(ProxyError::MalformedRequest(
                "request target must be an absolute URI".into(),
            ));
        }
        if parts.uri.scheme_str() != Some("http") {
            return Err(ProxyError::MalformedRequest(format!(
                "unsupported scheme in {}",
                parts.uri
            )));
        }

        let url = Url::parse(&parts.uri.to_string())
            .map_err(|e| ProxyError::MalformedRequest(format!("invalid target: {e}")))?;
        if url.host_str().map_or(true, str::is_empty) {
            return Err(ProxyError::MalformedRequest("target has no host".into()));
        }

        let body = axum::body::to_bytes(body, max_body_size)
            .await
            .map_err(|e| ProxyError::MalformedRequest(format!("unreadable body: {e}")))?;

        Ok(Self {
            method: parts.method,
            url,
            headers: parts.headers,
            body,
        })
    }

    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    /// Host in the form a socket connect expects (IPv6 without brackets).
    pub fn connect_host(&self) -> &str {
        self.host().trim_start_matches('[').trim_end_matches(']')
    }

    pub fn port(&self) -> u16 {
        self.url.port_or_known_default().unwrap_or(80)
    }

    /// `host[:port]` as sent in the `Host` header.
    pub fn authority(&self) -> String {
        match self.url.port() {
            Some(port) => format!("{}:{}", self.host(), port),
            None => self.host().to_string(),
        }
    }

    /// Only GET responses are served from or stored into the cache.
    pub fn is_cacheable_method(&self) -> bool {
        self.method == Method::GET
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(&self.method, &self.url, &self.headers)
    }

    /// Build the origin-form request: path and query only, hop-by-hop
    /// headers removed, `Host` set, one request per connection.
    pub fn to_origin_request(&self) -> Result<Request<Body>, ProxyError> {
        let mut path = self.url.path().to_string();
        if let Some(query) = self.url.query() {
            path.push('?');
            path.push_str(query);
        }

        let mut headers = self.headers.clone();
        strip_hop_by_hop(&mut headers);
        let host = HeaderValue::from_str(&self.authority())
            .map_err(|e| ProxyError::MalformedRequest(format!("invalid host: {e}")))?;
        headers.insert(header::HOST, host);
        headers.insert(header::CONNECTION, HeaderValue::from_static("close"));

        let mut request = Request::builder()
            .method(self.method.clone())
            .uri(path)
            .body(Body::from(self.body.clone()))
            .map_err(|e| ProxyError::MalformedRequest(format!("cannot rebuild request: {e}")))?;
        *request.headers_mut() = headers;
        Ok(request)
    }
}
