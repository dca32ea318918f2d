//! Response relay and cache eligibility.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers in both directions
//! - Turn an origin response into the client response
//! - Decide whether an origin response may be stored
//! - Answer OPTIONS locally

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, HeaderName, HeaderValue, Response, StatusCode},
};

use crate::cache::CachedResponse;
use crate::http::request::ALLOWED_METHODS;

/// Headers that describe a single connection and are never relayed.
const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "proxy-connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// A complete, buffered origin response.
#[derive(Debug, Clone)]
pub struct OriginResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl OriginResponse {
    /// Successful responses without `no-store`/`private` may be cached.
    pub fn is_storable(&self) -> bool {
        if !self.status.is_success() {
            return false;
        }
        !self
            .headers
            .get_all(header::CACHE_CONTROL)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .map(|directive| directive.trim().to_ascii_lowercase())
            .any(|directive| directive == "no-store" || directive == "private")
    }

    pub fn to_cached(&self) -> CachedResponse {
        CachedResponse::new(self.status, &self.headers, self.body.clone())
    }

    pub fn into_response(self) -> Response<Body> {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Remove hop-by-hop headers, including any named in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();
    for name in named {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Local answer to OPTIONS.
pub fn options_response() -> Response<Body> {
    let mut response = Response::new(Body::empty());
    let headers = response.headers_mut();
    headers.insert(header::ALLOW, HeaderValue::from_static(ALLOWED_METHODS));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("0"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin(status: StatusCode, cache_control: Option<&'static str>) -> OriginResponse {
        let mut headers = HeaderMap::new();
        if let Some(value) = cache_control {
            headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(value));
        }
        OriginResponse {
            status,
            headers,
            body: Bytes::from_static(b"body"),
        }
    }

    #[test]
    fn only_successful_responses_are_storable() {
        assert!(origin(StatusCode::OK, None).is_storable());
        assert!(!origin(StatusCode::NOT_FOUND, None).is_storable());
        assert!(!origin(StatusCode::INTERNAL_SERVER_ERROR, None).is_storable());
        assert!(!origin(StatusCode::FOUND, None).is_storable());
    }

    #[test]
    fn no_store_and_private_are_respected() {
        assert!(!origin(StatusCode::OK, Some("no-store")).is_storable());
        assert!(!origin(StatusCode::OK, Some("max-age=60, Private")).is_storable());
        assert!(origin(StatusCode::OK, Some("public, max-age=60")).is_storable());
    }

    #[test]
    fn strips_connection_named_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("close, x-secret"));
        headers.insert("x-secret", HeaderValue::from_static("1"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        strip_hop_by_hop(&mut headers);
        assert_eq!(headers.len(), 1);
        assert!(headers.contains_key(header::CONTENT_TYPE));
    }

    #[test]
    fn relayed_response_matches_cached_rebuild() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        headers.append("set-cookie", HeaderValue::from_static("a=1"));
        headers.append("set-cookie", HeaderValue::from_static("b=2"));
        let origin = OriginResponse {
            status: StatusCode::OK,
            headers,
            body: Bytes::from_static(b"hello"),
        };
        let cached = origin.to_cached().to_response().unwrap();
        let relayed = origin.into_response();
        assert_eq!(cached.status(), relayed.status());
        assert_eq!(cached.headers(), relayed.headers());
    }

    #[test]
    fn options_advertises_methods() {
        let response = options_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::ALLOW], ALLOWED_METHODS);
    }
}
