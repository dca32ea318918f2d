//! Cache key derivation.

use std::fmt;

use axum::http::{HeaderMap, Method};
use url::Url;

/// Request headers whose values take part in the cache key.
pub const KEY_HEADERS: [&str; 3] = ["accept", "accept-encoding", "accept-language"];

/// Identity of a request for caching purposes.
///
/// Two requests with equal keys are served the same stored response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    method: Method,
    url: String,
    headers: Vec<(&'static str, String)>,
}

impl CacheKey {
    /// Derive the key from a request's method, absolute target, and headers.
    ///
    /// The URL keeps its query and drops its fragment. Host lowercasing and
    /// default-port elision come from `Url` parsing.
    pub fn new(method: &Method, url: &Url, headers: &HeaderMap) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);

        let headers = KEY_HEADERS
            .iter()
            .map(|name| {
                let value = headers
                    .get_all(*name)
                    .iter()
                    .map(|v| String::from_utf8_lossy(v.as_bytes()).trim().to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                (*name, value)
            })
            .collect();

        Self {
            method: method.clone(),
            url: url.into(),
            headers,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}
