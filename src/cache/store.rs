//! In-memory response store with TTL expiry.

use std::time::{Duration, Instant};

use axum::{
    body::{Body, Bytes},
    http::{HeaderMap, HeaderName, HeaderValue, Response, StatusCode},
};
use dashmap::DashMap;

use crate::cache::key::CacheKey;
use crate::error::ProxyError;
use crate::observability::metrics;

/// A stored origin response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, Vec<u8>)>,
    pub body: Bytes,
}

impl CachedResponse {
    pub fn new(status: StatusCode, headers: &HeaderMap, body: Bytes) -> Self {
        Self {
            status: status.as_u16(),
            headers: headers
                .iter()
                .map(|(name, value)| (name.as_str().to_string(), value.as_bytes().to_vec()))
                .collect(),
            body,
        }
    }

    /// Rebuild a client response from the stored parts.
    pub fn to_response(&self) -> Result<Response<Body>, ProxyError> {
        let status = StatusCode::from_u16(self.status)
            .map_err(|_| ProxyError::CacheCorruption(format!("invalid status {}", self.status)))?;

        let mut response = Response::new(Body::from(self.body.clone()));
        *response.status_mut() = status;
        let headers = response.headers_mut();
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ProxyError::CacheCorruption(format!("invalid header name {name:?}")))?;
            let value = HeaderValue::from_bytes(value)
                .map_err(|_| ProxyError::CacheCorruption(format!("invalid value for header {name}")))?;
            headers.append(name, value);
        }
        Ok(response)
    }
}

/// One cache slot.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub response: CachedResponse,
    pub expires_at: Instant,
}

impl CacheEntry {
    /// An entry is valid strictly before its expiry instant.
    pub fn is_valid_at(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Thread-safe response cache.
///
/// Each key holds at most one entry; `put` overwrites. Shard-level locking
/// means a reader never sees a half-written entry.
#[derive(Debug, Default)]
pub struct CacheStore {
    entries: DashMap<CacheKey, CacheEntry>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a valid entry. An expired entry is removed and reported absent.
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let now = Instant::now();
        {
            let entry = self.entries.get(key)?;
            if entry.is_valid_at(now) {
                return Some(entry.clone());
            }
        }
        // A concurrent put may have refreshed the slot since the read above.
        if self
            .entries
            .remove_if(key, |_, entry| !entry.is_valid_at(now))
            .is_some()
        {
            tracing::debug!(key = %key, "Expired cache entry removed on lookup");
            metrics::record_cache_entries(self.entries.len());
        }
        None
    }

    /// Store or overwrite the entry for `key`, valid for `ttl` from now.
    pub fn put(&self, key: CacheKey, response: CachedResponse, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.entries.insert(
            key.clone(),
            CacheEntry {
                key,
                response,
                expires_at,
            },
        );
        metrics::record_cache_entries(self.entries.len());
    }

    /// Drop one entry, e.g. after it failed to rebuild.
    pub fn remove(&self, key: &CacheKey) {
        if self.entries.remove(key).is_some() {
            metrics::record_cache_entries(self.entries.len());
        }
    }

    /// Remove every entry whose expiry has passed. Returns how many were dropped.
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_valid_at(now));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            metrics::record_cache_entries(self.entries.len());
        }
        removed
    }

    /// Remove everything.
    pub fn clear(&self) {
        self.entries.clear();
        metrics::record_cache_entries(0);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
