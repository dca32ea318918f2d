//! Response cache subsystem.
//!
//! # Data Flow
//! ```text
//! Admitted GET request
//!     → key.rs (method + normalized URL + selected headers)
//!     → store.rs get (lazy expiry)
//!     → hit: rebuild response, no forwarding
//!     → miss: forward, then store.rs put with the live TTL
//! ```
//!
//! # Design Decisions
//! - In-memory, sharded map; no persistence
//! - Correctness relies on lazy expiry in `get`; the sweep only frees memory
//! - Concurrent identical misses are not collapsed; each fetches from origin

pub mod key;
pub mod store;

pub use key::CacheKey;
pub use store::{CacheEntry, CacheStore, CachedResponse};
