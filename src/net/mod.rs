//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (ID, open-connection count)
//!     → Hand off to HTTP layer (one tokio task per connection)
//! ```
//!
//! # Design Decisions
//! - Bounded accept prevents resource exhaustion
//! - Each connection tracked until its stream is dropped
//! - Plain TCP only; TLS is not terminated or intercepted

pub mod connection;
pub mod listener;

pub use connection::{ConnectionId, ConnectionTracker};
pub use listener::{Listener, ListenerError, PeerAddr};
