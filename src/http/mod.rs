//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Client connection
//!     → server.rs (Axum setup, per-request pipeline)
//!     → request.rs (absolute target, body, request ID)
//!     → [policy check, cache lookup]
//!     → forwarder.rs (origin connection, timeouts)
//!     → response.rs (hop-by-hop strip, cacheability)
//!     → Send to client
//! ```

pub mod forwarder;
pub mod request;
pub mod response;
pub mod server;

pub use forwarder::OriginForwarder;
pub use request::{ProxyRequest, X_REQUEST_ID};
pub use response::OriginResponse;
pub use server::HttpServer;
