//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Request pipeline produces:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges, histograms)
//!     → feed.rs (one line per completed or denied request)
//!
//! Consumers:
//!     → stdout (tracing subscriber)
//!     → Metrics endpoint (Prometheus scrape)
//!     → Control plane log poller (admin /admin/logs)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every tracing event of a request
//! - Metrics are cheap (atomic increments)
//! - The request feed is bounded; old lines fall off the front

pub mod feed;
pub mod logging;
pub mod metrics;

pub use feed::{LogFeed, LogLine};
