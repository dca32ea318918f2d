//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Parsed request (client IP + absolute target):
//!     → access_control.rs (IP lists, then URL lists)
//!     → admitted: continue to cache lookup
//!     → denied: 403, origin never contacted
//! ```
//!
//! # Design Decisions
//! - Fail closed: a denial from either dimension refuses the request
//! - Policy is live state; the control plane swaps lists in at any time

pub mod access_control;

pub use access_control::{AccessPolicy, Denial, Dimension, ListKind, PolicyError, PolicyLists};
