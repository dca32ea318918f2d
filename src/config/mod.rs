//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated)
//!     → startup builds ProxyState from it
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → ProxyState::apply_config swaps in policy lists and cache settings
//! ```
//!
//! # Design Decisions
//! - Listen addresses, timeouts, and limits are fixed at startup
//! - Policy lists and cache settings are live; reloads and the admin API
//!   both write them through ProxyState
//! - All fields have defaults to allow minimal configs

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AdminConfig, CacheConfig, ListenerConfig, ObservabilityConfig, ProxyConfig, SecurityConfig,
    TimeoutConfig,
};
