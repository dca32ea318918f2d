//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, TTL within its bounds)
//! - Validate addresses and policy entries
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::ProxyConfig;
use crate::security::AccessPolicy;

/// A single semantic problem in a config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be greater than 0"));
    }

    if config.admin.enabled {
        check_addr(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if config.admin.api_key.trim().is_empty() {
            errors.push(ValidationError::new("admin.api_key", "must not be empty"));
        }
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::new("timeouts.connect_secs", "must be greater than 0"));
    }
    if config.timeouts.read_secs == 0 {
        errors.push(ValidationError::new("timeouts.read_secs", "must be greater than 0"));
    }

    let cache = &config.cache;
    if cache.min_ttl_secs > cache.max_ttl_secs {
        errors.push(ValidationError::new(
            "cache.min_ttl_secs",
            format!("{} exceeds max_ttl_secs {}", cache.min_ttl_secs, cache.max_ttl_secs),
        ));
    } else if !(cache.min_ttl_secs..=cache.max_ttl_secs).contains(&cache.ttl_secs) {
        errors.push(ValidationError::new(
            "cache.ttl_secs",
            format!(
                "{} is outside [{}, {}]",
                cache.ttl_secs, cache.min_ttl_secs, cache.max_ttl_secs
            ),
        ));
    }
    if cache.sweep_interval_secs == 0 {
        errors.push(ValidationError::new("cache.sweep_interval_secs", "must be greater than 0"));
    }
    if cache.max_response_bytes == 0 {
        errors.push(ValidationError::new("cache.max_response_bytes", "must be greater than 0"));
    }

    if let Err(e) = AccessPolicy::new(config.policy.clone()) {
        errors.push(ValidationError::new("policy", e.to_string()));
    }

    if config.observability.metrics_enabled {
        check_addr(&mut errors, "observability.metrics_address", &config.observability.metrics_address);
    }
    if config.observability.log_feed_capacity == 0 {
        errors.push(ValidationError::new(
            "observability.log_feed_capacity",
            "must be greater than 0",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_addr(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(field, format!("'{value}' is not a socket address")));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&ProxyConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = ProxyConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.timeouts.connect_secs = 0;
        config.cache.ttl_secs = 0;
        config.policy.ip_blacklist = vec!["10.0.0.a".into()];

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec!["listener.bind_address", "timeouts.connect_secs", "cache.ttl_secs", "policy"]
        );
    }

    #[test]
    fn inverted_ttl_bounds_rejected() {
        let mut config = ProxyConfig::default();
        config.cache.min_ttl_secs = 100;
        config.cache.max_ttl_secs = 10;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "cache.min_ttl_secs");
    }

    #[test]
    fn disabled_admin_skips_its_checks() {
        let mut config = ProxyConfig::default();
        config.admin.enabled = false;
        config.admin.api_key.clear();
        config.admin.bind_address.clear();
        assert!(validate_config(&config).is_ok());
    }
}
