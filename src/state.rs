//! Shared proxy state.
//!
//! One `ProxyState` exists per process, behind an `Arc` handed to every
//! request handler and to the control plane (admin API, config watcher).
//! Each piece is independently synchronized:
//! - policy lists: `ArcSwap` snapshot, atomic replace
//! - cache: sharded `DashMap`
//! - cache settings: `ArcSwap`, atomic replace
//! - log feed: mutex-guarded ring
//! - listener on/off: `watch` channel read by the proxy listener
//!
//! There are no cross-resource transactions.

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

use crate::cache::CacheStore;
use crate::config::ProxyConfig;
use crate::net::ConnectionTracker;
use crate::observability::LogFeed;
use crate::security::{AccessPolicy, PolicyError};

/// Live cache settings read by every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSettings {
    pub enabled: bool,
    pub ttl_secs: u64,
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("TTL {ttl}s is outside [{min}, {max}]")]
    TtlOutOfRange { ttl: u64, min: u64, max: u64 },

    #[error(transparent)]
    Policy(#[from] PolicyError),
}

pub struct ProxyState {
    pub policy: AccessPolicy,
    pub cache: CacheStore,
    pub feed: LogFeed,
    pub connections: ConnectionTracker,
    settings: ArcSwap<CacheSettings>,
    listening: watch::Sender<bool>,
    min_ttl_secs: u64,
    max_ttl_secs: u64,
    started_at: Instant,
}

impl ProxyState {
    pub fn from_config(config: &ProxyConfig) -> Result<Self, PolicyError> {
        Ok(Self {
            policy: AccessPolicy::new(config.policy.clone())?,
            cache: CacheStore::new(),
            feed: LogFeed::new(config.observability.log_feed_capacity),
            connections: ConnectionTracker::new(),
            settings: ArcSwap::from_pointee(CacheSettings {
                enabled: config.cache.enabled,
                ttl_secs: config.cache.ttl_secs,
            }),
            listening: watch::Sender::new(true),
            min_ttl_secs: config.cache.min_ttl_secs,
            max_ttl_secs: config.cache.max_ttl_secs,
            started_at: Instant::now(),
        })
    }

    /// The current cache settings.
    pub fn cache_settings(&self) -> CacheSettings {
        **self.settings.load()
    }

    /// Inclusive TTL bounds the control plane must respect.
    pub fn ttl_bounds(&self) -> (u64, u64) {
        (self.min_ttl_secs, self.max_ttl_secs)
    }

    /// Change TTL and/or the caching switch. Out-of-range TTL changes nothing.
    pub fn update_cache_settings(
        &self,
        ttl_secs: Option<u64>,
        enabled: Option<bool>,
    ) -> Result<CacheSettings, SettingsError> {
        if let Some(ttl) = ttl_secs {
            self.check_ttl(ttl)?;
        }
        let previous = self.settings.rcu(|current| CacheSettings {
            enabled: enabled.unwrap_or(current.enabled),
            ttl_secs: ttl_secs.unwrap_or(current.ttl_secs),
        });
        let updated = self.cache_settings();
        if updated != *previous {
            tracing::info!(
                enabled = updated.enabled,
                ttl_secs = updated.ttl_secs,
                "Cache settings updated"
            );
        }
        Ok(updated)
    }

    /// Apply the live parts of a (re)loaded config: policy lists and cache
    /// settings. Either everything applies or nothing does.
    pub fn apply_config(&self, config: &ProxyConfig) -> Result<(), SettingsError> {
        self.check_ttl(config.cache.ttl_secs)?;
        self.policy.replace_all(config.policy.clone())?;
        self.settings.store(Arc::new(CacheSettings {
            enabled: config.cache.enabled,
            ttl_secs: config.cache.ttl_secs,
        }));
        Ok(())
    }

    /// Whether the proxy listener serves new connections.
    pub fn is_listening(&self) -> bool {
        *self.listening.borrow()
    }

    /// Pause or resume the proxy listener. Returns whether anything changed.
    pub fn set_listening(&self, on: bool) -> bool {
        let changed = self.listening.send_replace(on) != on;
        if changed {
            tracing::info!(listening = on, "Proxy listener toggled");
        }
        changed
    }

    /// Receiver the proxy listener consults on every accept.
    pub fn listening_gate(&self) -> watch::Receiver<bool> {
        self.listening.subscribe()
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    fn check_ttl(&self, ttl: u64) -> Result<(), SettingsError> {
        if (self.min_ttl_secs..=self.max_ttl_secs).contains(&ttl) {
            Ok(())
        } else {
            Err(SettingsError::TtlOutOfRange {
                ttl,
                min: self.min_ttl_secs,
                max: self.max_ttl_secs,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> ProxyState {
        ProxyState::from_config(&ProxyConfig::default()).unwrap()
    }

    #[test]
    fn initial_settings_come_from_config() {
        let s = state();
        assert_eq!(
            s.cache_settings(),
            CacheSettings {
                enabled: true,
                ttl_secs: 60
            }
        );
        assert_eq!(s.ttl_bounds(), (1, 86_400));
    }

    #[test]
    fn ttl_update_within_bounds() {
        let s = state();
        let updated = s.update_cache_settings(Some(5), None).unwrap();
        assert_eq!(updated.ttl_secs, 5);
        assert!(updated.enabled);
        assert_eq!(s.cache_settings().ttl(), Duration::from_secs(5));
    }

    #[test]
    fn ttl_out_of_range_changes_nothing() {
        let s = state();
        let err = s.update_cache_settings(Some(0), Some(false)).unwrap_err();
        assert_eq!(
            err,
            SettingsError::TtlOutOfRange {
                ttl: 0,
                min: 1,
                max: 86_400
            }
        );
        assert_eq!(s.cache_settings().ttl_secs, 60);
        assert!(s.cache_settings().enabled);
    }

    #[test]
    fn caching_can_be_switched_off() {
        let s = state();
        s.update_cache_settings(None, Some(false)).unwrap();
        assert!(!s.cache_settings().enabled);
    }

    #[test]
    fn listener_toggle_reaches_gate() {
        let s = state();
        let gate = s.listening_gate();
        assert!(s.is_listening());
        assert!(s.set_listening(false));
        assert!(!s.set_listening(false));
        assert!(!*gate.borrow());
        assert!(s.set_listening(true));
        assert!(*gate.borrow());
    }

    #[test]
    fn apply_config_is_all_or_nothing() {
        let s = state();
        let mut config = ProxyConfig::default();
        config.policy.ip_blacklist = vec!["10.0.0.9".into()];
        config.cache.ttl_secs = 500_000;
        assert!(s.apply_config(&config).is_err());
        assert!(s.policy.snapshot().ip_blacklist.is_empty());

        config.cache.ttl_secs = 10;
        s.apply_config(&config).unwrap();
        assert_eq!(s.policy.snapshot().ip_blacklist, vec!["10.0.0.9".to_string()]);
        assert_eq!(s.cache_settings().ttl_secs, 10);
    }
}
