//! Configuration file watcher for hot reload.
//!
//! Only policy lists and cache settings take effect on reload; see
//! `ProxyState::apply_config`. A file that fails to load or validate is
//! logged and ignored, keeping the live settings.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::config::loader::load_config;
use crate::state::ProxyState;

/// Watches the config file and pushes its live settings into `ProxyState`.
pub struct ConfigWatcher {
    path: PathBuf,
    state: Arc<ProxyState>,
}

impl ConfigWatcher {
    pub fn new(path: &Path, state: Arc<ProxyState>) -> Self {
        Self {
            path: path.to_path_buf(),
            state,
        }
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let path = self.path.clone();
        let state = self.state.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    tracing::info!(path = ?path, "Config file change detected, reloading");
                    reload(&path, &state);
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

/// Load `path` and apply it. Returns whether the live state changed.
pub fn reload(path: &Path, state: &ProxyState) -> bool {
    let config = match load_config(path) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Failed to reload config, keeping current settings");
            return false;
        }
    };
    match state.apply_config(&config) {
        Ok(()) => {
            state.feed.push(format!("> Settings reloaded from {} <", path.display()));
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Reloaded config rejected, keeping current settings");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProxyConfig;
    use std::fs;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("forward-proxy-{name}-{}.toml", std::process::id()))
    }

    #[test]
    fn reload_applies_policy_and_ttl() {
        let state = ProxyState::from_config(&ProxyConfig::default()).unwrap();
        let path = temp_path("reload-ok");
        fs::write(
            &path,
            "[cache]\nttl_secs = 5\n\n[policy]\nip_blacklist = [\"10.0.0.5\"]\n",
        )
        .unwrap();

        assert!(reload(&path, &state));
        assert_eq!(state.cache_settings().ttl_secs, 5);
        assert_eq!(state.policy.snapshot().ip_blacklist, vec!["10.0.0.5".to_string()]);
        fs::remove_file(&path).unwrap_or_default();
    }

    #[test]
    fn invalid_file_keeps_current_settings() {
        let state = ProxyState::from_config(&ProxyConfig::default()).unwrap();
        let path = temp_path("reload-bad");
        fs::write(&path, "[policy]\nip_blacklist = [\"not an ip\"]\n").unwrap();

        assert!(!reload(&path, &state));
        assert!(state.policy.snapshot().ip_blacklist.is_empty());
        fs::remove_file(&path).unwrap_or_default();
    }
}
