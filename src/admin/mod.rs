//! Admin JSON API.
//!
//! # Responsibilities
//! - Report status, policy lists, cache state and the request log feed
//! - Replace policy lists and change cache settings at runtime
//! - Pause and resume the proxy listener
//! - Guard every endpoint with a bearer token
//!
//! Runs on its own listener so the proxy port never serves admin routes.

pub mod auth;
pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, put},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::state::ProxyState;

/// State shared by admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub shared: Arc<ProxyState>,
    pub api_key: Arc<str>,
    pub proxy_addr: SocketAddr,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/policy", get(get_policy))
        .route("/admin/policy/{dimension}/{kind}", put(put_policy_list))
        .route("/admin/cache", get(get_cache).delete(clear_cache))
        .route("/admin/cache/settings", put(put_cache_settings))
        .route("/admin/logs", get(get_logs))
        .route("/admin/listener", put(put_listener))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ))
        .with_state(state)
}
