use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::admin::AdminState;
use crate::observability::feed::FeedPage;
use crate::security::access_control::parse_list;
use crate::security::{Dimension, ListKind, PolicyError, PolicyLists};
use crate::state::{CacheSettings, SettingsError};

/// Default and maximum number of lines per `/admin/logs` page.
const MAX_LOG_PAGE: usize = 500;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SystemStatus {
    pub version: String,
    pub status: String,
    pub proxy_address: String,
    pub running: bool,
    pub uptime_secs: u64,
    pub active_connections: u64,
    pub cache_entries: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CacheStatus {
    pub entries: usize,
    pub enabled: bool,
    pub ttl_secs: u64,
    pub min_ttl_secs: u64,
    pub max_ttl_secs: u64,
}

/// Body of a policy list replacement: either a JSON array or the
/// comma-separated text an operator would type.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(untagged)]
pub enum PolicyListUpdate {
    Entries { entries: Vec<String> },
    Raw { raw: String },
}

impl PolicyListUpdate {
    fn into_entries(self) -> Vec<String> {
        match self {
            PolicyListUpdate::Entries { entries } => entries,
            PolicyListUpdate::Raw { raw } => parse_list(&raw),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct CacheSettingsUpdate {
    pub ttl_secs: Option<u64>,
    pub enabled: Option<bool>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerState {
    pub running: bool,
}

#[derive(Deserialize, Debug, Default)]
pub struct LogsQuery {
    #[serde(default)]
    pub since: u64,
    pub limit: Option<usize>,
}

/// Control-plane error rendered as `{"error": ...}`.
#[derive(Debug)]
pub struct AdminError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

impl From<PolicyError> for AdminError {
    fn from(e: PolicyError) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: e.to_string(),
        }
    }
}

impl From<SettingsError> for AdminError {
    fn from(e: SettingsError) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: e.to_string(),
        }
    }
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "operational".to_string(),
        proxy_address: state.proxy_addr.to_string(),
        running: state.shared.is_listening(),
        uptime_secs: state.shared.uptime().as_secs(),
        active_connections: state.shared.connections.active_count(),
        cache_entries: state.shared.cache.len(),
    })
}

pub async fn get_policy(State(state): State<AdminState>) -> Json<PolicyLists> {
    Json(state.shared.policy.snapshot())
}

pub async fn put_policy_list(
    State(state): State<AdminState>,
    Path((dimension, kind)): Path<(Dimension, ListKind)>,
    Json(update): Json<PolicyListUpdate>,
) -> Result<Json<PolicyLists>, AdminError> {
    let entries = update.into_entries();
    let count = entries.len();
    state.shared.policy.update(dimension, kind, entries)?;
    state
        .shared
        .feed
        .push(format!("admin: {dimension} {kind} replaced ({count} entries)"));
    Ok(Json(state.shared.policy.snapshot()))
}

fn cache_status(state: &AdminState) -> CacheStatus {
    let CacheSettings { enabled, ttl_secs } = state.shared.cache_settings();
    let (min_ttl_secs, max_ttl_secs) = state.shared.ttl_bounds();
    CacheStatus {
        entries: state.shared.cache.len(),
        enabled,
        ttl_secs,
        min_ttl_secs,
        max_ttl_secs,
    }
}

pub async fn get_cache(State(state): State<AdminState>) -> Json<CacheStatus> {
    Json(cache_status(&state))
}

pub async fn put_cache_settings(
    State(state): State<AdminState>,
    Json(update): Json<CacheSettingsUpdate>,
) -> Result<Json<CacheStatus>, AdminError> {
    let settings = state
        .shared
        .update_cache_settings(update.ttl_secs, update.enabled)?;
    state.shared.feed.push(format!(
        "admin: cache settings enabled={} ttl={}s",
        settings.enabled, settings.ttl_secs
    ));
    Ok(Json(cache_status(&state)))
}

pub async fn clear_cache(State(state): State<AdminState>) -> Json<CacheStatus> {
    let removed = state.shared.cache.len();
    state.shared.cache.clear();
    tracing::info!(removed, "Cache cleared");
    state
        .shared
        .feed
        .push(format!("admin: cache cleared ({removed} entries)"));
    Json(cache_status(&state))
}

/// While paused, new proxy connections are closed on accept. Open ones
/// finish normally.
pub async fn put_listener(
    State(state): State<AdminState>,
    Json(update): Json<ListenerState>,
) -> Json<ListenerState> {
    if state.shared.set_listening(update.running) {
        let verb = if update.running { "resumed" } else { "paused" };
        state.shared.feed.push(format!("admin: proxy listener {verb}"));
    }
    Json(ListenerState {
        running: state.shared.is_listening(),
    })
}

pub async fn get_logs(
    State(state): State<AdminState>,
    Query(query): Query<LogsQuery>,
) -> Json<FeedPage> {
    let limit = query.limit.unwrap_or(MAX_LOG_PAGE).min(MAX_LOG_PAGE);
    Json(state.shared.feed.since(query.since, limit))
}
