//! HTTP server setup and the proxy request pipeline.
//!
//! # Responsibilities
//! - Create the Axum router; every request lands on `proxy_handler`
//! - Wire up middleware (tracing, request ID, body limit)
//! - Serve on the bounded listener, one task per connection
//! - Run the per-request pipeline:
//!   parse → policy check → cache lookup → forward on miss → store → respond
//! - Sweep expired cache entries in the background

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Method, Request},
    response::{IntoResponse, Response},
    Router,
};
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::SetRequestIdLayer,
    trace::TraceLayer,
};
use tracing::Instrument;

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::http::forwarder::OriginForwarder;
use crate::http::request::{MakeRequestUuid, ProxyRequest, X_REQUEST_ID};
use crate::http::response::options_response;
use crate::net::{Listener, PeerAddr};
use crate::observability::metrics;
use crate::state::ProxyState;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<ProxyState>,
    pub forwarder: Arc<OriginForwarder>,
    pub max_body_size: usize,
}

/// How a request ended, for the log feed and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    CacheHit,
    Forwarded { stored: bool },
    Answered,
    Failed(&'static str),
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::CacheHit => "cache_hit",
            Outcome::Forwarded { stored: true } => "forwarded_stored",
            Outcome::Forwarded { stored: false } => "forwarded",
            Outcome::Answered => "answered",
            Outcome::Failed(kind) => *kind,
        }
    }
}

/// HTTP server for the forward proxy.
pub struct HttpServer {
    router: Router,
    state: Arc<ProxyState>,
    sweep_interval: Duration,
}

impl HttpServer {
    /// Create a new HTTP server sharing `state` with the control plane.
    pub fn new(config: &ProxyConfig, state: Arc<ProxyState>) -> Self {
        let app_state = AppState {
            shared: state.clone(),
            forwarder: Arc::new(OriginForwarder::from_config(&config.timeouts, &config.cache)),
            max_body_size: config.security.max_body_size,
        };

        Self {
            router: Self::build_router(config, app_state),
            state,
            sweep_interval: Duration::from_secs(config.cache.sweep_interval_secs),
        }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// A fallback rather than path routes, so absolute-form and
    /// authority-form targets all reach the handler.
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        Router::new()
            .fallback(proxy_handler)
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(
                        axum::http::HeaderName::from_static(X_REQUEST_ID),
                        MakeRequestUuid,
                    ))
                    .layer(TraceLayer::new_for_http())
                    .layer(RequestBodyLimitLayer::new(config.security.max_body_size)),
            )
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Proxy server starting");

        let sweeper = tokio::spawn(sweep_expired(
            self.state.clone(),
            self.sweep_interval,
            shutdown.resubscribe(),
        ));

        let app = self.router.into_make_service_with_connect_info::<PeerAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        sweeper.abort();
        tracing::info!("Proxy server stopped");
        Ok(())
    }
}

/// Periodically drop expired cache entries. Lookups expire lazily anyway;
/// this only bounds memory.
async fn sweep_expired(
    state: Arc<ProxyState>,
    every: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut interval = tokio::time::interval(every);
    interval.tick().await;
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let removed = state.cache.evict_expired();
                if removed > 0 {
                    tracing::debug!(removed, remaining = state.cache.len(), "Swept expired cache entries");
                }
            }
            _ = shutdown.recv() => break,
        }
    }
}

/// Main proxy handler. Runs the pipeline and records its outcome.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(PeerAddr(peer)): ConnectInfo<PeerAddr>,
    request: Request<Body>,
) -> Response {
    let start_time = Instant::now();
    let client_ip = peer.ip().to_canonical();
    let method = request.method().clone();
    let target = request.uri().to_string();
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let span = tracing::info_span!(
        "proxy",
        request_id = %request_id,
        client_ip = %client_ip,
        method = %method,
        target = %target,
    );

    let (response, outcome) = match handle(&state, client_ip, request).instrument(span.clone()).await {
        Ok(done) => done,
        Err(e) => {
            let outcome = Outcome::Failed(e.kind());
            span.in_scope(|| {
                if e.is_origin_failure() {
                    metrics::record_origin_error(e.kind());
                    tracing::warn!(error = %e, "Forwarding failed");
                } else {
                    tracing::info!(error = %e, "Request refused");
                }
            });
            (e.into_response(), outcome)
        }
    };

    let status = response.status();
    span.in_scope(|| {
        tracing::info!(
            status = status.as_u16(),
            outcome = outcome.as_str(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Request completed"
        );
    });
    metrics::record_request(method.as_str(), outcome.as_str(), start_time);
    state.shared.feed.push(format!(
        "{client_ip} \"{method} {target}\" {} {}",
        status.as_u16(),
        outcome.as_str()
    ));

    response
}

/// The pipeline proper. Every early return is a terminal state.
async fn handle(
    state: &AppState,
    client_ip: IpAddr,
    request: Request<Body>,
) -> Result<(Response, Outcome), ProxyError> {
    let shared = &state.shared;

    // CONNECT carries an authority-form target, so only the IP lists apply.
    if request.method() == Method::CONNECT {
        shared
            .policy
            .check_ip(client_ip)
            .map_err(ProxyError::PolicyDenied)?;
        return Err(ProxyError::MethodNotAllowed(Method::CONNECT.to_string()));
    }

    // ACCEPTED → PARSED
    let request = ProxyRequest::parse(request, state.max_body_size).await?;

    // PARSED → POLICY_CHECKED
    shared
        .policy
        .check(client_ip, &request.url)
        .map_err(ProxyError::PolicyDenied)?;

    match request.method {
        Method::OPTIONS => return Ok((options_response(), Outcome::Answered)),
        Method::TRACE => return Err(ProxyError::MethodNotAllowed(Method::TRACE.to_string())),
        _ => {}
    }

    // POLICY_CHECKED → CACHE_LOOKED_UP
    let caching = shared.cache_settings().enabled && request.is_cacheable_method();
    let key = caching.then(|| request.cache_key());
    if let Some(key) = &key {
        match shared.cache.get(key) {
            Some(entry) => match entry.response.to_response() {
                Ok(response) => {
                    metrics::record_cache_lookup("hit");
                    tracing::debug!(key = %key, "Served from cache");
                    return Ok((response, Outcome::CacheHit));
                }
                Err(e) => {
                    metrics::record_cache_lookup("corrupt");
                    tracing::warn!(key = %key, error = %e, "Discarding unreadable cache entry");
                    shared.cache.remove(key);
                }
            },
            None => metrics::record_cache_lookup("miss"),
        }
    }

    // CACHE_LOOKED_UP → FORWARDED
    let origin = state.forwarder.forward(&request).await?;

    let mut stored = false;
    if let Some(key) = key {
        if origin.is_storable() {
            // TTL is read at store time so a concurrent update applies.
            let ttl = shared.cache_settings().ttl();
            shared.cache.put(key, origin.to_cached(), ttl);
            stored = true;
        }
    }

    Ok((origin.into_response(), Outcome::Forwarded { stored }))
}
