//! Client-visible error taxonomy for the request pipeline.
//!
//! Every failure a handler can hit is one of these variants. Each maps to a
//! fixed status code; the message is what the client sees in the body.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::security::access_control::Denial;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Access denied: {0}")]
    PolicyDenied(Denial),

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("Origin unreachable: {host}: {reason}")]
    OriginUnreachable { host: String, reason: String },

    #[error("Origin timed out during {stage}: {host}")]
    OriginTimeout { host: String, stage: &'static str },

    #[error("Origin protocol error: {0}")]
    OriginProtocolError(String),

    /// A stored entry could not be rebuilt into a response. Never sent to a
    /// client; the handler treats it as a miss.
    #[error("Cache entry corrupted: {0}")]
    CacheCorruption(String),
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::PolicyDenied(_) => StatusCode::FORBIDDEN,
            ProxyError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ProxyError::OriginUnreachable { .. } => StatusCode::BAD_GATEWAY,
            ProxyError::OriginTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::OriginProtocolError(_) => StatusCode::BAD_GATEWAY,
            ProxyError::CacheCorruption(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label used for log lines and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::MalformedRequest(_) => "malformed_request",
            ProxyError::PolicyDenied(_) => "policy_denied",
            ProxyError::MethodNotAllowed(_) => "method_not_allowed",
            ProxyError::OriginUnreachable { .. } => "origin_unreachable",
            ProxyError::OriginTimeout { .. } => "origin_timeout",
            ProxyError::OriginProtocolError(_) => "origin_protocol_error",
            ProxyError::CacheCorruption(_) => "cache_corruption",
        }
    }

    /// True for the errors raised while talking to the origin.
    pub fn is_origin_failure(&self) -> bool {
        matches!(
            self,
            ProxyError::OriginUnreachable { .. }
                | ProxyError::OriginTimeout { .. }
                | ProxyError::OriginProtocolError(_)
        )
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut response = (status, self.to_string()).into_response();
        if let ProxyError::MethodNotAllowed(_) = self {
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static(crate::http::request::ALLOWED_METHODS));
        }
        response
    }
}
