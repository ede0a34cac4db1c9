//! Shared REST state, operational endpoints, and error plumbing.

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::Json;
use checkin_core::error::CheckinError;
use checkin_crm::CrmClient;
use checkin_points::PointsReconciler;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::error;
use uuid::Uuid;

use crate::session::SessionStore;

/// Maximum length accepted for client-supplied string fields.
pub const MAX_FIELD_LEN: usize = 256;

/// Maximum length of a submitted data-update value (e.g. a profile URL).
pub const MAX_VALUE_LEN: usize = 2048;

/// Shared application state for REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub crm: Arc<CrmClient>,
    pub reconciler: Arc<PointsReconciler>,
    pub sessions: Arc<SessionStore>,
    pub checkin_groups: Arc<Vec<String>>,
    pub node_id: String,
    pub start_time: Instant,
}

pub type RestError = (StatusCode, Json<ErrorResponse>);

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

pub fn bad_request(message: &str) -> RestError {
    metrics::counter!("api.validation_errors").increment(1);
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: "invalid_request".to_string(),
            message: message.to_string(),
        }),
    )
}

pub fn unauthorized() -> RestError {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            error: "unauthorized".to_string(),
            message: "Missing, invalid, or expired session token".to_string(),
        }),
    )
}

pub fn conflict(error: &str, message: &str) -> RestError {
    (
        StatusCode::CONFLICT,
        Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
        }),
    )
}

/// Map a CRM-layer failure onto an HTTP status. Upstream trouble is a
/// 502 so callers can tell it apart from our own faults.
pub fn crm_failure(e: CheckinError) -> RestError {
    error!(error = %e, "CRM interaction failed");
    metrics::counter!("api.errors").increment(1);
    let status = match &e {
        CheckinError::Transport(_) | CheckinError::Crm(_) => StatusCode::BAD_GATEWAY,
        CheckinError::OAuth(_) | CheckinError::Session(_) => StatusCode::UNAUTHORIZED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: "crm_failure".to_string(),
            message: e.to_string(),
        }),
    )
}

/// Extract the session token from a `Bearer` Authorization header.
pub fn bearer_token(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .and_then(|token| Uuid::parse_str(token.trim()).ok())
}

/// GET /health — Health check endpoint.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        node_id: state.node_id.clone(),
        active_sessions: state.sessions.len(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET /ready — Readiness probe for Kubernetes.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    if state.start_time.elapsed().as_secs() > 0 {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /live — Liveness probe for Kubernetes.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub node_id: String,
    pub active_sessions: usize,
    pub uptime_secs: u64,
}
