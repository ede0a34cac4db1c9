//! Authentication flow endpoints: OAuth login URL, callback, logout.

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use checkin_core::points::ReconciliationResult;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::rest::*;
use crate::session::Session;

/// GET /v1/auth/login-url — OAuth URL for the landing page button.
pub async fn handle_login_url(
    State(state): State<AppState>,
) -> Result<Json<LoginUrlResponse>, RestError> {
    let login_url = state.crm.oauth_login_url().map_err(crm_failure)?;
    Ok(Json(LoginUrlResponse { login_url }))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    pub code: String,
}

/// GET /v1/auth/callback?code=… — OAuth callback.
///
/// Exchanges the authorization code, logs in as the API user, loads the
/// constituent and their point records, reconciles, and mints a session.
/// The response tells the front end whether to show the check-in form
/// (today's check-in still available) or go straight to the dashboard.
pub async fn handle_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Result<Json<CallbackResponse>, RestError> {
    if params.code.is_empty() || params.code.len() > MAX_FIELD_LEN {
        return Err(bad_request("authorization 'code' missing or too long"));
    }

    let account_id = state
        .crm
        .exchange_code(&params.code)
        .await
        .map_err(crm_failure)?;
    let user_session_id = state.crm.api_login().await.map_err(crm_failure)?;
    let constituent = state
        .crm
        .retrieve_constituent(&user_session_id, &account_id)
        .await
        .map_err(crm_failure)?;

    let raw_events = state
        .crm
        .list_point_records(&user_session_id, &account_id)
        .await
        .map_err(crm_failure)?;
    let raw_tiers = state
        .crm
        .list_incentives(&user_session_id)
        .await
        .map_err(crm_failure)?;
    let summary = state
        .reconciler
        .reconcile(&raw_events, &raw_tiers, Utc::now().date_naive());

    let now = Utc::now();
    let session_token = state.sessions.create(Session {
        account_id,
        constituent_name: constituent.display_name.clone(),
        user_session_id,
        usid_obtained_at: now,
        last_summary: summary.clone(),
        last_seen: now,
    });

    metrics::counter!("api.logins").increment(1);
    info!(name = %constituent.display_name, "Constituent logged in");

    let checkin_groups = if summary.eligible_for_checkin {
        state.checkin_groups.as_ref().clone()
    } else {
        Vec::new()
    };

    Ok(Json(CallbackResponse {
        session_token: session_token.to_string(),
        name: constituent.display_name,
        eligible_for_checkin: summary.eligible_for_checkin,
        checkin_groups,
        summary,
    }))
}

/// POST /v1/auth/logout — Drop the server-side session.
pub async fn handle_logout(State(state): State<AppState>, headers: HeaderMap) -> StatusCode {
    if let Some(token) = bearer_token(&headers) {
        if state.sessions.remove(&token) {
            metrics::counter!("api.logouts").increment(1);
            return StatusCode::NO_CONTENT;
        }
    }
    StatusCode::NO_CONTENT
}

#[derive(Serialize)]
pub struct LoginUrlResponse {
    pub login_url: String,
}

#[derive(Serialize)]
pub struct CallbackResponse {
    pub session_token: String,
    pub name: String,
    pub eligible_for_checkin: bool,
    /// Groups offered on the check-in form; empty when already checked in.
    pub checkin_groups: Vec<String>,
    pub summary: ReconciliationResult,
}
