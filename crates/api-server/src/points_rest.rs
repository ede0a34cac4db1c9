//! Points dashboard and point-earning endpoints.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use checkin_core::points::{IncentiveTier, ReconciliationResult, DATA_UPDATE_TYPE};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::rest::*;
use crate::session::Session;

/// Resolve the caller's session, renewing the CRM user session id when
/// its ten-minute window has lapsed.
async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<(Uuid, Session), RestError> {
    let token = bearer_token(headers).ok_or_else(unauthorized)?;
    let mut session = state.sessions.snapshot(&token).ok_or_else(unauthorized)?;

    if state.sessions.usid_expired(&session) {
        let user_session_id = state.crm.api_login().await.map_err(crm_failure)?;
        state.sessions.set_usid(&token, user_session_id.clone());
        session.user_session_id = user_session_id;
    }

    Ok((token, session))
}

/// Fetch fresh point and incentive records and reconcile them, caching
/// the result on the session.
async fn refresh_summary(
    state: &AppState,
    token: &Uuid,
    session: &Session,
) -> Result<(ReconciliationResult, Vec<IncentiveTier>), RestError> {
    let raw_events = state
        .crm
        .list_point_records(&session.user_session_id, &session.account_id)
        .await
        .map_err(crm_failure)?;
    let raw_tiers = state
        .crm
        .list_incentives(&session.user_session_id)
        .await
        .map_err(crm_failure)?;

    let summary = state
        .reconciler
        .reconcile(&raw_events, &raw_tiers, Utc::now().date_naive());
    state.sessions.set_summary(token, summary.clone());

    let mut incentives = state.reconciler.parse_tiers(&raw_tiers);
    incentives.sort_by_key(|t| t.points_needed);

    Ok((summary, incentives))
}

/// GET /v1/dashboard — Fresh reconciled summary plus the incentive catalog.
pub async fn handle_dashboard(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<DashboardResponse>, RestError> {
    let (token, session) = authenticate(&state, &headers).await?;
    let (summary, incentives) = refresh_summary(&state, &token, &session).await?;

    Ok(Json(DashboardResponse {
        name: session.constituent_name,
        incentives,
        summary,
    }))
}

/// GET /v1/points — Points detail view from the session's cached summary.
pub async fn handle_points(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<PointsResponse>, RestError> {
    let (_token, session) = authenticate(&state, &headers).await?;
    Ok(Json(PointsResponse {
        name: session.constituent_name,
        summary: session.last_summary,
    }))
}

/// POST /v1/checkin — Record today's event check-in.
pub async fn handle_checkin(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CheckinRequest>,
) -> Result<Json<DashboardResponse>, RestError> {
    if request.selected_group.is_empty() || request.selected_group.len() > MAX_FIELD_LEN {
        return Err(bad_request("'selected_group' missing or too long"));
    }
    if !state.checkin_groups.contains(&request.selected_group) {
        return Err(bad_request("'selected_group' is not a known group"));
    }

    let (token, session) = authenticate(&state, &headers).await?;

    // Re-check against fresh CRM data, not the cached summary; the
    // constituent may have checked in from another tab.
    let (summary, _) = refresh_summary(&state, &token, &session).await?;
    if !summary.eligible_for_checkin {
        return Err(conflict(
            "already_checked_in",
            "A check-in has already been recorded today",
        ));
    }

    state
        .crm
        .create_checkin_record(
            &session.user_session_id,
            &session.account_id,
            &request.selected_group,
            Utc::now().date_naive(),
        )
        .await
        .map_err(crm_failure)?;

    metrics::counter!("api.checkins").increment(1);
    info!(group = %request.selected_group, "Check-in recorded");

    let (summary, incentives) = refresh_summary(&state, &token, &session).await?;
    Ok(Json(DashboardResponse {
        name: session.constituent_name,
        incentives,
        summary,
    }))
}

/// POST /v1/data-update — Submit a profile data update for points.
pub async fn handle_data_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<DataUpdateRequest>,
) -> Result<Json<DashboardResponse>, RestError> {
    if request.kind.is_empty() || request.kind.len() > MAX_FIELD_LEN {
        return Err(bad_request("'kind' missing or too long"));
    }
    if !state
        .reconciler
        .config()
        .data_update_kinds
        .contains(&request.kind)
    {
        return Err(bad_request("'kind' is not in the data-update catalog"));
    }
    if request.value.is_empty() || request.value.len() > MAX_VALUE_LEN {
        return Err(bad_request("'value' missing or too long"));
    }

    let (token, session) = authenticate(&state, &headers).await?;

    let (summary, _) = refresh_summary(&state, &token, &session).await?;
    if !summary.eligible_for_data_update {
        return Err(conflict(
            "not_eligible",
            "A data update has already been recorded today, or all kinds are done",
        ));
    }
    let already_submitted = summary
        .events
        .iter()
        .any(|e| e.event_type == DATA_UPDATE_TYPE && e.subtype == request.kind);
    if already_submitted {
        return Err(conflict(
            "kind_already_submitted",
            "This data-update kind has already been submitted",
        ));
    }

    state
        .crm
        .create_data_update_records(
            &session.user_session_id,
            &session.account_id,
            &request.kind,
            &request.value,
            Utc::now().date_naive(),
        )
        .await
        .map_err(crm_failure)?;

    metrics::counter!("api.data_updates").increment(1);
    info!(kind = %request.kind, "Data update recorded");

    let (summary, incentives) = refresh_summary(&state, &token, &session).await?;
    Ok(Json(DashboardResponse {
        name: session.constituent_name,
        incentives,
        summary,
    }))
}

#[derive(Deserialize)]
pub struct CheckinRequest {
    pub selected_group: String,
}

#[derive(Deserialize)]
pub struct DataUpdateRequest {
    pub kind: String,
    /// The submitted datum itself, e.g. a LinkedIn profile URL.
    pub value: String,
}

#[derive(Serialize)]
pub struct DashboardResponse {
    pub name: String,
    /// Full incentive catalog, ascending by threshold.
    pub incentives: Vec<IncentiveTier>,
    pub summary: ReconciliationResult,
}

#[derive(Serialize)]
pub struct PointsResponse {
    pub name: String,
    pub summary: ReconciliationResult,
}
