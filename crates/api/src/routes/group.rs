use axum::{
    Json,
    extract::{Path, State},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;
use vrinda_db::models::{Group, ReadingSession, UserRole};
use vrinda_services::admission::AdmissionDecision;

use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupRequest {
    #[validate(length(min = 1, max = 64))]
    pub id: Option<String>,
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    pub reading_time: Option<String>,
    #[validate(length(min = 1))]
    pub admin_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingTimeRequest {
    /// `null` or an empty string clears the reading time.
    pub reading_time: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub scheduled_start: Option<DateTime<Utc>>,
    #[validate(range(min = 1))]
    pub max_duration_minutes: Option<u32>,
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateGroupRequest>,
) -> Result<Json<Group>, ApiError> {
    if !auth.role.is_super_admin() {
        return Err(ApiError::Forbidden("Only super admins can register groups".to_string()));
    }
    body.validate()?;

    let group = state
        .groups
        .create(body.id, body.name, body.reading_time, body.admin_id, state.clock.now())?;
    tracing::info!(group_id = %group.id, "Group registered");

    Ok(Json(group))
}

pub async fn get(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(group_id): Path<String>,
) -> Result<Json<Group>, ApiError> {
    Ok(Json(state.groups.find_by_id(&group_id)?))
}

pub async fn set_reading_time(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(group_id): Path<String>,
    Json(body): Json<ReadingTimeRequest>,
) -> Result<Json<Group>, ApiError> {
    let (_, privilege) = state.group_privilege(auth.role, &auth.user_id, &group_id)?;
    if !privilege.is_moderator() {
        return Err(ApiError::Forbidden(
            "Only the group admin can change the reading time".to_string(),
        ));
    }

    let group = state
        .groups
        .set_reading_time(&group_id, body.reading_time, state.clock.now())?;
    tracing::info!(%group_id, reading_time = ?group.reading_time, "Reading time updated");

    Ok(Json(group))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSummary {
    pub id: String,
    pub name: String,
    pub reading_time: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchingTimeResponse {
    #[serde(flatten)]
    pub decision: AdmissionDecision,
    pub group: GroupSummary,
    pub user_role: UserRole,
}

/// Whether the caller may join the group's reading right now.
pub async fn matching_time(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(group_id): Path<String>,
) -> Result<Json<MatchingTimeResponse>, ApiError> {
    let (group, privilege) = state.group_privilege(auth.role, &auth.user_id, &group_id)?;
    let decision = state.admission.check(privilege, &group, state.clock.now());

    Ok(Json(MatchingTimeResponse {
        decision,
        group: GroupSummary {
            id: group.id,
            name: group.name,
            reading_time: group.reading_time,
        },
        user_role: auth.role,
    }))
}

pub async fn create_session(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(group_id): Path<String>,
    Json(body): Json<CreateSessionRequest>,
) -> Result<Json<ReadingSession>, ApiError> {
    let (group, privilege) = state.group_privilege(auth.role, &auth.user_id, &group_id)?;
    if !privilege.is_moderator() {
        return Err(ApiError::Forbidden(
            "Only the group admin can schedule sessions".to_string(),
        ));
    }
    body.validate()?;

    let limits = &state.settings.session;
    let minutes = body.max_duration_minutes.unwrap_or(limits.default_duration_minutes);
    if minutes > limits.max_duration_minutes {
        return Err(ApiError::BadRequest(format!(
            "maxDurationMinutes must not exceed {}",
            limits.max_duration_minutes
        )));
    }

    let now = state.clock.now();
    let session = state.sessions.create(
        group.id,
        body.scheduled_start.unwrap_or(now),
        minutes,
        auth.user_id,
        now,
    )?;
    tracing::info!(session_id = %session.id, %group_id, "Reading session scheduled");

    Ok(Json(session))
}

pub async fn list_sessions(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(group_id): Path<String>,
) -> Result<Json<Vec<ReadingSession>>, ApiError> {
    state.groups.find_by_id(&group_id)?;
    Ok(Json(state.sessions.find_by_group(&group_id, state.clock.now())))
}
