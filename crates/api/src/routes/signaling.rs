use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use serde_json::{Value, json};
use validator::Validate;
use vrinda_db::models::{SignalKind, SignalingMessage};

use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PostSignalRequest {
    #[validate(length(min = 1))]
    pub session_id: String,
    #[serde(rename = "type")]
    pub kind: SignalKind,
    /// Defaults to the caller; any other value is rejected.
    pub from: Option<String>,
    #[validate(length(min = 1))]
    pub to: Option<String>,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    #[validate(length(min = 1))]
    pub session_id: String,
    #[validate(length(min = 1))]
    pub participant_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionQuery {
    pub session_id: Option<String>,
    pub participant_id: Option<String>,
}

/// Stores the payload (replacing the previous one) and forwards it live.
pub async fn post(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<PostSignalRequest>,
) -> Result<Json<Value>, ApiError> {
    body.validate()?;
    if body.from.as_deref().is_some_and(|from| from != auth.user_id) {
        return Err(ApiError::Forbidden("Cannot send signals on behalf of another participant".to_string()));
    }
    state.sessions.find_by_id(&body.session_id, state.clock.now())?;

    let message = SignalingMessage {
        kind: body.kind,
        session_id: body.session_id,
        from: auth.user_id,
        to: body.to,
        data: body.data,
        timestamp: state.clock.now().timestamp_millis(),
    };
    state.hub.relay_signal(message.clone()).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Signaling data stored",
        "data": message,
    })))
}

pub async fn latest(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<SessionQuery>,
) -> Result<Json<Value>, ApiError> {
    let session_id = required(query.session_id, "sessionId")?;
    let message = state
        .relay
        .latest(&session_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No signaling data found for this session".to_string()))?;

    Ok(Json(json!({ "success": true, "data": message })))
}

/// Registers the caller as an active participant, subject to admission.
pub async fn join(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<JoinRequest>,
) -> Result<Json<Value>, ApiError> {
    body.validate()?;
    let admitted = state.admit(auth.role, &auth.user_id, &body.session_id)?;

    let participant_id = body.participant_id.unwrap_or_else(|| auth.user_id.clone());
    if participant_id != auth.user_id && !admitted.privilege.is_moderator() {
        return Err(ApiError::Forbidden("Cannot join on behalf of another participant".to_string()));
    }

    let participants = state
        .relay
        .add_participant(&body.session_id, &participant_id)
        .await?;
    tracing::info!(session_id = %body.session_id, %participant_id, "Participant registered");

    Ok(Json(json!({
        "success": true,
        "message": "Joined session",
        "data": {
            "sessionId": body.session_id,
            "groupId": admitted.group.id,
            "participantId": participant_id,
            "participants": participants,
            "userRole": auth.role,
            "isModerator": admitted.privilege.is_moderator(),
        }
    })))
}

pub async fn leave(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<SessionQuery>,
) -> Result<Json<Value>, ApiError> {
    let session_id = required(query.session_id, "sessionId")?;
    let participant_id = required(query.participant_id, "participantId")?;

    if participant_id != auth.user_id {
        let session = state.sessions.find_by_id(&session_id, state.clock.now())?;
        let (_, privilege) = state.group_privilege(auth.role, &auth.user_id, &session.group_id)?;
        if !privilege.is_moderator() {
            return Err(ApiError::Forbidden("Cannot remove another participant".to_string()));
        }
    }

    let participants = state
        .relay
        .remove_participant(&session_id, &participant_id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Left session",
        "data": {
            "sessionId": session_id,
            "participantId": participant_id,
            "participants": participants,
        }
    })))
}

fn required(value: Option<String>, name: &str) -> Result<String, ApiError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("{name} is required")))
}
