use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use vrinda_db::models::ReadingSession;
use vrinda_services::live::SessionSnapshot;

use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    #[serde(flatten)]
    pub session: ReadingSession,
    /// Present while anyone is connected.
    pub live: Option<SessionSnapshot>,
}

pub async fn get(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(session_id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state.sessions.find_by_id(&session_id, state.clock.now())?;
    let live = state.hub.snapshot(&session_id);
    Ok(Json(SessionResponse { session, live }))
}
