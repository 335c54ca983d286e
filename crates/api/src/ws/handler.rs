use axum::{
    extract::{Query, State, WebSocketUpgrade, ws::{Message, WebSocket}},
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;
use vrinda_db::models::{Participant, SignalKind, SignalingMessage};
use vrinda_services::auth::Claims;
use vrinda_services::live::{Actor, HubError, SessionEvent};

use super::dispatcher::send_to_connection;
use super::storage::JoinedSession;
use crate::{error::ApiError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: String,
}

pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let claims = state.auth.verify_access_token(&params.token)?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, claims)))
}

/// A failed client request, reported back as an `error` event.
#[derive(Debug)]
struct ClientError {
    code: &'static str,
    message: String,
}

impl ClientError {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn invalid(err: serde_json::Error) -> Self {
        Self::new("invalid_input", err.to_string())
    }
}

impl From<HubError> for ClientError {
    fn from(err: HubError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

impl From<ApiError> for ClientError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::AdmissionDenied(decision) => Self::new(decision.reason.as_str(), decision.message),
            other => Self::new(other.code(), other.message().to_string()),
        }
    }
}

struct Client<'a> {
    claims: &'a Claims,
    connection_id: &'a str,
}

impl Client<'_> {
    fn user_id(&self) -> &str {
        &self.claims.sub
    }
}

async fn handle_socket(socket: WebSocket, state: AppState, claims: Claims) {
    let connection_id = Uuid::new_v4().to_string();
    let user_id = claims.sub.clone();
    info!(%user_id, %connection_id, "WebSocket connected");

    let (sender, mut receiver) = socket.split();
    let sender = Arc::new(Mutex::new(sender));

    state.ws_storage.add(&user_id, connection_id.clone(), sender.clone());

    let connected = serde_json::json!({
        "type": "connected",
        "data": { "userId": user_id, "connectionId": connection_id },
    });
    send_to_connection(&state.ws_storage, &connection_id, &connected).await;

    let client = Client {
        claims: &claims,
        connection_id: &connection_id,
    };

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                handle_client_message(&state, &client, &text).await;
            }
            Ok(Message::Ping(data)) => {
                let mut guard = sender.lock().await;
                let _ = guard.send(Message::Pong(data)).await;
            }
            Ok(Message::Close(_)) => {
                break;
            }
            Err(e) => {
                warn!(%user_id, %connection_id, %e, "WebSocket error");
                break;
            }
            _ => {}
        }
    }

    // Cleanup
    if let Some(joined) = state.ws_storage.remove(&user_id, &connection_id)
        && !state.ws_storage.user_in_session(&user_id, &joined.session_id)
        && let Err(e) = state.hub.leave(&joined.session_id, &user_id).await
    {
        warn!(%user_id, session_id = %joined.session_id, %e, "Leave on disconnect failed");
    }

    info!(%user_id, %connection_id, "WebSocket disconnected");
}

async fn handle_client_message(state: &AppState, client: &Client<'_>, text: &str) {
    let parsed: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            send_error(state, client, ClientError::invalid(e)).await;
            return;
        }
    };

    let msg_type = parsed.get("type").and_then(|t| t.as_str()).unwrap_or("");
    let data = parsed.get("data").cloned().unwrap_or(Value::Null);

    debug!(user_id = %client.user_id(), connection_id = %client.connection_id, msg_type, "WS message received");

    let result = match msg_type {
        "ping" => {
            let pong = serde_json::json!({ "type": "pong" });
            send_to_connection(&state.ws_storage, client.connection_id, &pong).await;
            Ok(())
        }
        "join-session" => join_session(state, client, data).await,
        "leave-session" => leave_session(state, client).await,
        "webrtc-offer" => relay_signal(state, client, SignalKind::Offer, data).await,
        "webrtc-answer" => relay_signal(state, client, SignalKind::Answer, data).await,
        "webrtc-ice-candidate" => relay_signal(state, client, SignalKind::IceCandidate, data).await,
        other => session_command(state, client, other, data).await,
    };

    if let Err(err) = result {
        debug!(user_id = %client.user_id(), code = err.code, message = %err.message, "WS request rejected");
        send_error(state, client, err).await;
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JoinPayload {
    session_id: String,
    display_name: Option<String>,
}

async fn join_session(state: &AppState, client: &Client<'_>, data: Value) -> Result<(), ClientError> {
    let payload: JoinPayload = serde_json::from_value(data).map_err(ClientError::invalid)?;

    if let Some(current) = state.ws_storage.joined(client.connection_id)
        && current.session_id != payload.session_id
    {
        leave_session(state, client).await?;
    }

    let admitted = state.admit(client.claims.role, client.user_id(), &payload.session_id)?;

    // Registered before joining so the pump delivers `session-joined` here.
    state.ws_storage.set_joined(
        client.connection_id,
        JoinedSession {
            session_id: payload.session_id.clone(),
            moderator: admitted.privilege.is_moderator(),
        },
    );

    let display_name = payload
        .display_name
        .or_else(|| client.claims.name.clone())
        .unwrap_or_else(|| client.user_id().to_string());
    let participant = Participant::new(client.user_id(), display_name);

    if let Err(err) = state.hub.join(&payload.session_id, participant).await {
        state.ws_storage.clear_joined(client.connection_id);
        return Err(err.into());
    }
    Ok(())
}

async fn leave_session(state: &AppState, client: &Client<'_>) -> Result<(), ClientError> {
    let Some(joined) = state.ws_storage.clear_joined(client.connection_id) else {
        return Ok(());
    };
    if !state.ws_storage.user_in_session(client.user_id(), &joined.session_id) {
        state.hub.leave(&joined.session_id, client.user_id()).await?;
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct SignalPayload {
    to: Option<String>,
    #[serde(default)]
    data: Value,
}

async fn relay_signal(
    state: &AppState,
    client: &Client<'_>,
    kind: SignalKind,
    data: Value,
) -> Result<(), ClientError> {
    let joined = require_joined(state, client)?;
    let payload: SignalPayload = serde_json::from_value(data).map_err(ClientError::invalid)?;

    let message = SignalingMessage {
        kind,
        session_id: joined.session_id,
        from: client.user_id().to_string(),
        to: payload.to,
        data: payload.data,
        timestamp: state.clock.now().timestamp_millis(),
    };
    state.hub.relay_signal(message).await?;
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TargetPayload {
    participant_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MediaPayload {
    is_muted: Option<bool>,
    is_video_on: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct MinutesPayload {
    minutes: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct VersePayload {
    verse: Value,
}

/// Commands that act on the joined session.
async fn session_command(
    state: &AppState,
    client: &Client<'_>,
    msg_type: &str,
    data: Value,
) -> Result<(), ClientError> {
    let joined = require_joined(state, client)?;
    let session_id = joined.session_id.as_str();
    let actor = Actor::new(client.user_id(), joined.moderator);
    let hub = &state.hub;

    match msg_type {
        "update-media" => {
            let media: MediaPayload = payload_or_default(data)?;
            hub.update_media(session_id, client.user_id(), media.is_muted, media.is_video_on)?;
        }
        "add-to-queue" => {
            let target: TargetPayload = payload_or_default(data)?;
            let target = target.participant_id.unwrap_or_else(|| actor.participant_id.clone());
            hub.add_to_queue(session_id, &actor, &target)?;
        }
        "remove-from-queue" => {
            let target: TargetPayload = payload_or_default(data)?;
            let target = target.participant_id.unwrap_or_else(|| actor.participant_id.clone());
            hub.remove_from_queue(session_id, &actor, &target)?;
        }
        "clear-queue" => {
            hub.clear_queue(session_id, &actor)?;
        }
        "start-reading" => {
            hub.start_reading(session_id, &actor)?;
        }
        "finish-reading" => {
            hub.finish_reading(session_id, &actor)?;
        }
        "skip-reading" => {
            hub.skip_reading(session_id, &actor)?;
        }
        "change-verse" => {
            let payload: VersePayload = serde_json::from_value(data).map_err(ClientError::invalid)?;
            hub.change_verse(session_id, &actor, payload.verse)?;
        }
        "start-timer" => {
            let payload: MinutesPayload = payload_or_default(data)?;
            hub.start_timer(session_id, &actor, payload.minutes).await?;
        }
        "pause-timer" => {
            hub.pause_timer(session_id, &actor).await?;
        }
        "resume-timer" => {
            hub.resume_timer(session_id, &actor).await?;
        }
        "extend-timer" => {
            let payload: MinutesPayload = payload_or_default(data)?;
            let minutes = payload
                .minutes
                .ok_or_else(|| ClientError::new("invalid_input", "minutes is required"))?;
            hub.extend_timer(session_id, &actor, minutes).await?;
        }
        "reset-timer" => {
            hub.reset_timer(session_id, &actor).await?;
        }
        "end-session" => {
            hub.end_session(session_id, &actor).await?;
        }
        other => {
            return Err(ClientError::new(
                "invalid_input",
                format!("Unknown message type {other:?}"),
            ));
        }
    }
    Ok(())
}

fn require_joined(state: &AppState, client: &Client<'_>) -> Result<JoinedSession, ClientError> {
    state
        .ws_storage
        .joined(client.connection_id)
        .ok_or_else(|| ClientError::new("not_joined", "Join a session first"))
}

fn payload_or_default<T: Default + serde::de::DeserializeOwned>(data: Value) -> Result<T, ClientError> {
    if data.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(data).map_err(ClientError::invalid)
}

async fn send_error(state: &AppState, client: &Client<'_>, err: ClientError) {
    let event = SessionEvent::Error {
        code: err.code.to_string(),
        message: err.message,
    };
    send_to_connection(&state.ws_storage, client.connection_id, &event).await;
}
