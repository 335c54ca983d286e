use std::sync::Arc;

use axum::extract::ws::Message;
use futures::SinkExt;
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use vrinda_services::live::{HubEvent, SessionEvent};

use super::storage::WsStorage;

/// Sends a JSON message to a specific connection by connection_id.
pub async fn send_to_connection<T: Serialize>(
    ws_storage: &WsStorage,
    connection_id: &str,
    message: &T,
) {
    let Some(sender) = ws_storage.get_sender_by_connection(connection_id) else {
        return;
    };
    let text = match serde_json::to_string(message) {
        Ok(text) => text,
        Err(e) => {
            warn!(%connection_id, %e, "Failed to serialize WS message");
            return;
        }
    };
    let mut guard = sender.lock().await;
    if let Err(e) = guard.send(Message::text(text)).await {
        warn!(%connection_id, %e, "Failed to send WS message to connection");
    }
}

/// Delivers a hub event to every connection of its audience. Connections are
/// detached from an ended session before they are told about it.
pub async fn deliver(ws_storage: &WsStorage, event: &HubEvent) {
    let recipients = ws_storage.session_senders(&event.session_id, |user_id| {
        event.audience.includes(user_id)
    });
    if matches!(event.event, SessionEvent::SessionEnded { .. }) {
        ws_storage.release_session(&event.session_id);
    }
    if recipients.is_empty() {
        return;
    }

    let text = match serde_json::to_string(&event.event) {
        Ok(text) => text,
        Err(e) => {
            warn!(session_id = %event.session_id, %e, "Failed to serialize hub event");
            return;
        }
    };

    for (user_id, sender) in recipients {
        let mut guard = sender.lock().await;
        if let Err(e) = guard.send(Message::text(text.clone())).await {
            warn!(%user_id, %e, "Failed to send WS message");
        } else {
            debug!(%user_id, "WS message sent");
        }
    }
}

/// Forwards hub events to sockets until the hub goes away.
pub fn spawn_event_pump(
    mut events: broadcast::Receiver<HubEvent>,
    ws_storage: Arc<WsStorage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => deliver(&ws_storage, &event).await,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "WS event pump lagging, events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
