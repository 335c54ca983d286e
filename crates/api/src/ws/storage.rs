use axum::extract::ws::{Message, WebSocket};
use dashmap::DashMap;
use futures::stream::SplitSink;
use std::sync::Arc;
use tokio::sync::Mutex;

pub type WsSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// The live session a connection has joined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedSession {
    pub session_id: String,
    pub moderator: bool,
}

/// Tracks open WebSocket connections and the session each one has joined.
/// A user may hold several connections (tabs/devices).
pub struct WsStorage {
    /// user_id -> connection ids
    connections: DashMap<String, Vec<String>>,
    /// connection_id -> (user_id, sender)
    connection_map: DashMap<String, (String, WsSender)>,
    /// connection_id -> joined session
    joined: DashMap<String, JoinedSession>,
}

impl WsStorage {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            connection_map: DashMap::new(),
            joined: DashMap::new(),
        }
    }

    pub fn add(&self, user_id: &str, connection_id: String, sender: WsSender) {
        self.connections
            .entry(user_id.to_string())
            .or_default()
            .push(connection_id.clone());
        self.connection_map
            .insert(connection_id, (user_id.to_string(), sender));
    }

    /// Forgets a connection. Returns the session it had joined, if any.
    pub fn remove(&self, user_id: &str, connection_id: &str) -> Option<JoinedSession> {
        if let Some(mut ids) = self.connections.get_mut(user_id) {
            ids.retain(|id| id != connection_id);
            if ids.is_empty() {
                drop(ids);
                self.connections.remove(user_id);
            }
        }
        self.connection_map.remove(connection_id);
        self.joined.remove(connection_id).map(|(_, joined)| joined)
    }

    pub fn get_sender_by_connection(&self, connection_id: &str) -> Option<WsSender> {
        self.connection_map
            .get(connection_id)
            .map(|entry| entry.value().1.clone())
    }

    pub fn set_joined(&self, connection_id: &str, joined: JoinedSession) {
        self.joined.insert(connection_id.to_string(), joined);
    }

    pub fn joined(&self, connection_id: &str) -> Option<JoinedSession> {
        self.joined.get(connection_id).map(|j| j.value().clone())
    }

    pub fn clear_joined(&self, connection_id: &str) -> Option<JoinedSession> {
        self.joined.remove(connection_id).map(|(_, joined)| joined)
    }

    /// Detaches every connection from an ended session.
    pub fn release_session(&self, session_id: &str) {
        self.joined.retain(|_, j| j.session_id != session_id);
    }

    /// Whether any of the user's connections is still in the session.
    pub fn user_in_session(&self, user_id: &str, session_id: &str) -> bool {
        self.connections
            .get(user_id)
            .map(|ids| {
                ids.iter().any(|id| {
                    self.joined
                        .get(id)
                        .is_some_and(|j| j.session_id == session_id)
                })
            })
            .unwrap_or(false)
    }

    /// Senders of connections joined to `session_id` whose user passes `filter`.
    pub fn session_senders(
        &self,
        session_id: &str,
        filter: impl Fn(&str) -> bool,
    ) -> Vec<(String, WsSender)> {
        let connection_ids: Vec<String> = self
            .joined
            .iter()
            .filter(|j| j.session_id == session_id)
            .map(|j| j.key().clone())
            .collect();

        connection_ids
            .into_iter()
            .filter_map(|id| {
                let entry = self.connection_map.get(&id)?;
                let (user_id, sender) = entry.value();
                filter(user_id).then(|| (user_id.clone(), sender.clone()))
            })
            .collect()
    }

    pub fn connection_count(&self) -> usize {
        self.connection_map.len()
    }
}

impl Default for WsStorage {
    fn default() -> Self {
        Self::new()
    }
}
