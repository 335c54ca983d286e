use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

/// A WebRTC negotiation payload relayed between peers of one session.
/// `data` is opaque to the server (SDP or ICE candidate JSON).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalingMessage {
    #[serde(rename = "type")]
    pub kind: SignalKind,
    pub session_id: String,
    pub from: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
    /// Milliseconds since the Unix epoch, stamped by the server.
    pub timestamp: i64,
}

impl SignalingMessage {
    /// Whether a connection owned by `participant_id` should receive this message.
    pub fn is_addressed_to(&self, participant_id: &str) -> bool {
        match &self.to {
            Some(target) => target == participant_id,
            None => self.from != participant_id,
        }
    }
}
