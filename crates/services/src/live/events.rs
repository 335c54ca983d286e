use serde::Serialize;
use vrinda_db::models::{Participant, SignalingMessage};

use crate::queue::ReadingQueue;
use crate::timer::TimerSnapshot;

/// Who a hub event is delivered to within its session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    /// Every participant of the session, optionally minus one.
    Session { except: Option<String> },
    Participant(String),
}

impl Audience {
    pub fn everyone() -> Self {
        Audience::Session { except: None }
    }

    pub fn others_than(participant_id: &str) -> Self {
        Audience::Session {
            except: Some(participant_id.to_string()),
        }
    }

    pub fn includes(&self, participant_id: &str) -> bool {
        match self {
            Audience::Session { except } => except.as_deref() != Some(participant_id),
            Audience::Participant(target) => target == participant_id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HubEvent {
    pub session_id: String,
    pub audience: Audience,
    pub event: SessionEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    TimeUp,
    EndedByModerator,
}

/// State handed to a participant when they join.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: String,
    pub participants: Vec<Participant>,
    pub reading_queue: ReadingQueue,
    pub timer: TimerSnapshot,
    pub current_verse: Option<serde_json::Value>,
}

/// Server-to-client messages, serialized as `{"type": ..., "data": {...}}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
#[serde(rename_all_fields = "camelCase")]
pub enum SessionEvent {
    SessionJoined(SessionSnapshot),
    ParticipantJoined {
        participant: Participant,
    },
    ParticipantLeft {
        participant_id: String,
    },
    ParticipantUpdated {
        participant: Participant,
    },
    QueueUpdated {
        reading_queue: ReadingQueue,
    },
    ReadingStarted {
        participant_id: String,
        reading_queue: ReadingQueue,
    },
    ReadingFinished {
        participant_id: String,
        skipped: bool,
        reading_queue: ReadingQueue,
    },
    VerseChanged {
        verse: serde_json::Value,
        changed_by: String,
    },
    SessionTimerUpdate(TimerSnapshot),
    SessionEnded {
        reason: EndReason,
    },
    WebrtcSignal(SignalingMessage),
    Error {
        code: String,
        message: String,
    },
}
