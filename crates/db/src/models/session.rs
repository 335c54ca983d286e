use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingSession {
    pub id: String,
    pub group_id: String,
    pub scheduled_start: DateTime<Utc>,
    pub max_duration_minutes: u32,
    pub status: SessionStatus,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
}

impl ReadingSession {
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.scheduled_start + Duration::minutes(i64::from(self.max_duration_minutes))
    }

    pub fn status_at(&self, now: DateTime<Utc>) -> SessionStatus {
        if self.status == SessionStatus::Completed || now >= self.ends_at() {
            SessionStatus::Completed
        } else {
            SessionStatus::Active
        }
    }

    /// Moves the stored status forward; a completed session never reopens.
    pub fn refresh_status(&mut self, now: DateTime<Utc>) -> SessionStatus {
        self.status = self.status_at(now);
        self.status
    }
}
