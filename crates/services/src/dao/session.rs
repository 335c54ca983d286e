use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;
use vrinda_db::models::{ReadingSession, SessionStatus};

use super::base::{DaoError, DaoResult};

/// Scheduled reading sessions. Status is advanced lazily on every read.
#[derive(Debug, Default)]
pub struct SessionDao {
    sessions: DashMap<String, ReadingSession>,
}

impl SessionDao {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(
        &self,
        group_id: String,
        scheduled_start: DateTime<Utc>,
        max_duration_minutes: u32,
        created_by: String,
        now: DateTime<Utc>,
    ) -> DaoResult<ReadingSession> {
        if max_duration_minutes == 0 {
            return Err(DaoError::Validation(
                "maxDurationMinutes must be positive".to_string(),
            ));
        }
        let mut session = ReadingSession {
            id: Uuid::new_v4().to_string(),
            group_id,
            scheduled_start,
            max_duration_minutes,
            status: SessionStatus::Active,
            created_by,
            created_at: now,
        };
        session.refresh_status(now);
        self.sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    pub fn find_by_id(&self, id: &str, now: DateTime<Utc>) -> DaoResult<ReadingSession> {
        let mut session = self.sessions.get_mut(id).ok_or(DaoError::NotFound)?;
        session.refresh_status(now);
        Ok(session.clone())
    }

    pub fn find_by_group(&self, group_id: &str, now: DateTime<Utc>) -> Vec<ReadingSession> {
        let mut sessions: Vec<ReadingSession> = self
            .sessions
            .iter_mut()
            .filter(|s| s.group_id == group_id)
            .map(|mut s| {
                s.refresh_status(now);
                s.clone()
            })
            .collect();
        sessions.sort_by_key(|s| s.scheduled_start);
        sessions
    }
}
