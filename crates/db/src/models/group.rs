use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A reading group as known to the live-session service. The record is owned
/// by the main application; only the fields admission needs are mirrored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub name: String,
    /// Daily reading time in 24h "HH:MM". Stored verbatim, validated on use.
    pub reading_time: Option<String>,
    pub admin_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Group {
    pub fn new(
        id: String,
        name: String,
        reading_time: Option<String>,
        admin_id: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            reading_time,
            admin_id,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_admin(&self, user_id: &str) -> bool {
        self.admin_id == user_id
    }
}
