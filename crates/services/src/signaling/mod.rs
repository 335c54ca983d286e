//! Signaling relay storage.
//!
//! The relay keeps only the latest negotiation payload per session
//! (`signaling:<id>`), the list of active participants (`participants:<id>`)
//! and the live timer snapshot (`timer:<id>`), each with a TTL. Writes are
//! last-write-wins; concurrent writers to one session may overwrite each other.

pub mod memory;
pub mod redis_store;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::warn;
use vrinda_db::models::SignalingMessage;

use crate::timer::TimerSnapshot;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Signaling store unavailable: {0}")]
    Unavailable(String),
    #[error("Corrupt value under {key}: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Minimal key-value contract the relay needs from a backend.
#[async_trait]
pub trait SignalingStore: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError>;
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

pub fn signaling_key(session_id: &str) -> String {
    format!("signaling:{session_id}")
}

pub fn participants_key(session_id: &str) -> String {
    format!("participants:{session_id}")
}

pub fn timer_key(session_id: &str) -> String {
    format!("timer:{session_id}")
}

/// Typed operations over a [`SignalingStore`].
#[derive(Clone)]
pub struct SignalingRelay {
    store: Arc<dyn SignalingStore>,
    ttl: Duration,
}

impl SignalingRelay {
    pub fn new(store: Arc<dyn SignalingStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Replaces the session's stored payload.
    pub async fn store(&self, message: &SignalingMessage) -> Result<(), StoreError> {
        self.put_json(&signaling_key(&message.session_id), message).await
    }

    pub async fn latest(&self, session_id: &str) -> Result<Option<SignalingMessage>, StoreError> {
        self.get_json(&signaling_key(session_id)).await
    }

    pub async fn delete(&self, session_id: &str) -> Result<(), StoreError> {
        let key = signaling_key(session_id);
        self.store.delete(&key).await.inspect_err(|e| log_failure(&key, e))
    }

    pub async fn active_participants(&self, session_id: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .get_json(&participants_key(session_id))
            .await?
            .unwrap_or_default())
    }

    /// Adds a participant if absent and returns the resulting list.
    pub async fn add_participant(
        &self,
        session_id: &str,
        participant_id: &str,
    ) -> Result<Vec<String>, StoreError> {
        let mut participants = self.active_participants(session_id).await?;
        if !participants.iter().any(|p| p == participant_id) {
            participants.push(participant_id.to_string());
            self.put_json(&participants_key(session_id), &participants).await?;
        }
        Ok(participants)
    }

    /// Removes a participant if present and returns the remaining list.
    pub async fn remove_participant(
        &self,
        session_id: &str,
        participant_id: &str,
    ) -> Result<Vec<String>, StoreError> {
        let mut participants = self.active_participants(session_id).await?;
        let before = participants.len();
        participants.retain(|p| p != participant_id);
        if participants.len() != before {
            self.put_json(&participants_key(session_id), &participants).await?;
        }
        Ok(participants)
    }

    pub async fn clear_participants(&self, session_id: &str) -> Result<(), StoreError> {
        let key = participants_key(session_id);
        self.store.delete(&key).await.inspect_err(|e| log_failure(&key, e))
    }

    pub async fn save_timer(&self, session_id: &str, timer: &TimerSnapshot) -> Result<(), StoreError> {
        self.put_json(&timer_key(session_id), timer).await
    }

    pub async fn timer(&self, session_id: &str) -> Result<Option<TimerSnapshot>, StoreError> {
        self.get_json(&timer_key(session_id)).await
    }

    pub async fn clear_timer(&self, session_id: &str) -> Result<(), StoreError> {
        let key = timer_key(session_id);
        self.store.delete(&key).await.inspect_err(|e| log_failure(&key, e))
    }

    async fn put_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value).map_err(|source| StoreError::Corrupt {
            key: key.to_string(),
            source,
        })?;
        self.store
            .set_ex(key, raw, self.ttl)
            .await
            .inspect_err(|e| log_failure(key, e))
    }

    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let Some(raw) = self.store.get(key).await.inspect_err(|e| log_failure(key, e))? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StoreError::Corrupt {
                key: key.to_string(),
                source,
            })
    }
}

fn log_failure(key: &str, err: &StoreError) {
    warn!(%key, %err, "Signaling store operation failed");
}
