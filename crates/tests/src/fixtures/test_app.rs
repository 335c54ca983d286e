use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use vrinda_api::{build_router, state::AppState};
use vrinda_config::{GroupSeed, Settings};
use vrinda_db::models::UserRole;
use vrinda_services::clock::ManualClock;
use vrinda_services::signaling::{MemoryStore, SignalingStore, StoreError};

pub const GROUP_ID: &str = "gita-circle";
pub const GROUP_ADMIN: &str = "admin-1";
pub const SUPER_ADMIN: &str = "root-1";
pub const MEMBER: &str = "member-1";
pub const OTHER_MEMBER: &str = "member-2";

/// Reading time of the seeded group, in UTC.
pub const READING_TIME: &str = "19:00";

pub struct TestApp {
    pub addr: String,
    pub client: reqwest::Client,
    pub clock: Arc<ManualClock>,
    pub state: AppState,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_store(Arc::new(MemoryStore::new())).await
    }

    pub async fn spawn_with_store(store: Arc<dyn SignalingStore>) -> Self {
        let mut settings = Settings::default();
        settings.admission.utc_offset_minutes = Some(0);
        settings.session.tick_interval_ms = 20;
        settings.directory.groups = vec![GroupSeed {
            id: GROUP_ID.to_string(),
            name: "Gita Circle".to_string(),
            reading_time: Some(READING_TIME.to_string()),
            admin_id: GROUP_ADMIN.to_string(),
        }];

        let clock = Arc::new(ManualClock::new(at(19, 0)));
        let state = AppState::new(settings, store, clock.clone());
        let app = build_router(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            client: reqwest::Client::new(),
            clock,
            state,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self, token: &str) -> String {
        format!("ws://{}/ws?token={}", self.addr, token)
    }

    pub fn token(&self, user_id: &str, role: UserRole) -> String {
        self.state
            .auth
            .issue_access_token(user_id, role, Some(user_id.to_uppercase().as_str()), 3600)
            .unwrap()
    }

    pub fn admin_token(&self) -> String {
        self.token(GROUP_ADMIN, UserRole::Admin)
    }

    pub fn super_admin_token(&self) -> String {
        self.token(SUPER_ADMIN, UserRole::SuperAdmin)
    }

    pub fn member_token(&self, user_id: &str) -> String {
        self.token(user_id, UserRole::User)
    }

    /// Moves the wall clock to `hh:mm` UTC on the test day.
    pub fn set_time(&self, hour: u32, minute: u32) {
        self.clock.set_wall(at(hour, minute));
    }

    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }

    pub fn auth_get(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client.get(self.url(path)).bearer_auth(token)
    }

    pub fn auth_post(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client.post(self.url(path)).bearer_auth(token)
    }

    pub fn auth_put(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client.put(self.url(path)).bearer_auth(token)
    }

    pub fn auth_delete(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client.delete(self.url(path)).bearer_auth(token)
    }

    /// Schedules a 60 minute session for the seeded group starting now.
    pub async fn schedule_session(&self) -> String {
        let resp = self
            .auth_post(&format!("/api/group/{GROUP_ID}/session"), &self.admin_token())
            .json(&serde_json::json!({ "maxDurationMinutes": 60 }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        let session: serde_json::Value = resp.json().await.unwrap();
        session["id"].as_str().unwrap().to_string()
    }
}

pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 10, hour, minute, 0).unwrap()
}

/// A store whose backend is down.
pub struct UnavailableStore;

#[async_trait]
impl SignalingStore for UnavailableStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn set_ex(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn delete(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}
