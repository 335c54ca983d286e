use std::sync::Arc;
use std::time::Duration;

use vrinda_config::Settings;
use vrinda_db::models::{Group, ReadingSession, SessionStatus, UserRole};
use vrinda_services::admission::{AdmissionPolicy, Privilege};
use vrinda_services::auth::AuthService;
use vrinda_services::clock::Clock;
use vrinda_services::dao::{GroupDao, SessionDao};
use vrinda_services::live::SessionHub;
use vrinda_services::signaling::{SignalingRelay, SignalingStore};

use crate::error::ApiError;
use crate::ws::{dispatcher, storage::WsStorage};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub auth: Arc<AuthService>,
    pub clock: Arc<dyn Clock>,
    pub admission: AdmissionPolicy,
    pub groups: Arc<GroupDao>,
    pub sessions: Arc<SessionDao>,
    pub relay: SignalingRelay,
    pub hub: Arc<SessionHub>,
    pub ws_storage: Arc<WsStorage>,
}

/// Outcome of a successful admission check for a session.
#[derive(Debug, Clone)]
pub struct Admitted {
    pub session: ReadingSession,
    pub group: Group,
    pub privilege: Privilege,
}

impl AppState {
    /// Wires services together and starts the hub-to-WebSocket event pump.
    /// Must be called inside a Tokio runtime.
    pub fn new(settings: Settings, store: Arc<dyn SignalingStore>, clock: Arc<dyn Clock>) -> Self {
        let relay = SignalingRelay::new(store, Duration::from_secs(settings.signaling.ttl_secs));
        let (hub, events) = SessionHub::new(clock.clone(), relay.clone(), settings.session.clone());
        let ws_storage = Arc::new(WsStorage::new());
        dispatcher::spawn_event_pump(events, ws_storage.clone());

        Self {
            auth: Arc::new(AuthService::new(&settings.jwt.secret)),
            admission: AdmissionPolicy::from_settings(&settings.admission),
            groups: Arc::new(GroupDao::from_seeds(&settings.directory.groups, clock.now())),
            sessions: Arc::new(SessionDao::new()),
            settings: Arc::new(settings),
            clock,
            relay,
            hub,
            ws_storage,
        }
    }

    pub fn group_privilege(&self, role: UserRole, user_id: &str, group_id: &str) -> Result<(Group, Privilege), ApiError> {
        let group = self.groups.find_by_id(group_id)?;
        let privilege = Privilege::of(role, user_id, &group);
        Ok((group, privilege))
    }

    /// Resolves a session and applies the reading-time rules for the user.
    pub fn admit(&self, role: UserRole, user_id: &str, session_id: &str) -> Result<Admitted, ApiError> {
        let now = self.clock.now();
        let session = self.sessions.find_by_id(session_id, now)?;
        if session.status == SessionStatus::Completed {
            return Err(ApiError::Conflict("Session has already completed".to_string()));
        }
        let (group, privilege) = self.group_privilege(role, user_id, &session.group_id)?;

        let decision = self.admission.check(privilege, &group, now);
        if !decision.can_join {
            return Err(ApiError::AdmissionDenied(decision));
        }
        Ok(Admitted {
            session,
            group,
            privilege,
        })
    }
}
