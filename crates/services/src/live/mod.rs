//! Live reading sessions: who is present, whose turn it is, the countdown and
//! the verse on screen. Every state change is published as a [`HubEvent`] on a
//! broadcast channel; the WebSocket layer fans them out to connections.
//!
//! Per-session state sits behind a `parking_lot::Mutex` that is never held
//! across an `.await`. Store writes happen after the lock is released.

pub mod events;

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::AbortHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};
use vrinda_config::SessionSettings;
use vrinda_db::models::{Participant, SignalingMessage};

use crate::clock::Clock;
use crate::queue::{QueueError, ReadingQueue};
use crate::signaling::{SignalingRelay, StoreError};
use crate::timer::{SessionTimer, Tick, TimerError, TimerPhase, TimerSnapshot};

pub use events::{Audience, EndReason, HubEvent, SessionEvent, SessionSnapshot};

#[derive(Debug, Error)]
pub enum HubError {
    #[error("Session {0} is not live")]
    NotLive(String),
    #[error("{0} has not joined the session")]
    NotJoined(String),
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("{0}")]
    InvalidInput(String),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Timer(#[from] TimerError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl HubError {
    /// Machine-readable code sent to clients in `error` events.
    pub fn code(&self) -> &'static str {
        match self {
            HubError::NotLive(_) => "not_found",
            HubError::NotJoined(_) => "not_joined",
            HubError::Forbidden(_) => "forbidden",
            HubError::InvalidInput(_) | HubError::Timer(TimerError::ZeroDuration) => "invalid_input",
            HubError::Queue(e) => e.code(),
            HubError::Timer(_) => "invalid_transition",
            HubError::Store(_) => "store_unavailable",
        }
    }
}

/// The participant performing an operation.
#[derive(Debug, Clone)]
pub struct Actor {
    pub participant_id: String,
    /// Super admin or admin of the session's group.
    pub moderator: bool,
}

impl Actor {
    pub fn new(participant_id: impl Into<String>, moderator: bool) -> Self {
        Self {
            participant_id: participant_id.into(),
            moderator,
        }
    }

    fn require_moderator(&self, what: &'static str) -> Result<(), HubError> {
        if self.moderator {
            Ok(())
        } else {
            Err(HubError::Forbidden(what))
        }
    }
}

struct LiveSession {
    participants: Vec<Participant>,
    queue: ReadingQueue,
    timer: SessionTimer,
    current_verse: Option<serde_json::Value>,
    ticker: Option<AbortHandle>,
    /// Set once the session is torn down; a closed session is never reused.
    closed: bool,
}

impl LiveSession {
    fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            participants: Vec::new(),
            queue: ReadingQueue::new(),
            timer: SessionTimer::new(clock),
            current_verse: None,
            ticker: None,
            closed: false,
        }
    }

    fn is_joined(&self, participant_id: &str) -> bool {
        self.participants.iter().any(|p| p.id == participant_id)
    }

    fn require_joined(&self, participant_id: &str) -> Result<(), HubError> {
        if self.is_joined(participant_id) {
            Ok(())
        } else {
            Err(HubError::NotJoined(participant_id.to_string()))
        }
    }

    fn stop_ticker(&mut self) {
        if let Some(handle) = self.ticker.take() {
            handle.abort();
        }
    }

    fn snapshot(&self, session_id: &str) -> SessionSnapshot {
        SessionSnapshot {
            session_id: session_id.to_string(),
            participants: self.participants.clone(),
            reading_queue: self.queue.clone(),
            timer: self.timer.snapshot(),
            current_verse: self.current_verse.clone(),
        }
    }
}

type SharedSession = Arc<Mutex<LiveSession>>;

pub struct SessionHub {
    clock: Arc<dyn Clock>,
    relay: SignalingRelay,
    settings: SessionSettings,
    sessions: DashMap<String, SharedSession>,
    events: broadcast::Sender<HubEvent>,
}

impl SessionHub {
    pub fn new(
        clock: Arc<dyn Clock>,
        relay: SignalingRelay,
        settings: SessionSettings,
    ) -> (Arc<Self>, broadcast::Receiver<HubEvent>) {
        let (events, rx) = broadcast::channel(settings.event_buffer.max(1));
        let hub = Arc::new(Self {
            clock,
            relay,
            settings,
            sessions: DashMap::new(),
            events,
        });
        (hub, rx)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HubEvent> {
        self.events.subscribe()
    }

    pub fn relay(&self) -> &SignalingRelay {
        &self.relay
    }

    pub fn is_live(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    pub fn live_session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_joined(&self, session_id: &str, participant_id: &str) -> bool {
        self.live(session_id)
            .map(|live| live.lock().is_joined(participant_id))
            .unwrap_or(false)
    }

    pub fn snapshot(&self, session_id: &str) -> Option<SessionSnapshot> {
        let live = self.live(session_id).ok()?;
        let session = live.lock();
        (!session.closed).then(|| session.snapshot(session_id))
    }

    /// Adds a participant, creating the live session on first join. The
    /// joiner receives `session-joined`; everyone else `participant-joined`.
    pub async fn join(
        &self,
        session_id: &str,
        mut participant: Participant,
    ) -> Result<SessionSnapshot, HubError> {
        self.relay.add_participant(session_id, &participant.id).await?;
        participant.joined_at = self.clock.now();

        let (snapshot, newly_joined) = loop {
            let live = self
                .sessions
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(LiveSession::new(self.clock.clone()))))
                .value()
                .clone();
            let mut session = live.lock();
            if session.closed {
                drop(session);
                self.sessions.remove_if(session_id, |_, s| Arc::ptr_eq(s, &live));
                continue;
            }
            let newly_joined = !session.is_joined(&participant.id);
            if newly_joined {
                session.participants.push(participant.clone());
            }
            break (session.snapshot(session_id), newly_joined);
        };

        if newly_joined {
            info!(%session_id, participant_id = %participant.id, "Participant joined");
            self.emit(
                session_id,
                Audience::others_than(&participant.id),
                SessionEvent::ParticipantJoined {
                    participant: participant.clone(),
                },
            );
        }
        self.emit(
            session_id,
            Audience::Participant(participant.id.clone()),
            SessionEvent::SessionJoined(snapshot.clone()),
        );
        Ok(snapshot)
    }

    /// Removes a participant (explicit leave or disconnect). Leaving a session
    /// one is not part of is a no-op. The last one out tears the session down.
    pub async fn leave(&self, session_id: &str, participant_id: &str) -> Result<(), HubError> {
        let Ok(live) = self.live(session_id) else {
            self.relay.remove_participant(session_id, participant_id).await?;
            return Ok(());
        };

        let (left, queue, emptied) = {
            let mut session = live.lock();
            let before = session.participants.len();
            session.participants.retain(|p| p.id != participant_id);
            let left = session.participants.len() != before;
            let queue_changed = left && session.queue.participant_left(participant_id);
            let emptied = left && session.participants.is_empty() && !session.closed;
            if emptied {
                session.closed = true;
                session.stop_ticker();
            }
            (left, queue_changed.then(|| session.queue.clone()), emptied)
        };

        if emptied {
            self.sessions.remove_if(session_id, |_, s| Arc::ptr_eq(s, &live));
            info!(%session_id, "Last participant left, live session closed");
        }
        if left {
            info!(%session_id, %participant_id, "Participant left");
            self.emit(
                session_id,
                Audience::others_than(participant_id),
                SessionEvent::ParticipantLeft {
                    participant_id: participant_id.to_string(),
                },
            );
            if let Some(reading_queue) = queue {
                self.emit(
                    session_id,
                    Audience::everyone(),
                    SessionEvent::QueueUpdated { reading_queue },
                );
            }
        }

        if emptied {
            self.relay.clear_participants(session_id).await?;
            self.relay.clear_timer(session_id).await?;
            self.relay.delete(session_id).await?;
        } else {
            self.relay.remove_participant(session_id, participant_id).await?;
        }
        Ok(())
    }

    pub fn update_media(
        &self,
        session_id: &str,
        participant_id: &str,
        is_muted: Option<bool>,
        is_video_on: Option<bool>,
    ) -> Result<Participant, HubError> {
        let participant = self.with_session(session_id, |session| {
            let p = session
                .participants
                .iter_mut()
                .find(|p| p.id == participant_id)
                .ok_or_else(|| HubError::NotJoined(participant_id.to_string()))?;
            if let Some(muted) = is_muted {
                p.is_muted = muted;
            }
            if let Some(video) = is_video_on {
                p.is_video_on = video;
            }
            Ok(p.clone())
        })?;

        self.emit(
            session_id,
            Audience::everyone(),
            SessionEvent::ParticipantUpdated {
                participant: participant.clone(),
            },
        );
        Ok(participant)
    }

    /// Queues `participant_id` for a turn. Participants may queue themselves;
    /// moderators may queue anyone present.
    pub fn add_to_queue(
        &self,
        session_id: &str,
        actor: &Actor,
        participant_id: &str,
    ) -> Result<ReadingQueue, HubError> {
        if participant_id != actor.participant_id {
            actor.require_moderator("Only moderators can queue other participants")?;
        }
        let (changed, queue) = self.with_session(session_id, |session| {
            session.require_joined(&actor.participant_id)?;
            session.require_joined(participant_id)?;
            let changed = session.queue.add(participant_id);
            Ok((changed, session.queue.clone()))
        })?;
        if changed {
            debug!(%session_id, %participant_id, "Added to reading queue");
            self.publish_queue(session_id, &queue);
        }
        Ok(queue)
    }

    pub fn remove_from_queue(
        &self,
        session_id: &str,
        actor: &Actor,
        participant_id: &str,
    ) -> Result<ReadingQueue, HubError> {
        if participant_id != actor.participant_id {
            actor.require_moderator("Only moderators can remove other participants")?;
        }
        let (changed, queue) = self.with_session(session_id, |session| {
            session.require_joined(&actor.participant_id)?;
            let changed = session.queue.remove(participant_id);
            Ok((changed, session.queue.clone()))
        })?;
        if changed {
            self.publish_queue(session_id, &queue);
        }
        Ok(queue)
    }

    pub fn clear_queue(&self, session_id: &str, actor: &Actor) -> Result<ReadingQueue, HubError> {
        actor.require_moderator("Only moderators can clear the queue")?;
        let queue = self.with_session(session_id, |session| {
            session.require_joined(&actor.participant_id)?;
            session.queue.clear();
            Ok(session.queue.clone())
        })?;
        self.publish_queue(session_id, &queue);
        Ok(queue)
    }

    /// Promotes the head of the queue. Returns the new reader.
    pub fn start_reading(&self, session_id: &str, actor: &Actor) -> Result<String, HubError> {
        let (reader, queue) = self.with_session(session_id, |session| {
            session.require_joined(&actor.participant_id)?;
            let reader = session.queue.start_reading()?;
            Ok((reader, session.queue.clone()))
        })?;
        info!(%session_id, reader = %reader, "Reading started");
        self.emit(
            session_id,
            Audience::everyone(),
            SessionEvent::ReadingStarted {
                participant_id: reader.clone(),
                reading_queue: queue,
            },
        );
        Ok(reader)
    }

    pub fn finish_reading(&self, session_id: &str, actor: &Actor) -> Result<(), HubError> {
        let queue = self.with_session(session_id, |session| {
            session.queue.finish_reading(&actor.participant_id)?;
            Ok(session.queue.clone())
        })?;
        self.emit(
            session_id,
            Audience::everyone(),
            SessionEvent::ReadingFinished {
                participant_id: actor.participant_id.clone(),
                skipped: false,
                reading_queue: queue,
            },
        );
        Ok(())
    }

    /// Ends the current turn without promoting anyone. Allowed for the
    /// current reader and moderators. Returns the skipped reader.
    pub fn skip_reading(&self, session_id: &str, actor: &Actor) -> Result<String, HubError> {
        let (skipped, queue) = self.with_session(session_id, |session| {
            session.require_joined(&actor.participant_id)?;
            match session.queue.current_reader() {
                None => return Err(QueueError::NoCurrentReader.into()),
                Some(reader) if reader != actor.participant_id && !actor.moderator => {
                    return Err(HubError::Forbidden(
                        "Only the reader or a moderator can skip a turn",
                    ));
                }
                Some(_) => {}
            }
            let skipped = session.queue.skip_reading()?;
            Ok((skipped, session.queue.clone()))
        })?;
        info!(%session_id, %skipped, by = %actor.participant_id, "Reading skipped");
        self.emit(
            session_id,
            Audience::everyone(),
            SessionEvent::ReadingFinished {
                participant_id: skipped.clone(),
                skipped: true,
                reading_queue: queue,
            },
        );
        Ok(skipped)
    }

    pub fn change_verse(
        &self,
        session_id: &str,
        actor: &Actor,
        verse: serde_json::Value,
    ) -> Result<(), HubError> {
        self.with_session(session_id, |session| {
            session.require_joined(&actor.participant_id)?;
            let is_reader = session.queue.current_reader() == Some(actor.participant_id.as_str());
            if !is_reader && !actor.moderator {
                return Err(HubError::Forbidden(
                    "Only the reader or a moderator can change the verse",
                ));
            }
            session.current_verse = Some(verse.clone());
            Ok(())
        })?;
        self.emit(
            session_id,
            Audience::everyone(),
            SessionEvent::VerseChanged {
                verse,
                changed_by: actor.participant_id.clone(),
            },
        );
        Ok(())
    }

    /// Starts the countdown, restarting it if one is already under way.
    /// `minutes` defaults to the configured session length.
    pub async fn start_timer(
        self: &Arc<Self>,
        session_id: &str,
        actor: &Actor,
        minutes: Option<u32>,
    ) -> Result<TimerSnapshot, HubError> {
        actor.require_moderator("Only moderators can control the timer")?;
        let minutes = minutes.unwrap_or(self.settings.default_duration_minutes);
        if minutes == 0 || minutes > self.settings.max_duration_minutes {
            return Err(HubError::InvalidInput(format!(
                "Timer duration must be between 1 and {} minutes",
                self.settings.max_duration_minutes
            )));
        }

        let live = self.live(session_id)?;
        let snapshot = {
            let mut session = live.lock();
            if session.closed {
                return Err(HubError::NotLive(session_id.to_string()));
            }
            session.require_joined(&actor.participant_id)?;
            session.stop_ticker();
            if session.timer.phase() != TimerPhase::Idle {
                session.timer.reset();
            }
            session.timer.start(Duration::from_secs(u64::from(minutes) * 60))?;
            let sid = session_id.to_string();
            session
                .timer
                .on_time_up(move || info!(session_id = %sid, "Reading time is up"));
            session.ticker = Some(self.spawn_ticker(session_id, &live));
            session.timer.snapshot()
        };

        info!(%session_id, minutes, "Session timer started");
        self.publish_timer(session_id, snapshot).await?;
        Ok(snapshot)
    }

    pub async fn pause_timer(
        &self,
        session_id: &str,
        actor: &Actor,
    ) -> Result<TimerSnapshot, HubError> {
        actor.require_moderator("Only moderators can control the timer")?;
        let snapshot = self.with_session(session_id, |session| {
            session.require_joined(&actor.participant_id)?;
            session.timer.pause()?;
            session.stop_ticker();
            Ok(session.timer.snapshot())
        })?;
        self.publish_timer(session_id, snapshot).await?;
        Ok(snapshot)
    }

    pub async fn resume_timer(
        self: &Arc<Self>,
        session_id: &str,
        actor: &Actor,
    ) -> Result<TimerSnapshot, HubError> {
        actor.require_moderator("Only moderators can control the timer")?;
        let live = self.live(session_id)?;
        let snapshot = {
            let mut session = live.lock();
            if session.closed {
                return Err(HubError::NotLive(session_id.to_string()));
            }
            session.require_joined(&actor.participant_id)?;
            session.timer.resume()?;
            session.stop_ticker();
            session.ticker = Some(self.spawn_ticker(session_id, &live));
            session.timer.snapshot()
        };
        self.publish_timer(session_id, snapshot).await?;
        Ok(snapshot)
    }

    pub async fn extend_timer(
        &self,
        session_id: &str,
        actor: &Actor,
        minutes: u32,
    ) -> Result<TimerSnapshot, HubError> {
        actor.require_moderator("Only moderators can control the timer")?;
        if minutes == 0 {
            return Err(HubError::InvalidInput(
                "Extension must be at least one minute".to_string(),
            ));
        }
        let snapshot = self.with_session(session_id, |session| {
            session.require_joined(&actor.participant_id)?;
            session.timer.extend(minutes)?;
            Ok(session.timer.snapshot())
        })?;
        info!(%session_id, minutes, "Session timer extended");
        self.publish_timer(session_id, snapshot).await?;
        Ok(snapshot)
    }

    pub async fn reset_timer(
        &self,
        session_id: &str,
        actor: &Actor,
    ) -> Result<TimerSnapshot, HubError> {
        actor.require_moderator("Only moderators can control the timer")?;
        let snapshot = self.with_session(session_id, |session| {
            session.require_joined(&actor.participant_id)?;
            session.stop_ticker();
            session.timer.reset();
            Ok(session.timer.snapshot())
        })?;
        self.emit(
            session_id,
            Audience::everyone(),
            SessionEvent::SessionTimerUpdate(snapshot),
        );
        self.relay.clear_timer(session_id).await?;
        Ok(snapshot)
    }

    pub async fn end_session(&self, session_id: &str, actor: &Actor) -> Result<(), HubError> {
        actor.require_moderator("Only moderators can end the session")?;
        self.with_session(session_id, |session| session.require_joined(&actor.participant_id))?;
        self.end(session_id, EndReason::EndedByModerator).await
    }

    /// Stores a negotiation payload (last write wins) and forwards it to the
    /// addressed peer, or to every other peer of the session when untargeted.
    pub async fn relay_signal(&self, message: SignalingMessage) -> Result<(), HubError> {
        self.relay.store(&message).await?;
        let audience = match &message.to {
            Some(target) => Audience::Participant(target.clone()),
            None => Audience::others_than(&message.from),
        };
        let session_id = message.session_id.clone();
        debug!(%session_id, from = %message.from, kind = ?message.kind, "Relaying signal");
        self.emit(&session_id, audience, SessionEvent::WebrtcSignal(message));
        Ok(())
    }

    async fn end(&self, session_id: &str, reason: EndReason) -> Result<(), HubError> {
        let (_, live) = self
            .sessions
            .remove(session_id)
            .ok_or_else(|| HubError::NotLive(session_id.to_string()))?;
        let timer = {
            let mut session = live.lock();
            session.closed = true;
            session.stop_ticker();
            session.timer.snapshot()
        };

        info!(%session_id, ?reason, "Session ended");
        if reason == EndReason::TimeUp {
            self.emit(session_id, Audience::everyone(), SessionEvent::SessionTimerUpdate(timer));
        }
        self.emit(session_id, Audience::everyone(), SessionEvent::SessionEnded { reason });

        self.relay.clear_participants(session_id).await?;
        self.relay.clear_timer(session_id).await?;
        self.relay.delete(session_id).await?;
        Ok(())
    }

    fn spawn_ticker(self: &Arc<Self>, session_id: &str, live: &SharedSession) -> AbortHandle {
        let hub = Arc::downgrade(self);
        let live = Arc::downgrade(live);
        let session_id = session_id.to_string();
        let period = Duration::from_millis(self.settings.tick_interval_ms.max(1));

        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let (Some(hub), Some(live)) = (hub.upgrade(), live.upgrade()) else {
                    break;
                };
                let (tick, snapshot) = {
                    let mut session = live.lock();
                    if session.closed {
                        break;
                    }
                    let tick = session.timer.tick();
                    if tick == Tick::Expired {
                        // Teardown runs on this task; dropping the handle keeps it from aborting itself.
                        session.ticker.take();
                    }
                    (tick, session.timer.snapshot())
                };
                match tick {
                    Tick::Running { .. } => {
                        // Failures are already logged by the relay.
                        let _ = hub.publish_timer(&session_id, snapshot).await;
                    }
                    Tick::Expired => {
                        if let Err(err) = hub.end(&session_id, EndReason::TimeUp).await {
                            debug!(%session_id, %err, "Teardown after time up incomplete");
                        }
                        break;
                    }
                    Tick::Paused { .. } | Tick::Inactive => break,
                }
            }
        })
        .abort_handle()
    }

    async fn publish_timer(&self, session_id: &str, snapshot: TimerSnapshot) -> Result<(), HubError> {
        self.emit(
            session_id,
            Audience::everyone(),
            SessionEvent::SessionTimerUpdate(snapshot),
        );
        self.relay.save_timer(session_id, &snapshot).await?;
        Ok(())
    }

    fn publish_queue(&self, session_id: &str, queue: &ReadingQueue) {
        self.emit(
            session_id,
            Audience::everyone(),
            SessionEvent::QueueUpdated {
                reading_queue: queue.clone(),
            },
        );
    }

    fn emit(&self, session_id: &str, audience: Audience, event: SessionEvent) {
        // No receivers just means no connections are open.
        let _ = self.events.send(HubEvent {
            session_id: session_id.to_string(),
            audience,
            event,
        });
    }

    fn live(&self, session_id: &str) -> Result<SharedSession, HubError> {
        self.sessions
            .get(session_id)
            .map(|s| s.value().clone())
            .ok_or_else(|| HubError::NotLive(session_id.to_string()))
    }

    fn with_session<T>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut LiveSession) -> Result<T, HubError>,
    ) -> Result<T, HubError> {
        let live = self.live(session_id)?;
        let mut session = live.lock();
        if session.closed {
            return Err(HubError::NotLive(session_id.to_string()));
        }
        f(&mut session)
    }
}
