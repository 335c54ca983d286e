//! Countdown clock for a live reading session.
//!
//! `idle -> running <-> paused -> expired`, with `reset` back to idle from any
//! phase. Remaining time is measured against the injected monotonic clock and
//! frozen while paused, so pausing never loses or gains time.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::Clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerPhase {
    Idle,
    Running,
    Paused,
    Expired,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimerError {
    #[error("Cannot {op} a timer that is {phase:?}")]
    InvalidTransition { op: &'static str, phase: TimerPhase },
    #[error("Timer duration must be positive")]
    ZeroDuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Inactive,
    Running { remaining_secs: u64 },
    Paused { remaining_secs: u64 },
    /// Reported exactly once, on the first observation after time ran out.
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub time_remaining: u64,
    pub total_duration: u64,
    pub is_active: bool,
    pub is_paused: bool,
    pub phase: TimerPhase,
}

type TimeUpCallback = Box<dyn FnOnce() + Send>;

pub struct SessionTimer {
    clock: Arc<dyn Clock>,
    phase: TimerPhase,
    total: Duration,
    /// Remaining time as of `anchor` (running) or now (any other phase).
    remaining: Duration,
    anchor: Option<Instant>,
    expiry_reported: bool,
    on_time_up: Option<TimeUpCallback>,
}

impl fmt::Debug for SessionTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionTimer")
            .field("phase", &self.phase)
            .field("total", &self.total)
            .field("remaining", &self.remaining())
            .finish()
    }
}

impl SessionTimer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            phase: TimerPhase::Idle,
            total: Duration::ZERO,
            remaining: Duration::ZERO,
            anchor: None,
            expiry_reported: false,
            on_time_up: None,
        }
    }

    /// Registers the callback fired when the countdown reaches zero.
    pub fn on_time_up(&mut self, callback: impl FnOnce() + Send + 'static) {
        self.on_time_up = Some(Box::new(callback));
    }

    pub fn phase(&self) -> TimerPhase {
        self.phase
    }

    pub fn total(&self) -> Duration {
        self.total
    }

    pub fn remaining(&self) -> Duration {
        match (self.phase, self.anchor) {
            (TimerPhase::Running, Some(anchor)) => {
                let elapsed = self.clock.instant().saturating_duration_since(anchor);
                self.remaining.saturating_sub(elapsed)
            }
            _ => self.remaining,
        }
    }

    /// Whole seconds left, rounded up so the display reads 0 only at expiry.
    pub fn remaining_secs(&self) -> u64 {
        let r = self.remaining();
        r.as_secs() + u64::from(r.subsec_nanos() > 0)
    }

    pub fn start(&mut self, duration: Duration) -> Result<(), TimerError> {
        self.settle();
        if self.phase != TimerPhase::Idle {
            return Err(self.invalid("start"));
        }
        if duration.is_zero() {
            return Err(TimerError::ZeroDuration);
        }
        self.total = duration;
        self.remaining = duration;
        self.anchor = Some(self.clock.instant());
        self.expiry_reported = false;
        self.phase = TimerPhase::Running;
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), TimerError> {
        self.settle();
        if self.phase != TimerPhase::Running {
            return Err(self.invalid("pause"));
        }
        self.remaining = self.remaining();
        self.anchor = None;
        self.phase = TimerPhase::Paused;
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), TimerError> {
        if self.phase != TimerPhase::Paused {
            return Err(self.invalid("resume"));
        }
        self.anchor = Some(self.clock.instant());
        self.phase = TimerPhase::Running;
        Ok(())
    }

    pub fn extend(&mut self, minutes: u32) -> Result<(), TimerError> {
        self.settle();
        if !matches!(self.phase, TimerPhase::Running | TimerPhase::Paused) {
            return Err(self.invalid("extend"));
        }
        let extra = Duration::from_secs(u64::from(minutes) * 60);
        self.remaining += extra;
        self.total += extra;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.phase = TimerPhase::Idle;
        self.total = Duration::ZERO;
        self.remaining = Duration::ZERO;
        self.anchor = None;
        self.expiry_reported = false;
    }

    pub fn tick(&mut self) -> Tick {
        self.settle();
        match self.phase {
            TimerPhase::Running => Tick::Running {
                remaining_secs: self.remaining_secs(),
            },
            TimerPhase::Paused => Tick::Paused {
                remaining_secs: self.remaining_secs(),
            },
            TimerPhase::Expired if !self.expiry_reported => {
                self.expiry_reported = true;
                Tick::Expired
            }
            TimerPhase::Expired | TimerPhase::Idle => Tick::Inactive,
        }
    }

    /// A running timer whose time is up reads as expired even before the
    /// next `tick` settles it.
    pub fn snapshot(&self) -> TimerSnapshot {
        let phase = match self.phase {
            TimerPhase::Running if self.remaining().is_zero() => TimerPhase::Expired,
            phase => phase,
        };
        TimerSnapshot {
            time_remaining: self.remaining_secs(),
            total_duration: self.total.as_secs(),
            is_active: matches!(phase, TimerPhase::Running | TimerPhase::Paused),
            is_paused: phase == TimerPhase::Paused,
            phase,
        }
    }

    /// Moves a running timer whose time is up into `expired`.
    fn settle(&mut self) {
        if self.phase != TimerPhase::Running || !self.remaining().is_zero() {
            return;
        }
        self.phase = TimerPhase::Expired;
        self.remaining = Duration::ZERO;
        self.anchor = None;
        if let Some(callback) = self.on_time_up.take() {
            callback();
        }
    }

    fn invalid(&self, op: &'static str) -> TimerError {
        TimerError::InvalidTransition {
            op,
            phase: self.phase,
        }
    }
}
