//! Reading-time admission control.
//!
//! Non-privileged participants may join a group's live session only inside a
//! window around the group's daily reading time. The window is compared in
//! minutes of the local day and does not wrap across midnight.

use chrono::{DateTime, Days, FixedOffset, Local, NaiveTime, TimeZone, Timelike, Utc};
use serde::Serialize;
use thiserror::Error;
use vrinda_config::AdmissionSettings;
use vrinda_db::models::{Group, UserRole};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionReason {
    SuperAdmin,
    GroupAdmin,
    WithinTimeWindow,
    OutsideTimeWindow,
    NoReadingTime,
    InvalidReadingTime,
}

impl AdmissionReason {
    pub fn as_str(self) -> &'static str {
        match self {
            AdmissionReason::SuperAdmin => "super_admin",
            AdmissionReason::GroupAdmin => "group_admin",
            AdmissionReason::WithinTimeWindow => "within_time_window",
            AdmissionReason::OutsideTimeWindow => "outside_time_window",
            AdmissionReason::NoReadingTime => "no_reading_time",
            AdmissionReason::InvalidReadingTime => "invalid_reading_time",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    SuperAdmin,
    GroupAdmin,
    Participant,
}

impl Privilege {
    pub fn of(role: UserRole, user_id: &str, group: &Group) -> Self {
        if role.is_super_admin() {
            Privilege::SuperAdmin
        } else if group.is_admin(user_id) {
            Privilege::GroupAdmin
        } else {
            Privilege::Participant
        }
    }

    pub fn is_moderator(self) -> bool {
        !matches!(self, Privilege::Participant)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionWindow {
    pub minutes_before: u32,
    pub minutes_after: u32,
}

impl Default for AdmissionWindow {
    fn default() -> Self {
        Self {
            minutes_before: 15,
            minutes_after: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionDecision {
    pub can_join: bool,
    pub reason: AdmissionReason,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_time: Option<String>,
    /// Absolute distance from the reading time, in minutes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_difference: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_reading_time: Option<DateTime<FixedOffset>>,
}

impl AdmissionDecision {
    fn bare(can_join: bool, reason: AdmissionReason, message: &str) -> Self {
        Self {
            can_join,
            reason,
            message: message.to_string(),
            current_time: None,
            time_difference: None,
            next_reading_time: None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReadingTimeError {
    #[error("reading time must be HH:MM (24h), got {0:?}")]
    Malformed(String),
}

/// Parses `H:MM` / `HH:MM` in 24h format.
pub fn parse_reading_time(raw: &str) -> Result<NaiveTime, ReadingTimeError> {
    let malformed = || ReadingTimeError::Malformed(raw.to_string());
    let (hours, minutes) = raw.trim().split_once(':').ok_or_else(malformed)?;

    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(hours) || hours.len() > 2 || !all_digits(minutes) || minutes.len() != 2 {
        return Err(malformed());
    }

    let h: u32 = hours.parse().map_err(|_| malformed())?;
    let m: u32 = minutes.parse().map_err(|_| malformed())?;
    NaiveTime::from_hms_opt(h, m, 0).ok_or_else(malformed)
}

/// Decides whether a requester may join now. `now` must already be in the
/// group's local time zone.
pub fn evaluate(
    privilege: Privilege,
    reading_time: Option<&str>,
    now: DateTime<FixedOffset>,
    window: &AdmissionWindow,
) -> AdmissionDecision {
    match privilege {
        Privilege::SuperAdmin => {
            return AdmissionDecision::bare(
                true,
                AdmissionReason::SuperAdmin,
                "Super admins may join at any time",
            );
        }
        Privilege::GroupAdmin => {
            return AdmissionDecision::bare(
                true,
                AdmissionReason::GroupAdmin,
                "Group admins may join at any time",
            );
        }
        Privilege::Participant => {}
    }

    let Some(raw) = reading_time.filter(|r| !r.trim().is_empty()) else {
        return AdmissionDecision::bare(
            false,
            AdmissionReason::NoReadingTime,
            "Reading time is not set for this group",
        );
    };

    let reading = match parse_reading_time(raw) {
        Ok(t) => t,
        Err(_) => {
            return AdmissionDecision::bare(
                false,
                AdmissionReason::InvalidReadingTime,
                "Reading time has an invalid format",
            );
        }
    };

    let current = i64::from(now.hour() * 60 + now.minute());
    let target = i64::from(reading.hour() * 60 + reading.minute());
    let opens = target - i64::from(window.minutes_before);
    let closes = target + i64::from(window.minutes_after);
    let difference = (current - target).unsigned_abs() as u32;
    let current_time = format!("{:02}:{:02}", now.hour(), now.minute());

    if (opens..=closes).contains(&current) {
        return AdmissionDecision {
            can_join: true,
            reason: AdmissionReason::WithinTimeWindow,
            message: "It is time for the shared reading".to_string(),
            current_time: Some(current_time),
            time_difference: Some(difference),
            next_reading_time: None,
        };
    }

    let mut day = now.date_naive();
    if current > closes {
        day = day.checked_add_days(Days::new(1)).unwrap_or(day);
    }
    let next = now.offset().from_local_datetime(&day.and_time(reading)).single();

    let message = match next {
        Some(at) => format!(
            "Shared reading is at {}. Next reading: {} at {}",
            raw.trim(),
            at.format("%Y-%m-%d"),
            at.format("%H:%M")
        ),
        None => format!("Shared reading is at {}", raw.trim()),
    };

    AdmissionDecision {
        can_join: false,
        reason: AdmissionReason::OutsideTimeWindow,
        message,
        current_time: Some(current_time),
        time_difference: Some(difference),
        next_reading_time: next,
    }
}

/// Admission rules bound to the configured window and time zone.
#[derive(Debug, Clone, Copy)]
pub struct AdmissionPolicy {
    pub window: AdmissionWindow,
    offset: Option<FixedOffset>,
}

impl AdmissionPolicy {
    pub fn new(window: AdmissionWindow, offset: Option<FixedOffset>) -> Self {
        Self { window, offset }
    }

    pub fn from_settings(settings: &AdmissionSettings) -> Self {
        let offset = settings
            .utc_offset_minutes
            .and_then(|m| FixedOffset::east_opt(m * 60));
        Self::new(
            AdmissionWindow {
                minutes_before: settings.minutes_before,
                minutes_after: settings.minutes_after,
            },
            offset,
        )
    }

    pub fn local(&self, now: DateTime<Utc>) -> DateTime<FixedOffset> {
        match self.offset {
            Some(offset) => now.with_timezone(&offset),
            None => now.with_timezone(&Local).fixed_offset(),
        }
    }

    pub fn check(&self, privilege: Privilege, group: &Group, now: DateTime<Utc>) -> AdmissionDecision {
        evaluate(
            privilege,
            group.reading_time.as_deref(),
            self.local(now),
            &self.window,
        )
    }
}
