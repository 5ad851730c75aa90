//! Per-session reminder engine.
//!
//! One [`ReminderEngine`] runs for each connected reminder session. It polls
//! the alert repository and today's medication logs on a fixed cadence,
//! keeps the session's list of visible alerts, and drives speech and
//! notifications. Dropping the [`EngineHandle`] stops both polling loops.

mod channel;
mod clock;
mod engine;
mod schedule;

pub use channel::{
    AnnouncementChannel, Notification, NotificationLevel, NotificationSink, Speech, SpeechChannel,
};
pub use engine::ReminderEngine;

#[cfg(test)]
pub use channel::RecordingChannel;
#[cfg(test)]
pub use clock::MockClock;

use chrono_tz::Tz;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ReminderSettings {
    /// Period of both polling loops.
    pub poll_interval: Duration,
    /// Lookahead for scheduled alerts.
    pub due_window: chrono::Duration,
    /// How long after a medication's time-of-day it may still fire.
    pub match_tolerance: chrono::Duration,
    pub default_snooze_minutes: i64,
    pub default_locale: String,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            due_window: chrono::Duration::seconds(60),
            match_tolerance: chrono::Duration::seconds(60),
            default_snooze_minutes: 15,
            default_locale: "en-US".into(),
        }
    }
}

/// The authenticated user a session runs for.
#[derive(Debug, Clone)]
pub struct SessionUser {
    pub id: Uuid,
    pub timezone: Tz,
    pub locale: String,
    pub voice_alerts: bool,
}
