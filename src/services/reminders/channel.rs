//! Side channels the reminder engine drives: speech and on-screen notifications.
//!
//! Both are fire-and-forget. Speech is last-write-wins: a new announcement
//! replaces whatever has not been spoken yet, there is no queue.

use serde::Serialize;
use tokio::sync::watch;

use crate::models::alert::Alert;

pub trait AnnouncementChannel: Send + Sync {
    /// Cancels any in-flight utterance and speaks `text`.
    fn announce(&self, text: &str, locale: &str);
    fn silence(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Success,
    Error,
}

/// A transient toast.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub message: String,
    pub icon: String,
    pub level: NotificationLevel,
}

impl Notification {
    pub fn info(message: impl Into<String>, icon: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            icon: icon.into(),
            level: NotificationLevel::Info,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            icon: "✅".into(),
            level: NotificationLevel::Success,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            icon: "⚠️".into(),
            level: NotificationLevel::Error,
        }
    }
}

pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
    /// Replaces the client's view of the currently visible alerts.
    fn publish_alerts(&self, alerts: &[Alert]);
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Speech {
    Announce { text: String, locale: String },
    Silence,
}

/// Speech channel backed by a `watch` slot: only the latest utterance is
/// ever delivered to the reader.
pub struct SpeechChannel {
    tx: watch::Sender<Speech>,
}

impl SpeechChannel {
    pub fn new() -> (Self, watch::Receiver<Speech>) {
        let (tx, rx) = watch::channel(Speech::Silence);
        (Self { tx }, rx)
    }
}

impl AnnouncementChannel for SpeechChannel {
    fn announce(&self, text: &str, locale: &str) {
        self.tx.send_replace(Speech::Announce {
            text: text.to_string(),
            locale: locale.to_string(),
        });
    }

    fn silence(&self) {
        self.tx.send_replace(Speech::Silence);
    }
}

#[cfg(test)]
pub use recording::RecordingChannel;
