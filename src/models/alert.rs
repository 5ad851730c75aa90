use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Longest snooze a client may ask for.
pub const MAX_SNOOZE_MINUTES: i64 = 24 * 60;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Alert {
    pub id: Uuid,
    pub user_id: Uuid,
    /// `medication`, `water`, `rest`, or any free-form label.
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub scheduled_time: Option<DateTime<Utc>>,
    /// Stored for clients; no evaluator acts on it.
    pub recurring: bool,
    pub active: bool,
    pub snoozed_until: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub dedupe_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub dismissed_at: Option<DateTime<Utc>>,
}

impl Alert {
    pub fn icon(&self) -> &'static str {
        alert_icon(&self.kind)
    }

    /// The instant the alert is due. A snooze still in the future replaces
    /// the scheduled time.
    pub fn effective_due(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.snoozed_until {
            Some(until) if until > now => Some(until),
            _ => self.scheduled_time,
        }
    }
}

/// `now + minutes`, for minutes in `1..=MAX_SNOOZE_MINUTES`.
pub fn snooze_deadline(now: DateTime<Utc>, minutes: i64) -> AppResult<DateTime<Utc>> {
    if !(1..=MAX_SNOOZE_MINUTES).contains(&minutes) {
        return Err(AppError::Validation(format!(
            "Snooze must be between 1 and {MAX_SNOOZE_MINUTES} minutes"
        )));
    }
    Ok(now + Duration::minutes(minutes))
}

pub fn alert_icon(kind: &str) -> &'static str {
    match kind {
        "medication" => "💊",
        "water" => "💧",
        "rest" => "💤",
        _ => "🔔",
    }
}

/// Fields a caller supplies when creating an alert.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewAlert {
    #[serde(rename = "type")]
    #[validate(length(min = 1, max = 50, message = "Alert type is required"))]
    pub kind: String,
    #[validate(length(min = 1, max = 500, message = "Alert message is required"))]
    pub message: String,
    pub scheduled_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub recurring: bool,
    /// Creation is idempotent per (user, key) when set.
    #[serde(skip)]
    pub dedupe_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SnoozeRequest {
    pub snooze_until: Option<DateTime<Utc>>,
    pub minutes: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert(scheduled: Option<DateTime<Utc>>, snoozed: Option<DateTime<Utc>>) -> Alert {
        Alert {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            kind: "water".into(),
            message: "Drink".into(),
            scheduled_time: scheduled,
            recurring: false,
            active: true,
            snoozed_until: snoozed,
            dedupe_key: None,
            created_at: Utc::now(),
            dismissed_at: None,
        }
    }

    #[test]
    fn test_future_snooze_overrides_schedule() {
        let now = Utc::now();
        let until = now + Duration::minutes(15);
        let a = alert(Some(now), Some(until));
        assert_eq!(a.effective_due(now), Some(until));
    }

    #[test]
    fn test_expired_snooze_falls_back_to_schedule() {
        let now = Utc::now();
        let a = alert(Some(now), Some(now - Duration::minutes(1)));
        assert_eq!(a.effective_due(now), Some(now));
    }

    #[test]
    fn test_unknown_kind_icon() {
        assert_eq!(alert_icon("stretch"), "🔔");
        assert_eq!(alert_icon("medication"), "💊");
    }

    #[test]
    fn test_new_alert_deserializes_type_field() {
        let json = r#"{"type":"water","message":"Drink a glass"}"#;
        let req: NewAlert = serde_json::from_str(json).unwrap();
        assert_eq!(req.kind, "water");
        assert!(!req.recurring);
        assert!(req.dedupe_key.is_none());
    }

    #[test]
    fn test_snooze_deadline_bounds() {
        let now = Utc::now();
        assert_eq!(snooze_deadline(now, 15).unwrap(), now + Duration::minutes(15));
        assert!(snooze_deadline(now, MAX_SNOOZE_MINUTES).is_ok());
        for minutes in [0, -5, MAX_SNOOZE_MINUTES + 1, i64::MAX, i64::MIN] {
            assert!(
                matches!(snooze_deadline(now, minutes), Err(AppError::Validation(_))),
                "{minutes}"
            );
        }
    }
}
