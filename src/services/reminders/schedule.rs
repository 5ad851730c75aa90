use std::collections::HashSet;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use crate::models::alert::Alert;

/// Whether an alert belongs on screen right now.
///
/// Active alerts without a due time are always shown. Otherwise the due time
/// (a pending snooze wins over the schedule) must fall inside
/// `[now, now + window)`. Anything already past that window is dropped.
pub fn is_due_now(alert: &Alert, now: DateTime<Utc>, window: Duration) -> bool {
    if !alert.active {
        return false;
    }
    match alert.effective_due(now) {
        None => true,
        Some(due) => {
            let lead = due - now;
            lead >= Duration::zero() && lead < window
        }
    }
}

/// A medication scheduled at `scheduled` fires while the local wall clock is
/// within `tolerance` after it. There is no catch-up past the tolerance.
pub fn matches_time_of_day(scheduled: NaiveTime, now_local: NaiveTime, tolerance: Duration) -> bool {
    let elapsed = now_local - scheduled;
    elapsed >= Duration::zero() && elapsed < tolerance
}

/// A reminder this session raised stays on screen until the user dismisses
/// it, except while a snooze pushes it out.
pub fn awaits_action(alert: &Alert, now: DateTime<Utc>, fired: &HashSet<String>) -> bool {
    alert.active
        && alert.snoozed_until.map_or(true, |until| until <= now)
        && alert
            .dedupe_key
            .as_ref()
            .is_some_and(|key| fired.contains(key))
}

pub fn medication_dedupe_key(user_id: Uuid, log_id: Uuid, date: NaiveDate) -> String {
    format!("medication:{user_id}:{log_id}:{date}")
}

/// The local day a medication dedupe key was minted for.
pub fn dedupe_key_date(key: &str) -> Option<NaiveDate> {
    key.rsplit(':').next()?.parse().ok()
}
