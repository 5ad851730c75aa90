//! Storage seams for logs and alerts.
//!
//! Handlers and the reminder engine only see the [`HealthStore`] traits.
//! [`store::PgStore`] backs them with Postgres; tests use the in-memory store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::alert::{Alert, NewAlert};
use crate::models::log::{
    DateRange, LogEntry, LogKind, MedicationLog, MedicationStatus, MoodLog, NewLog, SleepLog,
    WaterLog,
};

#[cfg(test)]
pub mod memory;
pub mod pool;
pub mod store;

pub use pool::LazyPool;
pub use store::PgStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusUpdate {
    Updated,
    NotFound,
}

#[async_trait]
pub trait LogStore: Send + Sync {
    /// Logs of one kind for one user, newest date first.
    async fn find_logs(
        &self,
        kind: LogKind,
        user_id: Uuid,
        range: DateRange,
    ) -> AppResult<Vec<LogEntry>>;

    async fn insert_log(&self, user_id: Uuid, log: NewLog) -> AppResult<LogEntry>;

    async fn update_log_status(
        &self,
        kind: LogKind,
        log_id: Uuid,
        user_id: Uuid,
        status: MedicationStatus,
    ) -> AppResult<StatusUpdate>;
}

#[async_trait]
pub trait AlertRepository: Send + Sync {
    /// Active alerts for the user, newest first.
    async fn list_alerts(&self, user_id: Uuid) -> AppResult<Vec<Alert>>;

    /// Inserts an alert. With a dedupe key, an existing alert for the same
    /// key is returned instead of creating a second one.
    async fn create_alert(&self, user_id: Uuid, alert: NewAlert) -> AppResult<Alert>;

    /// Idempotent: unknown, foreign or already-dismissed ids are a no-op.
    async fn dismiss_alert(&self, user_id: Uuid, alert_id: Uuid) -> AppResult<()>;

    async fn snooze_alert(
        &self,
        user_id: Uuid,
        alert_id: Uuid,
        snooze_until: DateTime<Utc>,
    ) -> AppResult<()>;
}

#[async_trait]
pub trait AchievementStore: Send + Sync {
    /// Records first-unlock timestamps and returns the stored ones, so a
    /// re-evaluated achievement keeps the date it was first earned.
    async fn record_unlocks(
        &self,
        user_id: Uuid,
        achievement_ids: &[String],
    ) -> AppResult<HashMap<String, DateTime<Utc>>>;
}

/// Everything the service persists besides accounts.
pub trait HealthStore: LogStore + AlertRepository + AchievementStore {}

impl<T: LogStore + AlertRepository + AchievementStore> HealthStore for T {}

/// Guards the medication status lifecycle shared by every store.
pub fn check_status_transition(
    current: MedicationStatus,
    next: MedicationStatus,
) -> AppResult<()> {
    if next == MedicationStatus::Pending {
        return Err(AppError::Validation(
            "Status must be 'taken' or 'missed'".into(),
        ));
    }
    if !current.can_transition_to(next) {
        return Err(AppError::Conflict(
            "Medication log status has already been recorded".into(),
        ));
    }
    Ok(())
}

pub fn into_medication(entries: Vec<LogEntry>) -> Vec<MedicationLog> {
    entries
        .into_iter()
        .filter_map(|e| match e {
            LogEntry::Medication(log) => Some(log),
            _ => None,
        })
        .collect()
}

pub fn into_sleep(entries: Vec<LogEntry>) -> Vec<SleepLog> {
    entries
        .into_iter()
        .filter_map(|e| match e {
            LogEntry::Sleep(log) => Some(log),
            _ => None,
        })
        .collect()
}

pub fn into_mood(entries: Vec<LogEntry>) -> Vec<MoodLog> {
    entries
        .into_iter()
        .filter_map(|e| match e {
            LogEntry::Mood(log) => Some(log),
            _ => None,
        })
        .collect()
}

pub fn into_water(entries: Vec<LogEntry>) -> Vec<WaterLog> {
    entries
        .into_iter()
        .filter_map(|e| match e {
            LogEntry::Water(log) => Some(log),
            _ => None,
        })
        .collect()
}
