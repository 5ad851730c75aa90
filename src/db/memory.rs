use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{
    check_status_transition, AchievementStore, AlertRepository, LogStore, StatusUpdate,
};
use crate::error::{AppError, AppResult};
use crate::models::alert::{Alert, NewAlert};
use crate::models::log::{
    sleep_duration_minutes, DateRange, LogEntry, LogKind, MedicationLog, MedicationStatus,
    MoodLog, NewLog, SleepLog, WaterLog,
};

/// In-memory store for tests. `set_unavailable(true)` makes every call fail
/// the way an unreachable database would.
#[derive(Default)]
pub struct MemoryStore {
    logs: Mutex<Vec<LogEntry>>,
    alerts: Mutex<Vec<Alert>>,
    unavailable: AtomicBool,
    alert_creates: AtomicUsize,
    unlocks: Mutex<HashMap<(Uuid, String), DateTime<Utc>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Every alert ever stored, including dismissed ones.
    pub fn all_alerts(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().clone()
    }

    pub fn alert_create_calls(&self) -> usize {
        self.alert_creates.load(Ordering::SeqCst)
    }

    /// Inserts a fully-formed alert, bypassing `create_alert`.
    pub fn seed_alert(&self, alert: Alert) {
        self.alerts.lock().unwrap().push(alert);
    }

    fn check(&self) -> AppResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::Unavailable("memory store offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl LogStore for MemoryStore {
    async fn find_logs(
        &self,
        kind: LogKind,
        user_id: Uuid,
        range: DateRange,
    ) -> AppResult<Vec<LogEntry>> {
        self.check()?;
        let mut found: Vec<LogEntry> = self
            .logs
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.kind() == kind && e.user_id() == user_id && range.contains(e.date()))
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            b.date()
                .cmp(&a.date())
                .then_with(|| b.created_at().cmp(&a.created_at()))
        });
        Ok(found)
    }

    async fn insert_log(&self, user_id: Uuid, log: NewLog) -> AppResult<LogEntry> {
        self.check()?;
        let id = Uuid::new_v4();
        let now = Utc::now();
        let entry = match log {
            NewLog::Medication {
                medication_name,
                dosage,
                time,
                date,
            } => LogEntry::Medication(MedicationLog {
                id,
                user_id,
                medication_name,
                dosage,
                time,
                date,
                status: MedicationStatus::Pending,
                created_at: now,
                updated_at: None,
            }),
            NewLog::Sleep {
                start_time,
                end_time,
                date,
            } => LogEntry::Sleep(SleepLog {
                id,
                user_id,
                start_time,
                end_time,
                date,
                duration: sleep_duration_minutes(start_time, end_time),
                created_at: now,
            }),
            NewLog::Mood { mood, note, date } => LogEntry::Mood(MoodLog {
                id,
                user_id,
                mood,
                note,
                date,
                created_at: now,
            }),
            NewLog::Water { amount, date } => LogEntry::Water(WaterLog {
                id,
                user_id,
                amount,
                date,
                created_at: now,
            }),
        };
        self.logs.lock().unwrap().push(entry.clone());
        Ok(entry)
    }

    async fn update_log_status(
        &self,
        kind: LogKind,
        log_id: Uuid,
        user_id: Uuid,
        status: MedicationStatus,
    ) -> AppResult<StatusUpdate> {
        self.check()?;
        if kind != LogKind::Medication {
            return Err(AppError::Validation(format!("{kind:?} logs have no status")));
        }
        let mut logs = self.logs.lock().unwrap();
        let found = logs.iter_mut().find_map(|e| match e {
            LogEntry::Medication(m) if m.id == log_id && m.user_id == user_id => Some(m),
            _ => None,
        });
        let Some(log) = found else {
            return Ok(StatusUpdate::NotFound);
        };
        check_status_transition(log.status, status)?;
        log.status = status;
        log.updated_at = Some(Utc::now());
        Ok(StatusUpdate::Updated)
    }
}

#[async_trait]
impl AlertRepository for MemoryStore {
    async fn list_alerts(&self, user_id: Uuid) -> AppResult<Vec<Alert>> {
        self.check()?;
        let mut alerts: Vec<Alert> = self
            .alerts
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.user_id == user_id && a.active)
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(alerts)
    }

    async fn create_alert(&self, user_id: Uuid, alert: NewAlert) -> AppResult<Alert> {
        self.check()?;
        self.alert_creates.fetch_add(1, Ordering::SeqCst);
        let mut alerts = self.alerts.lock().unwrap();
        if let Some(key) = alert.dedupe_key.as_deref() {
            if let Some(existing) = alerts
                .iter()
                .find(|a| a.user_id == user_id && a.dedupe_key.as_deref() == Some(key))
            {
                return Ok(existing.clone());
            }
        }
        let created = Alert {
            id: Uuid::new_v4(),
            user_id,
            kind: alert.kind,
            message: alert.message,
            scheduled_time: alert.scheduled_time,
            recurring: alert.recurring,
            active: true,
            snoozed_until: None,
            dedupe_key: alert.dedupe_key,
            created_at: Utc::now(),
            dismissed_at: None,
        };
        alerts.push(created.clone());
        Ok(created)
    }

    async fn dismiss_alert(&self, user_id: Uuid, alert_id: Uuid) -> AppResult<()> {
        self.check()?;
        let mut alerts = self.alerts.lock().unwrap();
        if let Some(alert) = alerts
            .iter_mut()
            .find(|a| a.id == alert_id && a.user_id == user_id)
        {
            alert.active = false;
            alert.dismissed_at.get_or_insert_with(Utc::now);
        }
        Ok(())
    }

    async fn snooze_alert(
        &self,
        user_id: Uuid,
        alert_id: Uuid,
        snooze_until: DateTime<Utc>,
    ) -> AppResult<()> {
        self.check()?;
        let mut alerts = self.alerts.lock().unwrap();
        if let Some(alert) = alerts
            .iter_mut()
            .find(|a| a.id == alert_id && a.user_id == user_id)
        {
            alert.snoozed_until = Some(snooze_until);
        }
        Ok(())
    }
}

#[async_trait]
impl AchievementStore for MemoryStore {
    async fn record_unlocks(
        &self,
        user_id: Uuid,
        achievement_ids: &[String],
    ) -> AppResult<HashMap<String, DateTime<Utc>>> {
        self.check()?;
        let mut unlocks = self.unlocks.lock().unwrap();
        let now = Utc::now();
        Ok(achievement_ids
            .iter()
            .map(|id| {
                let at = *unlocks.entry((user_id, id.clone())).or_insert(now);
                (id.clone(), at)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()
    }

    #[tokio::test]
    async fn test_water_round_trip_totals() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();

        store
            .insert_log(user, NewLog::Water { amount: 500, date: today() })
            .await
            .unwrap();
        let logs = super::super::into_water(
            store
                .find_logs(LogKind::Water, user, DateRange::day(today()))
                .await
                .unwrap(),
        );
        assert_eq!(crate::models::log::WaterSummary::new(logs).total_amount, 500);

        store
            .insert_log(user, NewLog::Water { amount: 500, date: today() })
            .await
            .unwrap();
        let logs = super::super::into_water(
            store
                .find_logs(LogKind::Water, user, DateRange::day(today()))
                .await
                .unwrap(),
        );
        assert_eq!(crate::models::log::WaterSummary::new(logs).total_amount, 1000);
    }

    #[tokio::test]
    async fn test_logs_are_scoped_to_user() {
        let store = MemoryStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        store
            .insert_log(alice, NewLog::Water { amount: 250, date: today() })
            .await
            .unwrap();

        let bobs = store
            .find_logs(LogKind::Water, bob, DateRange::all())
            .await
            .unwrap();
        assert!(bobs.is_empty());
    }

    #[tokio::test]
    async fn test_status_update_unknown_log_is_not_found() {
        let store = MemoryStore::new();
        let result = store
            .update_log_status(
                LogKind::Medication,
                Uuid::new_v4(),
                Uuid::new_v4(),
                MedicationStatus::Taken,
            )
            .await
            .unwrap();
        assert_eq!(result, StatusUpdate::NotFound);
    }

    #[tokio::test]
    async fn test_dismiss_is_idempotent() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let alert = store
            .create_alert(
                user,
                NewAlert {
                    kind: "water".into(),
                    message: "Drink water".into(),
                    scheduled_time: None,
                    recurring: false,
                    dedupe_key: None,
                },
            )
            .await
            .unwrap();

        store.dismiss_alert(user, alert.id).await.unwrap();
        let first = store.all_alerts()[0].dismissed_at;
        store.dismiss_alert(user, alert.id).await.unwrap();
        store.dismiss_alert(user, Uuid::new_v4()).await.unwrap();

        assert_eq!(store.all_alerts()[0].dismissed_at, first);
        assert!(store.list_alerts(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_first_unlock_is_kept() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let ids = vec!["sleep_champ".to_string()];
        let first = store.record_unlocks(user, &ids).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let again = store.record_unlocks(user, &ids).await.unwrap();
        assert_eq!(first["sleep_champ"], again["sleep_champ"]);
    }
}
