use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    check_status_transition, AchievementStore, AlertRepository, LazyPool, LogStore, StatusUpdate,
};
use crate::error::{AppError, AppResult};
use crate::models::alert::{Alert, NewAlert};
use crate::models::log::{
    sleep_duration_minutes, DateRange, LogEntry, LogKind, MedicationLog, MedicationStatus,
    MoodLog, NewLog, SleepLog, WaterLog,
};

/// Postgres-backed [`HealthStore`](super::HealthStore).
#[derive(Clone)]
pub struct PgStore {
    db: Arc<LazyPool>,
}

impl PgStore {
    pub fn new(db: Arc<LazyPool>) -> Self {
        Self { db }
    }

    async fn pool(&self) -> AppResult<PgPool> {
        self.db.get().await
    }
}

#[async_trait]
impl LogStore for PgStore {
    async fn find_logs(
        &self,
        kind: LogKind,
        user_id: Uuid,
        range: DateRange,
    ) -> AppResult<Vec<LogEntry>> {
        let pool = self.pool().await?;

        let entries = match kind {
            LogKind::Medication => sqlx::query_as::<_, MedicationLog>(
                r#"
                SELECT * FROM medication_logs
                WHERE user_id = $1
                  AND ($2::date IS NULL OR date >= $2)
                  AND ($3::date IS NULL OR date <= $3)
                ORDER BY date DESC, time ASC
                "#,
            )
            .bind(user_id)
            .bind(range.start)
            .bind(range.end)
            .fetch_all(&pool)
            .await?
            .into_iter()
            .map(LogEntry::Medication)
            .collect(),
            LogKind::Sleep => sqlx::query_as::<_, SleepLog>(
                r#"
                SELECT * FROM sleep_logs
                WHERE user_id = $1
                  AND ($2::date IS NULL OR date >= $2)
                  AND ($3::date IS NULL OR date <= $3)
                ORDER BY date DESC, created_at DESC
                "#,
            )
            .bind(user_id)
            .bind(range.start)
            .bind(range.end)
            .fetch_all(&pool)
            .await?
            .into_iter()
            .map(LogEntry::Sleep)
            .collect(),
            LogKind::Mood => sqlx::query_as::<_, MoodLog>(
                r#"
                SELECT * FROM mood_logs
                WHERE user_id = $1
                  AND ($2::date IS NULL OR date >= $2)
                  AND ($3::date IS NULL OR date <= $3)
                ORDER BY date DESC, created_at DESC
                "#,
            )
            .bind(user_id)
            .bind(range.start)
            .bind(range.end)
            .fetch_all(&pool)
            .await?
            .into_iter()
            .map(LogEntry::Mood)
            .collect(),
            LogKind::Water => sqlx::query_as::<_, WaterLog>(
                r#"
                SELECT * FROM water_logs
                WHERE user_id = $1
                  AND ($2::date IS NULL OR date >= $2)
                  AND ($3::date IS NULL OR date <= $3)
                ORDER BY date DESC, created_at DESC
                "#,
            )
            .bind(user_id)
            .bind(range.start)
            .bind(range.end)
            .fetch_all(&pool)
            .await?
            .into_iter()
            .map(LogEntry::Water)
            .collect(),
        };

        Ok(entries)
    }

    async fn insert_log(&self, user_id: Uuid, log: NewLog) -> AppResult<LogEntry> {
        let pool = self.pool().await?;
        let id = Uuid::new_v4();

        let entry = match log {
            NewLog::Medication {
                medication_name,
                dosage,
                time,
                date,
            } => LogEntry::Medication(
                sqlx::query_as::<_, MedicationLog>(
                    r#"
                    INSERT INTO medication_logs (id, user_id, medication_name, dosage, time, date, status)
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    RETURNING *
                    "#,
                )
                .bind(id)
                .bind(user_id)
                .bind(&medication_name)
                .bind(&dosage)
                .bind(time)
                .bind(date)
                .bind(MedicationStatus::Pending)
                .fetch_one(&pool)
                .await?,
            ),
            NewLog::Sleep {
                start_time,
                end_time,
                date,
            } => LogEntry::Sleep(
                sqlx::query_as::<_, SleepLog>(
                    r#"
                    INSERT INTO sleep_logs (id, user_id, start_time, end_time, date, duration)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    RETURNING *
                    "#,
                )
                .bind(id)
                .bind(user_id)
                .bind(start_time)
                .bind(end_time)
                .bind(date)
                .bind(sleep_duration_minutes(start_time, end_time))
                .fetch_one(&pool)
                .await?,
            ),
            NewLog::Mood { mood, note, date } => LogEntry::Mood(
                sqlx::query_as::<_, MoodLog>(
                    r#"
                    INSERT INTO mood_logs (id, user_id, mood, note, date)
                    VALUES ($1, $2, $3, $4, $5)
                    RETURNING *
                    "#,
                )
                .bind(id)
                .bind(user_id)
                .bind(mood)
                .bind(&note)
                .bind(date)
                .fetch_one(&pool)
                .await?,
            ),
            NewLog::Water { amount, date } => LogEntry::Water(
                sqlx::query_as::<_, WaterLog>(
                    r#"
                    INSERT INTO water_logs (id, user_id, amount, date)
                    VALUES ($1, $2, $3, $4)
                    RETURNING *
                    "#,
                )
                .bind(id)
                .bind(user_id)
                .bind(amount)
                .bind(date)
                .fetch_one(&pool)
                .await?,
            ),
        };

        tracing::debug!(user_id = %user_id, kind = ?entry.kind(), log_id = %entry.id(), date = %entry.date(), "Log inserted");
        Ok(entry)
    }

    async fn update_log_status(
        &self,
        kind: LogKind,
        log_id: Uuid,
        user_id: Uuid,
        status: MedicationStatus,
    ) -> AppResult<StatusUpdate> {
        if kind != LogKind::Medication {
            return Err(AppError::Validation(format!("{kind:?} logs have no status")));
        }
        let pool = self.pool().await?;

        let current = sqlx::query_scalar::<_, MedicationStatus>(
            "SELECT status FROM medication_logs WHERE id = $1 AND user_id = $2",
        )
        .bind(log_id)
        .bind(user_id)
        .fetch_optional(&pool)
        .await?;

        let Some(current) = current else {
            return Ok(StatusUpdate::NotFound);
        };
        check_status_transition(current, status)?;

        // Guarded on 'pending' so a concurrent update cannot resolve the log twice.
        let result = sqlx::query(
            r#"
            UPDATE medication_logs SET status = $3, updated_at = NOW()
            WHERE id = $1 AND user_id = $2 AND status = 'pending'
            "#,
        )
        .bind(log_id)
        .bind(user_id)
        .bind(status)
        .execute(&pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(
                "Medication log status has already been recorded".into(),
            ));
        }
        Ok(StatusUpdate::Updated)
    }
}

#[async_trait]
impl AlertRepository for PgStore {
    async fn list_alerts(&self, user_id: Uuid) -> AppResult<Vec<Alert>> {
        let pool = self.pool().await?;
        let alerts = sqlx::query_as::<_, Alert>(
            r#"
            SELECT * FROM alerts
            WHERE user_id = $1 AND active = true
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&pool)
        .await?;
        Ok(alerts)
    }

    async fn create_alert(&self, user_id: Uuid, alert: NewAlert) -> AppResult<Alert> {
        let pool = self.pool().await?;

        // No-op update on conflict so RETURNING yields the existing row.
        let created = sqlx::query_as::<_, Alert>(
            r#"
            INSERT INTO alerts (id, user_id, type, message, scheduled_time, recurring, active, dedupe_key)
            VALUES ($1, $2, $3, $4, $5, $6, true, $7)
            ON CONFLICT (user_id, dedupe_key) DO UPDATE
                SET dedupe_key = alerts.dedupe_key
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&alert.kind)
        .bind(&alert.message)
        .bind(alert.scheduled_time)
        .bind(alert.recurring)
        .bind(&alert.dedupe_key)
        .fetch_one(&pool)
        .await?;

        Ok(created)
    }

    async fn dismiss_alert(&self, user_id: Uuid, alert_id: Uuid) -> AppResult<()> {
        let pool = self.pool().await?;
        sqlx::query(
            r#"
            UPDATE alerts SET active = false, dismissed_at = COALESCE(dismissed_at, NOW())
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(alert_id)
        .bind(user_id)
        .execute(&pool)
        .await?;
        Ok(())
    }

    async fn snooze_alert(
        &self,
        user_id: Uuid,
        alert_id: Uuid,
        snooze_until: DateTime<Utc>,
    ) -> AppResult<()> {
        let pool = self.pool().await?;
        sqlx::query("UPDATE alerts SET snoozed_until = $3 WHERE id = $1 AND user_id = $2")
            .bind(alert_id)
            .bind(user_id)
            .bind(snooze_until)
            .execute(&pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl AchievementStore for PgStore {
    async fn record_unlocks(
        &self,
        user_id: Uuid,
        achievement_ids: &[String],
    ) -> AppResult<HashMap<String, DateTime<Utc>>> {
        if achievement_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let pool = self.pool().await?;

        sqlx::query(
            r#"
            INSERT INTO achievement_unlocks (user_id, achievement_id)
            SELECT $1, UNNEST($2::text[])
            ON CONFLICT (user_id, achievement_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(achievement_ids)
        .execute(&pool)
        .await?;

        let rows = sqlx::query_as::<_, (String, DateTime<Utc>)>(
            r#"
            SELECT achievement_id, unlocked_at FROM achievement_unlocks
            WHERE user_id = $1 AND achievement_id = ANY($2)
            "#,
        )
        .bind(user_id)
        .bind(achievement_ids)
        .fetch_all(&pool)
        .await?;

        Ok(rows.into_iter().collect())
    }
}
