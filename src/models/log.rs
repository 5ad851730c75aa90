use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// The four independent log collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Medication,
    Sleep,
    Mood,
    Water,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "medication_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MedicationStatus {
    Pending,
    Taken,
    Missed,
}

impl Default for MedicationStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl MedicationStatus {
    /// Only `pending` logs can be resolved, and only to `taken` or `missed`.
    pub fn can_transition_to(self, next: MedicationStatus) -> bool {
        matches!(
            (self, next),
            (MedicationStatus::Pending, MedicationStatus::Taken)
                | (MedicationStatus::Pending, MedicationStatus::Missed)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MedicationLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub medication_name: String,
    pub dosage: Option<String>,
    pub time: NaiveTime,
    pub date: NaiveDate,
    pub status: MedicationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SleepLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub date: NaiveDate,
    /// Minutes slept.
    pub duration: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MoodLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub mood: Option<i32>,
    pub note: Option<String>,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WaterLog {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Millilitres.
    pub amount: i32,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// A stored log of any kind, as returned by the generic store accessor.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LogEntry {
    Medication(MedicationLog),
    Sleep(SleepLog),
    Mood(MoodLog),
    Water(WaterLog),
}

impl LogEntry {
    pub fn kind(&self) -> LogKind {
        match self {
            LogEntry::Medication(_) => LogKind::Medication,
            LogEntry::Sleep(_) => LogKind::Sleep,
            LogEntry::Mood(_) => LogKind::Mood,
            LogEntry::Water(_) => LogKind::Water,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            LogEntry::Medication(l) => l.id,
            LogEntry::Sleep(l) => l.id,
            LogEntry::Mood(l) => l.id,
            LogEntry::Water(l) => l.id,
        }
    }

    #[cfg(test)]
    pub fn user_id(&self) -> Uuid {
        match self {
            LogEntry::Medication(l) => l.user_id,
            LogEntry::Sleep(l) => l.user_id,
            LogEntry::Mood(l) => l.user_id,
            LogEntry::Water(l) => l.user_id,
        }
    }

    pub fn date(&self) -> NaiveDate {
        match self {
            LogEntry::Medication(l) => l.date,
            LogEntry::Sleep(l) => l.date,
            LogEntry::Mood(l) => l.date,
            LogEntry::Water(l) => l.date,
        }
    }

    #[cfg(test)]
    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            LogEntry::Medication(l) => l.created_at,
            LogEntry::Sleep(l) => l.created_at,
            LogEntry::Mood(l) => l.created_at,
            LogEntry::Water(l) => l.created_at,
        }
    }
}

/// A log ready to be inserted. The store assigns id and timestamps.
#[derive(Debug, Clone)]
pub enum NewLog {
    Medication {
        medication_name: String,
        dosage: Option<String>,
        time: NaiveTime,
        date: NaiveDate,
    },
    Sleep {
        start_time: NaiveTime,
        end_time: NaiveTime,
        date: NaiveDate,
    },
    Mood {
        mood: Option<i32>,
        note: Option<String>,
        date: NaiveDate,
    },
    Water {
        amount: i32,
        date: NaiveDate,
    },
}

/// Inclusive calendar-day bounds. A missing bound is open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn day(date: NaiveDate) -> Self {
        Self {
            start: Some(date),
            end: Some(date),
        }
    }

    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// The evaluators' lookback: every day from `today - 7` onwards.
    pub fn trailing_week(today: NaiveDate) -> Self {
        Self {
            start: Some(today - Duration::days(7)),
            end: None,
        }
    }

    #[cfg(test)]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }
}

/// Minutes between two times of day, rolling past midnight when `end < start`.
pub fn sleep_duration_minutes(start: NaiveTime, end: NaiveTime) -> i32 {
    let mut diff = end - start;
    if diff < Duration::zero() {
        diff = diff + Duration::days(1);
    }
    (diff.num_seconds() as f64 / 60.0).round() as i32
}

// ── Request bodies ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct CreateMedicationRequest {
    #[validate(length(min = 1, max = 200, message = "Medication name is required"))]
    pub medication_name: String,
    pub dosage: Option<String>,
    pub time: NaiveTime,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMedicationStatusRequest {
    pub status: MedicationStatus,
}

#[derive(Debug, Deserialize)]
pub struct CreateSleepRequest {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateMoodRequest {
    #[validate(range(min = 1, max = 7, message = "Mood must be between 1 and 7"))]
    pub mood: Option<i32>,
    #[validate(length(max = 2000))]
    pub note: Option<String>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateWaterRequest {
    #[validate(range(min = 1, max = 10000, message = "Amount must be between 1 and 10000 ml"))]
    pub amount: i32,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct LogRangeQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl LogRangeQuery {
    /// Both bounds must be present to filter; otherwise every log is returned.
    pub fn range(&self) -> DateRange {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => DateRange::between(start, end),
            _ => DateRange::all(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WaterQuery {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct WaterSummary {
    pub logs: Vec<WaterLog>,
    pub total_amount: i64,
}

impl WaterSummary {
    pub fn new(logs: Vec<WaterLog>) -> Self {
        let total_amount = logs.iter().map(|l| l.amount as i64).sum();
        Self { logs, total_amount }
    }
}
