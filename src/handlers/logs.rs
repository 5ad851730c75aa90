use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::auth::middleware::AuthUser;
use crate::db::{into_medication, into_mood, into_sleep, into_water, LogStore, StatusUpdate};
use crate::error::{AppError, AppResult};
use crate::handlers::{load_user, local_today};
use crate::models::log::{
    CreateMedicationRequest, CreateMoodRequest, CreateSleepRequest, CreateWaterRequest, DateRange,
    LogEntry, LogKind, LogRangeQuery, MedicationLog, MoodLog, NewLog, SleepLog,
    UpdateMedicationStatusRequest, WaterQuery, WaterSummary,
};
use crate::AppState;

async fn insert(state: &AppState, user_id: Uuid, log: NewLog) -> AppResult<(StatusCode, Json<LogEntry>)> {
    let entry = state.store.insert_log(user_id, log).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

// ── Medication ──────────────────────────────────────────────────────────

pub async fn create_medication(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<CreateMedicationRequest>,
) -> AppResult<(StatusCode, Json<LogEntry>)> {
    body.validate()?;
    let date = match body.date {
        Some(d) => d,
        None => local_today(&load_user(&state, auth_user.id).await?),
    };
    let log = NewLog::Medication {
        medication_name: body.medication_name.trim().to_string(),
        dosage: body.dosage,
        time: body.time,
        date,
    };
    insert(&state, auth_user.id, log).await
}

pub async fn list_medications(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<LogRangeQuery>,
) -> AppResult<Json<Vec<MedicationLog>>> {
    let entries = state
        .store
        .find_logs(LogKind::Medication, auth_user.id, query.range())
        .await?;
    Ok(Json(into_medication(entries)))
}

pub async fn update_medication_status(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(log_id): Path<Uuid>,
    Json(body): Json<UpdateMedicationStatusRequest>,
) -> AppResult<Json<Value>> {
    match state
        .store
        .update_log_status(LogKind::Medication, log_id, auth_user.id, body.status)
        .await?
    {
        StatusUpdate::Updated => Ok(Json(json!({ "id": log_id, "status": body.status }))),
        StatusUpdate::NotFound => Err(AppError::NotFound("Medication log not found".into())),
    }
}

// ── Sleep ───────────────────────────────────────────────────────────────

pub async fn create_sleep(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<CreateSleepRequest>,
) -> AppResult<(StatusCode, Json<LogEntry>)> {
    let date = match body.date {
        Some(d) => d,
        None => local_today(&load_user(&state, auth_user.id).await?),
    };
    let log = NewLog::Sleep {
        start_time: body.start_time,
        end_time: body.end_time,
        date,
    };
    insert(&state, auth_user.id, log).await
}

pub async fn list_sleep(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<LogRangeQuery>,
) -> AppResult<Json<Vec<SleepLog>>> {
    let entries = state
        .store
        .find_logs(LogKind::Sleep, auth_user.id, query.range())
        .await?;
    Ok(Json(into_sleep(entries)))
}

// ── Mood ────────────────────────────────────────────────────────────────

pub async fn create_mood(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<CreateMoodRequest>,
) -> AppResult<(StatusCode, Json<LogEntry>)> {
    body.validate()?;
    let date = match body.date {
        Some(d) => d,
        None => local_today(&load_user(&state, auth_user.id).await?),
    };
    let log = NewLog::Mood {
        mood: body.mood,
        note: body.note,
        date,
    };
    insert(&state, auth_user.id, log).await
}

pub async fn list_moods(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<LogRangeQuery>,
) -> AppResult<Json<Vec<MoodLog>>> {
    let entries = state
        .store
        .find_logs(LogKind::Mood, auth_user.id, query.range())
        .await?;
    Ok(Json(into_mood(entries)))
}

// ── Water ───────────────────────────────────────────────────────────────

pub async fn create_water(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<CreateWaterRequest>,
) -> AppResult<(StatusCode, Json<LogEntry>)> {
    body.validate()?;
    let date = match body.date {
        Some(d) => d,
        None => local_today(&load_user(&state, auth_user.id).await?),
    };
    insert(&state, auth_user.id, NewLog::Water { amount: body.amount, date }).await
}

/// One day's water logs and their total. Defaults to the user's today.
pub async fn water_for_day(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<WaterQuery>,
) -> AppResult<Json<WaterSummary>> {
    let date = match query.date {
        Some(d) => d,
        None => local_today(&load_user(&state, auth_user.id).await?),
    };
    let entries = state
        .store
        .find_logs(LogKind::Water, auth_user.id, DateRange::day(date))
        .await?;
    Ok(Json(WaterSummary::new(into_water(entries))))
}
