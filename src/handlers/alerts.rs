use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::auth::middleware::AuthUser;
use crate::db::AlertRepository;
use crate::error::{AppError, AppResult};
use crate::models::alert::{snooze_deadline, Alert, NewAlert, SnoozeRequest};
use crate::AppState;

pub async fn list_alerts(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<Vec<Alert>>> {
    let alerts = state.store.list_alerts(auth_user.id).await?;
    Ok(Json(alerts))
}

pub async fn create_alert(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<NewAlert>,
) -> AppResult<(StatusCode, Json<Alert>)> {
    body.validate()?;
    let alert = state.store.create_alert(auth_user.id, body).await?;
    tracing::debug!(user_id = %auth_user.id, alert_id = %alert.id, kind = %alert.kind, "Alert created");
    Ok((StatusCode::CREATED, Json(alert)))
}

/// Unknown or already-dismissed ids succeed without effect.
pub async fn dismiss_alert(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(alert_id): Path<Uuid>,
) -> AppResult<Json<Value>> {
    state.store.dismiss_alert(auth_user.id, alert_id).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn snooze_alert(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(alert_id): Path<Uuid>,
    Json(body): Json<SnoozeRequest>,
) -> AppResult<Json<Value>> {
    let until = requested_snooze(&body, Utc::now(), state.config.default_snooze_minutes)?;
    state.store.snooze_alert(auth_user.id, alert_id, until).await?;
    Ok(Json(json!({ "success": true, "snoozed_until": until })))
}

/// An explicit `snooze_until` wins over `minutes`; with neither, the default applies.
fn requested_snooze(
    body: &SnoozeRequest,
    now: DateTime<Utc>,
    default_minutes: i64,
) -> AppResult<DateTime<Utc>> {
    let until = match (body.snooze_until, body.minutes) {
        (Some(until), _) => until,
        (None, minutes) => snooze_deadline(now, minutes.unwrap_or(default_minutes))?,
    };
    if until <= now {
        return Err(AppError::Validation("Snooze must end in the future".into()));
    }
    Ok(until)
}
