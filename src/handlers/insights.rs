use axum::{extract::State, Extension, Json};
use chrono::Utc;

use crate::auth::middleware::AuthUser;
use crate::db::{into_medication, into_mood, into_sleep, into_water, AchievementStore, LogStore};
use crate::error::AppResult;
use crate::handlers::{load_user, local_today};
use crate::models::log::{DateRange, LogKind};
use crate::services::achievements::{achievements, with_first_unlocks, Achievement};
use crate::services::recommendations::{recommendations, Recommendation};
use crate::AppState;

pub async fn get_recommendations(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<Vec<Recommendation>>> {
    let user = load_user(&state, auth_user.id).await?;
    let today = local_today(&user);
    let week = DateRange::trailing_week(today);

    let (medications, sleep_logs, water_today, moods) = tokio::try_join!(
        state.store.find_logs(LogKind::Medication, user.id, week),
        state.store.find_logs(LogKind::Sleep, user.id, week),
        state.store.find_logs(LogKind::Water, user.id, DateRange::day(today)),
        state.store.find_logs(LogKind::Mood, user.id, week),
    )?;

    Ok(Json(recommendations(
        &into_medication(medications),
        &into_sleep(sleep_logs),
        &into_water(water_today),
        &into_mood(moods),
    )))
}

pub async fn get_achievements(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<Vec<Achievement>>> {
    let user = load_user(&state, auth_user.id).await?;
    let week = DateRange::trailing_week(local_today(&user));

    let (medications, sleep_logs, water_logs) = tokio::try_join!(
        state.store.find_logs(LogKind::Medication, user.id, week),
        state.store.find_logs(LogKind::Sleep, user.id, week),
        state.store.find_logs(LogKind::Water, user.id, week),
    )?;

    let unlocked = achievements(
        &into_medication(medications),
        &into_sleep(sleep_logs),
        &into_water(water_logs),
        Utc::now(),
    );
    let ids: Vec<String> = unlocked.iter().map(|a| a.id.clone()).collect();
    let first_unlocks = state.store.record_unlocks(user.id, &ids).await?;

    Ok(Json(with_first_unlocks(unlocked, &first_unlocks)))
}
