pub mod alerts;
pub mod auth;
pub mod health;
pub mod insights;
pub mod logs;
pub mod ws;

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::user::User;
use crate::AppState;

pub(crate) async fn load_user(state: &AppState, user_id: Uuid) -> AppResult<User> {
    let pool = state.db.get().await?;
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("User not found".into()))
}

/// The calendar day in the user's timezone.
pub(crate) fn local_today(user: &User) -> NaiveDate {
    Utc::now().with_timezone(&user.tz()).date_naive()
}
