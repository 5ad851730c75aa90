use axum::{extract::State, Extension, Json};
use serde::Deserialize;
use validator::Validate;

use crate::auth::{
    jwt::{create_access_token, TokenResponse},
    middleware::AuthUser,
    password::{hash_password, verify_password},
};
use crate::error::{AppError, AppResult};
use crate::handlers::load_user;
use crate::models::user::{UpdatePreferencesRequest, User, UserProfile};
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,
    pub timezone: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

fn check_timezone(name: &str) -> AppResult<()> {
    name.parse::<chrono_tz::Tz>()
        .map(|_| ())
        .map_err(|_| AppError::Validation(format!("Unknown timezone: {name}")))
}

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> AppResult<Json<TokenResponse>> {
    body.validate()?;
    if let Some(tz) = body.timezone.as_deref() {
        check_timezone(tz)?;
    }
    let email = body.email.trim().to_lowercase();
    let pool = state.db.get().await?;

    let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE email = $1")
        .bind(&email)
        .fetch_one(&pool)
        .await?;
    if existing > 0 {
        return Err(AppError::Conflict("Email already registered".into()));
    }

    let pwd_hash = hash_password(&body.password)?;

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (email, password_hash, name, timezone, language)
        VALUES ($1, $2, $3, COALESCE($4, 'UTC'), COALESCE($5, 'en'))
        RETURNING *
        "#,
    )
    .bind(&email)
    .bind(&pwd_hash)
    .bind(body.name.trim())
    .bind(&body.timezone)
    .bind(&body.language)
    .fetch_one(&pool)
    .await?;

    tracing::info!(user_id = %user.id, "User registered");
    let token = create_access_token(user.id, &user.role, &state.config)?;
    Ok(Json(token))
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let pool = state.db.get().await?;
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(body.email.trim().to_lowercase())
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if !verify_password(&body.password, &user.password_hash)? {
        tracing::warn!(user_id = %user.id, "Failed login attempt");
        return Err(AppError::Unauthorized);
    }

    let token = create_access_token(user.id, &user.role, &state.config)?;
    Ok(Json(token))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<UserProfile>> {
    let user = load_user(&state, auth_user.id).await?;
    Ok(Json(user.into()))
}

pub async fn update_preferences(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<UpdatePreferencesRequest>,
) -> AppResult<Json<UserProfile>> {
    body.validate()?;
    if let Some(tz) = body.timezone.as_deref() {
        check_timezone(tz)?;
    }
    let pool = state.db.get().await?;

    let user = sqlx::query_as::<_, User>(
        r#"
        UPDATE users SET
            language = COALESCE($2, language),
            notifications = COALESCE($3, notifications),
            voice_alerts = COALESCE($4, voice_alerts),
            timezone = COALESCE($5, timezone),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(auth_user.id)
    .bind(&body.language)
    .bind(body.notifications)
    .bind(body.voice_alerts)
    .bind(&body.timezone)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("User not found".into()))?;

    Ok(Json(user.into()))
}
