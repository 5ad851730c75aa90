use axum::{
    middleware,
    routing::{get, patch, post, put},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

mod auth;
mod config;
mod db;
mod error;
mod handlers;
mod models;
mod services;

use auth::rate_limit::RateLimitState;
use config::Config;
use db::{HealthStore, LazyPool, PgStore};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<LazyPool>,
    pub store: Arc<dyn HealthStore>,
    pub config: Arc<Config>,
    pub rate_limiter: RateLimitState,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let db = Arc::new(LazyPool::new(config.database_url.clone()));
        let store = Arc::new(PgStore::new(db.clone()));
        Self::with_store(config, db, store)
    }

    /// Accounts always live in Postgres; health data goes through `store`.
    pub fn with_store(config: Config, db: Arc<LazyPool>, store: Arc<dyn HealthStore>) -> Self {
        Self {
            db,
            store,
            config: Arc::new(config),
            rate_limiter: RateLimitState::default(),
        }
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "healthmate_api=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    let config = Config::from_env();
    let addr = config.listen_addr();
    let state = AppState::new(config);

    let pool = state
        .db
        .get()
        .await
        .expect("Failed to connect to the database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    state.rate_limiter.spawn_cleanup(Duration::from_secs(300));

    let cors = cors_layer(&state.config);
    let app = build_router(state, cors);

    tracing::info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    // Connect info feeds the per-IP rate limiter.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .unwrap();
}

fn build_router(state: AppState, cors: CorsLayer) -> Router {
    let auth_routes = Router::new()
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::rate_limit::rate_limit_auth,
        ));

    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/readyz", get(handlers::health::readyz))
        .route("/ws", get(handlers::ws::ws_handler))
        .merge(auth_routes);

    let protected_routes = Router::new()
        .route("/api/me", get(handlers::auth::me))
        .route("/api/me/preferences", put(handlers::auth::update_preferences))
        // Health logs
        .route(
            "/api/health/medication",
            post(handlers::logs::create_medication).get(handlers::logs::list_medications),
        )
        .route(
            "/api/health/medication/:id",
            patch(handlers::logs::update_medication_status),
        )
        .route(
            "/api/health/sleep",
            post(handlers::logs::create_sleep).get(handlers::logs::list_sleep),
        )
        .route(
            "/api/health/mood",
            post(handlers::logs::create_mood).get(handlers::logs::list_moods),
        )
        .route(
            "/api/health/water",
            post(handlers::logs::create_water).get(handlers::logs::water_for_day),
        )
        // Alerts
        .route(
            "/api/alerts",
            get(handlers::alerts::list_alerts).post(handlers::alerts::create_alert),
        )
        .route("/api/alerts/:id/dismiss", patch(handlers::alerts::dismiss_alert))
        .route("/api/alerts/:id/snooze", patch(handlers::alerts::snooze_alert))
        // Insights
        .route(
            "/api/insights/recommendations",
            get(handlers::insights::get_recommendations),
        )
        .route(
            "/api/insights/achievements",
            get(handlers::insights::get_achievements),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::middleware::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let mut origins: Vec<axum::http::HeaderValue> = Vec::new();
    match config.frontend_url.parse::<axum::http::HeaderValue>() {
        Ok(hv) => origins.push(hv),
        Err(_) => tracing::warn!(origin = %config.frontend_url, "Invalid FRONTEND_URL, skipping"),
    }
    // Extra origins, e.g. LAN devices in development
    if let Ok(extra) = std::env::var("CORS_EXTRA_ORIGINS") {
        for o in extra.split(',') {
            if let Ok(hv) = o.trim().parse::<axum::http::HeaderValue>() {
                origins.push(hv);
            }
        }
    }

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::PATCH,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
        ])
        .allow_credentials(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::auth::jwt::create_access_token;
    use crate::db::memory::MemoryStore;

    fn app() -> Router {
        let mut config = Config::for_tests();
        // Nothing listens here; the pool is only created on first use.
        config.database_url = "postgres://127.0.0.1:1/none".into();
        build_router(AppState::new(config), CorsLayer::new())
    }

    #[tokio::test]
    async fn test_health_reports_service() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["service"], "healthmate-api");
    }

    #[tokio::test]
    async fn test_readyz_without_database_is_unavailable() {
        let response = app()
            .oneshot(Request::get("/readyz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_protected_routes_require_bearer_token() {
        for uri in ["/api/alerts", "/api/health/medication", "/api/insights/achievements"] {
            let response = app()
                .oneshot(Request::get(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_invalid_token_is_rejected() {
        let response = app()
            .oneshot(
                Request::get("/api/me")
                    .header("Authorization", "Bearer not-a-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], 401);
    }

    /// A router whose health data lives in memory, plus a token for one user.
    fn memory_app() -> (Router, String) {
        let mut config = Config::for_tests();
        config.database_url = "postgres://127.0.0.1:1/none".into();
        let token = create_access_token(Uuid::new_v4(), "patient", &config)
            .unwrap()
            .access_token;
        let db = Arc::new(LazyPool::new(config.database_url.clone()));
        let state = AppState::with_store(config, db, Arc::new(MemoryStore::new()));
        (build_router(state, CorsLayer::new()), token)
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        token: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header(CONTENT_TYPE, "application/json")
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_water_logs_total_for_the_day() {
        let (app, token) = memory_app();

        for amount in [500, 1000] {
            let (status, body) = send(
                &app,
                "POST",
                "/api/health/water",
                &token,
                Some(json!({ "amount": amount, "date": "2026-03-10" })),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
            assert_eq!(body["kind"], "water");
        }
        send(
            &app,
            "POST",
            "/api/health/water",
            &token,
            Some(json!({ "amount": 250, "date": "2026-03-09" })),
        )
        .await;

        let (status, body) = send(&app, "GET", "/api/health/water?date=2026-03-10", &token, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_amount"], 1500);
        assert_eq!(body["logs"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_water_amount_is_validated() {
        let (app, token) = memory_app();
        let (status, _) = send(
            &app,
            "POST",
            "/api/health/water",
            &token,
            Some(json!({ "amount": 0, "date": "2026-03-10" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_medication_status_lifecycle() {
        let (app, token) = memory_app();
        let (status, created) = send(
            &app,
            "POST",
            "/api/health/medication",
            &token,
            Some(json!({ "medication_name": "Aspirin", "time": "08:00:00", "date": "2026-03-10" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["status"], "pending");
        let uri = format!("/api/health/medication/{}", created["id"].as_str().unwrap());

        let (status, _) = send(&app, "PATCH", &uri, &token, Some(json!({ "status": "pending" }))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, body) = send(&app, "PATCH", &uri, &token, Some(json!({ "status": "taken" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "taken");

        let (status, _) = send(&app, "PATCH", &uri, &token, Some(json!({ "status": "missed" }))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let unknown = format!("/api/health/medication/{}", Uuid::new_v4());
        let (status, _) = send(&app, "PATCH", &unknown, &token, Some(json!({ "status": "taken" }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_alert_create_dismiss_and_snooze() {
        let (app, token) = memory_app();
        let (status, alert) = send(
            &app,
            "POST",
            "/api/alerts",
            &token,
            Some(json!({ "type": "water", "message": "Drink a glass of water" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = alert["id"].as_str().unwrap().to_string();

        let (status, _) = send(
            &app,
            "PATCH",
            &format!("/api/alerts/{id}/snooze"),
            &token,
            Some(json!({ "minutes": i64::MAX })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, body) = send(&app, "GET", "/api/alerts", &token, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert!(body[0]["snoozed_until"].is_null());

        let (status, _) = send(&app, "PATCH", &format!("/api/alerts/{id}/dismiss"), &token, None).await;
        assert_eq!(status, StatusCode::OK);
        // Dismissing twice is a no-op.
        let (status, _) = send(&app, "PATCH", &format!("/api/alerts/{id}/dismiss"), &token, None).await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = send(&app, "GET", "/api/alerts", &token, None).await;
        assert!(body.as_array().unwrap().is_empty());
    }
}
