use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::sync::Mutex;

use crate::error::{AppError, AppResult};

/// Owned, lazily-connected database handle.
///
/// The pool is created on first use and health-checked before every reuse;
/// a failed check drops it so the next caller reconnects.
pub struct LazyPool {
    database_url: String,
    pool: Mutex<Option<PgPool>>,
}

impl LazyPool {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            pool: Mutex::new(None),
        }
    }

    pub async fn get(&self) -> AppResult<PgPool> {
        let cached = self.pool.lock().await.clone();
        if let Some(pool) = cached {
            match ping(&pool).await {
                Ok(()) => return Ok(pool),
                Err(e) => {
                    tracing::warn!(error = %e, "Database health check failed, reconnecting");
                    pool.close().await;
                }
            }
        }

        let mut guard = self.pool.lock().await;
        let pool = create_pool(&self.database_url)
            .await
            .map_err(|e| AppError::Unavailable(format!("database connect failed: {e}")))?;
        tracing::info!("Connected to database");
        *guard = Some(pool.clone());
        Ok(pool)
    }

    /// Readiness probe; never reconnects.
    pub async fn is_healthy(&self) -> bool {
        let cached = self.pool.lock().await.clone();
        match cached {
            Some(pool) => ping(&pool).await.is_ok(),
            None => false,
        }
    }
}

async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await
        .map(|_| ())
}

async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(database_url)
        .await
}
