use std::sync::Arc;

use sqlx::SqlitePool;
use tempfile::TempDir;

use crate::core::config::{DatabaseConfig, RateLimitConfig};
use crate::core::database;
use crate::features::rate_limits::models::{EnforcementMode, RecordUsageOn};
use crate::features::rate_limits::RateLimiter;
use crate::features::usage::UsageStore;

/// Migrated SQLite database in a temporary directory. Keep the `TempDir`
/// alive for as long as the pool is used.
pub async fn create_test_pool() -> (SqlitePool, TempDir) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let config = DatabaseConfig {
        url: format!("sqlite://{}", dir.path().join("usage.db").display()),
        max_connections: 8,
        acquire_timeout_secs: 30,
        busy_timeout_secs: 30,
    };

    let pool = database::create_pool(&config)
        .await
        .expect("failed to open test database");
    database::run_migrations(&pool)
        .await
        .expect("failed to migrate test database");

    (pool, dir)
}

pub async fn create_test_store() -> (Arc<UsageStore>, TempDir) {
    let (pool, dir) = create_test_pool().await;
    (Arc::new(UsageStore::new(pool)), dir)
}

pub fn limits(hourly: Option<u64>, daily: Option<u64>) -> RateLimitConfig {
    RateLimitConfig {
        hourly_limit: hourly,
        daily_limit: daily,
        mode: EnforcementMode::Soft,
        record_on: RecordUsageOn::Success,
    }
}

pub fn create_test_limiter(store: &Arc<UsageStore>, config: RateLimitConfig) -> Arc<RateLimiter> {
    Arc::new(RateLimiter::new(config, Arc::clone(store)))
}
