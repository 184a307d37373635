use sqlx::SqlitePool;

use crate::core::error::{AppError, Result};

/// Durable, append-only log of request timestamps.
///
/// Every read goes to the database; counts are never cached. SQLite's
/// single-writer lock serializes concurrent inserts, so no write is lost.
pub struct UsageStore {
    pool: SqlitePool,
}

impl UsageStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[cfg(test)]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Append one usage record. Duplicate timestamps are expected.
    pub async fn record(&self, timestamp: i64) -> Result<()> {
        sqlx::query("INSERT INTO api_usage (api_timestamp) VALUES (?)")
            .bind(timestamp)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to record API usage: {:?}", e);
                AppError::Database(e)
            })?;

        Ok(())
    }

    /// Number of records with `timestamp > cutoff`.
    pub async fn count_since(&self, cutoff: i64) -> Result<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM api_usage WHERE api_timestamp > ?")
                .bind(cutoff)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to count API usage: {:?}", e);
                    AppError::Database(e)
                })?;

        Ok(count.max(0) as u64)
    }

    /// Insert `timestamp` only if, for every `(cutoff, limit)` pair, fewer
    /// than `limit` records are newer than `cutoff`. Returns whether the
    /// record was written.
    ///
    /// This is a single statement, so SQLite takes the write lock before the
    /// counts are read and concurrent callers cannot both squeeze in under
    /// the same limit.
    pub async fn record_if_under_limits(&self, timestamp: i64, windows: &[(i64, u64)]) -> Result<bool> {
        let mut sql = String::from("INSERT INTO api_usage (api_timestamp) SELECT ? WHERE 1");
        for _ in windows {
            sql.push_str(" AND (SELECT COUNT(*) FROM api_usage WHERE api_timestamp > ?) < ?");
        }

        let mut query = sqlx::query(&sql).bind(timestamp);
        for (cutoff, limit) in windows {
            query = query
                .bind(*cutoff)
                .bind(i64::try_from(*limit).unwrap_or(i64::MAX));
        }

        let result = query.execute(&self.pool).await.map_err(|e| {
            tracing::error!("Failed to conditionally record API usage: {:?}", e);
            AppError::Database(e)
        })?;

        Ok(result.rows_affected() == 1)
    }

    /// Delete records with `timestamp <= cutoff`. Maintenance only; never
    /// called on the request path.
    pub async fn prune_older_than(&self, cutoff: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM api_usage WHERE api_timestamp <= ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to prune API usage: {:?}", e);
                AppError::Database(e)
            })?;

        Ok(result.rows_affected())
    }
}
