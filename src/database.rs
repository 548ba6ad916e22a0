//! PostgreSQL integration: connection bootstrap and the durable cache
//! backend.
//!
//! The durable backend is an opaque key/value table with an expiry column
//! and an index on it so `clear_expired` stays a range delete. Values are
//! stored as JSON text; the cache contract is identical to `MemoryCache`.

use crate::cache::{Cache, CacheLookup, CacheStats};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use log::{info, warn};
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, Pool, Postgres, Row};
use std::env;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// PostgreSQL connection pool type alias.
pub type DbPool = Pool<Postgres>;

/// Database schema name.
pub const SCHEMA: &str = "nft_market";

/// Connects to `DATABASE_URL` with bounded retries, then ensures the cache
/// schema exists. Retries cover DNS/startup races when the database comes up
/// alongside the process.
pub async fn connect() -> Result<DbPool> {
    let database_url =
        env::var("DATABASE_URL").map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;

    let max_attempts: u32 = 5;
    let mut last_err: Option<anyhow::Error> = None;
    for attempt in 1..=max_attempts {
        match PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect(&database_url)
            .await
        {
            Ok(pool) => {
                info!("connected to database (attempt {}/{})", attempt, max_attempts);
                ensure_schema(&pool).await?;
                return Ok(pool);
            }
            Err(e) => {
                warn!(
                    "database connect attempt {}/{} failed: {}",
                    attempt, max_attempts, e
                );
                last_err = Some(e.into());
                tokio::time::sleep(Duration::from_millis(500 * attempt as u64)).await;
            }
        }
    }
    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("database connection failed")))
}

async fn ensure_schema(pool: &DbPool) -> Result<()> {
    sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", SCHEMA))
        .execute(pool)
        .await?;
    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {}.cache_entries (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            expires_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
        SCHEMA
    ))
    .execute(pool)
    .await?;
    // Range index so clear_expired never scans live entries.
    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS cache_entries_expires_at_idx
         ON {}.cache_entries (expires_at)",
        SCHEMA
    ))
    .execute(pool)
    .await?;
    Ok(())
}

/// Durable cache backend. Survives process restarts.
pub struct PgCache {
    pool: DbPool,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl PgCache {
    pub fn new(pool: DbPool) -> Self {
        Self { pool, hits: AtomicU64::new(0), misses: AtomicU64::new(0) }
    }

    fn expires_at(ttl: Duration) -> DateTime<Utc> {
        let ttl = ChronoDuration::from_std(ttl).unwrap_or(ChronoDuration::MAX);
        Utc::now().checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

#[async_trait]
impl Cache for PgCache {
    async fn get(&self, key: &str, allow_stale: bool) -> Result<Option<Value>> {
        let row = sqlx::query(&format!(
            "SELECT value, expires_at FROM {}.cache_entries WHERE key = $1",
            SCHEMA
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        };

        let expires_at: DateTime<Utc> = row.try_get("expires_at")?;
        if Utc::now() >= expires_at && !allow_stale {
            sqlx::query(&format!(
                "DELETE FROM {}.cache_entries WHERE key = $1",
                SCHEMA
            ))
            .bind(key)
            .execute(&self.pool)
            .await?;
            self.misses.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        }

        let raw: String = row.try_get("value")?;
        let value = serde_json::from_str(&raw)?;
        self.hits.fetch_add(1, Ordering::Relaxed);
        Ok(Some(value))
    }

    async fn lookup(&self, key: &str) -> Result<Option<CacheLookup>> {
        let row = sqlx::query(&format!(
            "SELECT value, expires_at FROM {}.cache_entries WHERE key = $1",
            SCHEMA
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        };

        let expires_at: DateTime<Utc> = row.try_get("expires_at")?;
        let raw: String = row.try_get("value")?;
        let value = serde_json::from_str(&raw)?;
        self.hits.fetch_add(1, Ordering::Relaxed);
        Ok(Some(CacheLookup { value, expired: Utc::now() >= expires_at }))
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO {}.cache_entries (key, value, expires_at, updated_at)
             VALUES ($1, $2, $3, NOW())
             ON CONFLICT (key) DO UPDATE
             SET value = EXCLUDED.value,
                 expires_at = EXCLUDED.expires_at,
                 updated_at = NOW()",
            SCHEMA
        ))
        .bind(key)
        .bind(serde_json::to_string(&value)?)
        .bind(Self::expires_at(ttl))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn clear(&self) -> Result<u64> {
        let result = sqlx::query(&format!("DELETE FROM {}.cache_entries", SCHEMA))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn clear_expired(&self) -> Result<u64> {
        let result = sqlx::query(&format!(
            "DELETE FROM {}.cache_entries WHERE expires_at <= NOW()",
            SCHEMA
        ))
        .execute(&self.pool)
        .await?;
        let removed = result.rows_affected();
        if removed > 0 {
            info!("PgCache: evicted {} expired entries", removed);
        }
        Ok(removed)
    }

    async fn stats(&self) -> Result<CacheStats> {
        let row = sqlx::query(&format!(
            "SELECT COUNT(*) AS total,
                    COUNT(*) FILTER (WHERE expires_at <= NOW()) AS expired
             FROM {}.cache_entries",
            SCHEMA
        ))
        .fetch_one(&self.pool)
        .await?;
        let total: i64 = row.try_get("total")?;
        let expired: i64 = row.try_get("expired")?;
        Ok(CacheStats {
            entries: total.max(0) as u64,
            expired_entries: expired.max(0) as u64,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        })
    }
}
