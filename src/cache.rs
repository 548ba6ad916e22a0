//! TTL cache contract and the ephemeral in-process backend.
//!
//! Two interchangeable backends implement [`Cache`]: `MemoryCache` here and
//! the durable Postgres-backed `PgCache` in `database.rs`. Cache values are
//! idempotent re-derivations of upstream truth, so concurrent population of
//! the same key is tolerated (last writer wins) and backend failures are
//! swallowed by callers, which fall back to a direct fetch.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// TTL used for facts that never change once observed (block timestamps,
/// finalized trade prices). Effectively permanent.
pub const PERMANENT_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 50);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: u64,
    pub expired_entries: u64,
    pub hits: u64,
    pub misses: u64,
}

/// A cache entry as found, with its expiry state exposed instead of hidden.
#[derive(Debug, Clone)]
pub struct CacheLookup {
    pub value: Value,
    pub expired: bool,
}

#[async_trait]
pub trait Cache: Send + Sync {
    /// Returns the value for `key`, or `None` if absent.
    ///
    /// An expired entry is deleted and reported as `None` unless
    /// `allow_stale` is set, in which case the value is returned anyway.
    async fn get(&self, key: &str, allow_stale: bool) -> Result<Option<Value>>;

    /// Returns the entry for `key` together with whether it has expired,
    /// without evicting anything. The stale-while-revalidate front reads
    /// through this so an expired entry survives long enough to be served
    /// stale while the refresh runs.
    async fn lookup(&self, key: &str) -> Result<Option<CacheLookup>>;

    /// Upsert with `expires_at = now + ttl`. Last writer wins.
    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<()>;

    /// Deletes everything; returns the number of entries removed.
    async fn clear(&self) -> Result<u64>;

    /// Deletes expired entries only; returns the number removed.
    async fn clear_expired(&self) -> Result<u64>;

    async fn stats(&self) -> Result<CacheStats>;
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: Value,
    expires_at: DateTime<Utc>,
}

/// In-process map backend. Does not survive restarts.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, MemoryEntry>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn expires_at(ttl: Duration) -> DateTime<Utc> {
        let ttl = ChronoDuration::from_std(ttl).unwrap_or(ChronoDuration::MAX);
        Utc::now().checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str, allow_stale: bool) -> Result<Option<Value>> {
        let expired = match self.entries.get(key) {
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return Ok(None);
            }
            Some(entry) => {
                if Utc::now() < entry.expires_at || allow_stale {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(Some(entry.value.clone()));
                }
                true
            }
        };
        // Expired and stale reads not allowed: evict on the way out.
        if expired {
            self.entries.remove(key);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        Ok(None)
    }

    async fn lookup(&self, key: &str) -> Result<Option<CacheLookup>> {
        match self.entries.get(key) {
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(CacheLookup {
                    value: entry.value.clone(),
                    expired: Utc::now() >= entry.expires_at,
                }))
            }
        }
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
        self.entries.insert(
            key.to_string(),
            MemoryEntry { value, expires_at: Self::expires_at(ttl) },
        );
        Ok(())
    }

    async fn clear(&self) -> Result<u64> {
        let count = self.entries.len() as u64;
        self.entries.clear();
        debug!("MemoryCache: cleared {} entries", count);
        Ok(count)
    }

    async fn clear_expired(&self) -> Result<u64> {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        let removed = (before - self.entries.len()) as u64;
        if removed > 0 {
            debug!("MemoryCache: evicted {} expired entries", removed);
        }
        Ok(removed)
    }

    async fn stats(&self) -> Result<CacheStats> {
        let now = Utc::now();
        let expired = self
            .entries
            .iter()
            .filter(|entry| entry.expires_at <= now)
            .count() as u64;
        Ok(CacheStats {
            entries: self.entries.len() as u64,
            expired_entries: expired,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        })
    }
}
