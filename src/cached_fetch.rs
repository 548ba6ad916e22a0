//! Stale-while-revalidate front for expensive fetch pipelines.
//!
//! Handlers call [`serve_cached`]: a fresh cache hit is returned as-is; a
//! miss with a stale entry returns the stale value immediately and kicks off
//! a detached refresh whose failure is logged and swallowed; a miss with no
//! stale entry performs the fetch synchronously. [`with_deadline`] adds the
//! handler-level timeout that falls back to the last cached value instead of
//! waiting out a slow pipeline.

use crate::cache::{Cache, CacheLookup};
use crate::metrics;
use crate::types::Served;
use anyhow::Result;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// Cache read that swallows backend errors: the cache being down must never
/// fail a request, only force a direct fetch.
pub async fn get_quiet(cache: &Arc<dyn Cache>, key: &str, allow_stale: bool) -> Option<Value> {
    match cache.get(key, allow_stale).await {
        Ok(value) => value,
        Err(e) => {
            warn!("cache get failed for {} (ignored): {}", key, e);
            None
        }
    }
}

/// Non-evicting cache read that swallows backend errors, keeping the entry's
/// expiry state visible.
pub async fn lookup_quiet(cache: &Arc<dyn Cache>, key: &str) -> Option<CacheLookup> {
    match cache.lookup(key).await {
        Ok(found) => found,
        Err(e) => {
            warn!("cache lookup failed for {} (ignored): {}", key, e);
            None
        }
    }
}

/// Cache write that swallows backend errors.
pub async fn set_quiet(cache: &Arc<dyn Cache>, key: &str, value: Value, ttl: Duration) {
    if let Err(e) = cache.set(key, value, ttl).await {
        warn!("cache set failed for {} (ignored): {}", key, e);
    }
}

fn decode<T: DeserializeOwned>(key: &str, value: Value) -> Option<T> {
    match serde_json::from_value(value) {
        Ok(v) => Some(v),
        Err(e) => {
            // Shape changed between versions; treat as a miss.
            warn!("cache entry for {} failed to decode: {}", key, e);
            None
        }
    }
}

/// Serves `key` with stale-while-revalidate semantics.
///
/// An expired entry is served immediately, tagged `Stale`, while the refresh
/// runs detached; its failure is logged and swallowed, leaving the stale
/// value in place. Only when the cache holds nothing at all does a fetch
/// failure reach the caller.
pub async fn serve_cached<T, F, Fut>(
    cache: Arc<dyn Cache>,
    key: &str,
    ttl: Duration,
    fetch: F,
) -> Result<Served<T>>
where
    T: Serialize + DeserializeOwned + Send + 'static,
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    // One non-evicting read: a strict `get` would delete an expired entry
    // before it could be served stale.
    if let Some(hit) = lookup_quiet(&cache, key).await {
        if let Some(value) = decode::<T>(key, hit.value) {
            if !hit.expired {
                metrics::increment_cache_hit(key);
                return Ok(Served::fresh(value));
            }

            // Serve the expired entry now; refresh in the background. The
            // refresh owns its own error channel: log and swallow.
            metrics::increment_stale_served();
            let cache = Arc::clone(&cache);
            let key_owned = key.to_string();
            tokio::spawn(async move {
                match fetch().await {
                    Ok(fresh) => match serde_json::to_value(&fresh) {
                        Ok(raw) => {
                            set_quiet(&cache, &key_owned, raw, ttl).await;
                            metrics::increment_background_refresh("ok");
                            debug!("background refresh completed for {}", key_owned);
                        }
                        Err(e) => {
                            metrics::increment_background_refresh("encode_error");
                            warn!("background refresh for {} failed to encode: {}", key_owned, e);
                        }
                    },
                    Err(e) => {
                        metrics::increment_background_refresh("error");
                        warn!("background refresh for {} failed: {:#}", key_owned, e);
                    }
                }
            });
            return Ok(Served::stale(value));
        }
    }

    // Nothing cached (or undecodable): fetch synchronously.
    metrics::increment_cache_miss(key);
    let fresh = fetch().await?;
    if let Ok(raw) = serde_json::to_value(&fresh) {
        set_quiet(&cache, key, raw, ttl).await;
    }
    Ok(Served::fresh(fresh))
}

/// Wraps [`serve_cached`] in a handler deadline. If the budget elapses
/// before the pipeline completes, the last cached value is served tagged
/// `Fallback`; an error reaches the caller only when no cached value exists.
pub async fn with_deadline<T, F, Fut>(
    cache: Arc<dyn Cache>,
    key: &str,
    budget: Duration,
    ttl: Duration,
    fetch: F,
) -> Result<Served<T>>
where
    T: Serialize + DeserializeOwned + Send + 'static,
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    let attempt = timeout(
        budget,
        serve_cached(Arc::clone(&cache), key, ttl, fetch),
    )
    .await;

    let err = match attempt {
        Ok(Ok(served)) => return Ok(served),
        Ok(Err(e)) => e,
        Err(_) => anyhow::anyhow!("handler deadline of {:?} elapsed", budget),
    };

    if let Some(raw) = get_quiet(&cache, key, true).await {
        if let Some(value) = decode(key, raw) {
            warn!("{}: serving cached fallback after failure: {:#}", key, err);
            return Ok(Served::fallback(value));
        }
    }
    Err(err)
}
