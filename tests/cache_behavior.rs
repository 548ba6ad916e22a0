//! TTL and stale-read semantics of the in-process cache backend.

use nft_market_sdk::cache::{Cache, MemoryCache};
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn fresh_entry_round_trips() {
    let cache = MemoryCache::new();
    cache
        .set("k", json!({"v": 1}), Duration::from_secs(60))
        .await
        .unwrap();
    let got = cache.get("k", false).await.unwrap();
    assert_eq!(got, Some(json!({"v": 1})));
}

#[tokio::test]
async fn expired_entry_is_a_miss_but_stale_readable() {
    let cache = MemoryCache::new();
    cache
        .set("k", json!(42), Duration::from_millis(10))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    // Stale read first: the strict read below evicts the entry.
    assert_eq!(cache.get("k", true).await.unwrap(), Some(json!(42)));
    assert_eq!(cache.get("k", false).await.unwrap(), None);
    // Strict miss evicted it, so even stale reads now come up empty.
    assert_eq!(cache.get("k", true).await.unwrap(), None);
}

#[tokio::test]
async fn lookup_reports_expiry_without_evicting() {
    let cache = MemoryCache::new();
    cache
        .set("k", json!(42), Duration::from_millis(10))
        .await
        .unwrap();

    let live = cache.lookup("k").await.unwrap().unwrap();
    assert!(!live.expired);
    assert_eq!(live.value, json!(42));

    tokio::time::sleep(Duration::from_millis(30)).await;

    // Expired entries stay readable through lookup, repeatedly.
    let expired = cache.lookup("k").await.unwrap().unwrap();
    assert!(expired.expired);
    assert_eq!(expired.value, json!(42));
    assert!(cache.lookup("k").await.unwrap().is_some());
    assert_eq!(cache.get("k", true).await.unwrap(), Some(json!(42)));

    assert!(cache.lookup("absent").await.unwrap().is_none());
}

#[tokio::test]
async fn clear_expired_keeps_live_entries() {
    let cache = MemoryCache::new();
    cache
        .set("live", json!(1), Duration::from_secs(60))
        .await
        .unwrap();
    cache
        .set("dead", json!(2), Duration::from_millis(5))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let removed = cache.clear_expired().await.unwrap();
    assert_eq!(removed, 1);
    assert_eq!(cache.get("live", false).await.unwrap(), Some(json!(1)));

    let stats = cache.stats().await.unwrap();
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.expired_entries, 0);
}

#[tokio::test]
async fn stats_track_hits_and_misses() {
    let cache = MemoryCache::new();
    cache
        .set("k", json!(true), Duration::from_secs(60))
        .await
        .unwrap();
    cache.get("k", false).await.unwrap();
    cache.get("absent", false).await.unwrap();

    let stats = cache.stats().await.unwrap();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
}
