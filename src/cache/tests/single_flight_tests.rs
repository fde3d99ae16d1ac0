//! Integration tests for the build-once guarantee
//!
//! Covers stampede protection, per-key independence, failure recovery,
//! invalidation during a build and snapshot replacement on expiry.

use futures::future::join_all;
use permscope_cache::CacheGuard;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Barrier, Notify};

const TTL: Duration = Duration::from_secs(300);

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_first_access_builds_once() {
    let cache: Arc<CacheGuard<String, Arc<Vec<u64>>>> = Arc::new(CacheGuard::new());
    let builds = Arc::new(AtomicUsize::new(0));

    let tasks = (0..32).map(|_| {
        let cache = Arc::clone(&cache);
        let builds = Arc::clone(&builds);
        tokio::spawn(async move {
            cache
                .get_or_build(&"en-US".to_string(), TTL, || async move {
                    builds.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok::<_, io::Error>(Arc::new((0..1_000).collect::<Vec<u64>>()))
                })
                .await
        })
    });

    let results: Vec<Arc<Vec<u64>>> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    assert_eq!(builds.load(Ordering::SeqCst), 1, "builder must run exactly once");
    assert_eq!(results.len(), 32);
    for value in &results {
        assert!(Arc::ptr_eq(value, &results[0]), "all callers share the same snapshot");
    }

    let stats = cache.stats();
    assert_eq!(stats.builds, 1);
    assert_eq!(stats.entries, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_different_keys_build_in_parallel() {
    let cache: Arc<CacheGuard<String, u32>> = Arc::new(CacheGuard::new());
    // Both builders must be inside their build step at the same time to pass
    // the barrier; a cache-wide lock would deadlock here.
    let barrier = Arc::new(Barrier::new(2));

    let tasks = ["en-US", "fr-FR"].into_iter().enumerate().map(|(i, locale)| {
        let cache = Arc::clone(&cache);
        let barrier = Arc::clone(&barrier);
        tokio::spawn(async move {
            cache
                .get_or_build(&locale.to_string(), TTL, || async move {
                    barrier.wait().await;
                    Ok::<_, io::Error>(i as u32)
                })
                .await
        })
    });

    let results = tokio::time::timeout(Duration::from_secs(5), join_all(tasks))
        .await
        .expect("builds for different keys must not serialize");

    let mut values: Vec<u32> = results.into_iter().map(|r| r.unwrap().unwrap()).collect();
    values.sort();
    assert_eq!(values, vec![0, 1]);
    assert_eq!(cache.stats().builds, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failed_build_lets_next_caller_retry() {
    let cache: Arc<CacheGuard<String, u32>> = Arc::new(CacheGuard::new());
    let attempts = Arc::new(AtomicUsize::new(0));

    let first = {
        let attempts = Arc::clone(&attempts);
        cache
            .get_or_build(&"en-US".to_string(), TTL, || async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(io::Error::new(io::ErrorKind::Other, "dataset unavailable"))
            })
            .await
    };
    assert!(first.is_err());
    assert!(cache.get(&"en-US".to_string()).is_none());

    let tasks = (0..8).map(|_| {
        let cache = Arc::clone(&cache);
        let attempts = Arc::clone(&attempts);
        tokio::spawn(async move {
            cache
                .get_or_build(&"en-US".to_string(), TTL, || async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok::<_, io::Error>(11)
                })
                .await
        })
    });

    for joined in join_all(tasks).await {
        assert_eq!(joined.unwrap().unwrap(), 11);
    }
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(cache.stats().build_failures, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_invalidate_during_build_keeps_single_builder() {
    let cache: Arc<CacheGuard<String, u32>> = Arc::new(CacheGuard::new());
    let key = "en-US".to_string();
    let builders = Arc::new(AtomicUsize::new(0));
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());

    let first = {
        let cache = Arc::clone(&cache);
        let key = key.clone();
        let builders = Arc::clone(&builders);
        let started = Arc::clone(&started);
        let release = Arc::clone(&release);
        tokio::spawn(async move {
            cache
                .get_or_build(&key, TTL, || async move {
                    builders.fetch_add(1, Ordering::SeqCst);
                    started.notify_one();
                    release.notified().await;
                    Ok::<_, io::Error>(1)
                })
                .await
        })
    };

    started.notified().await;
    assert!(!cache.invalidate(&key), "a build in flight is not dropped");
    cache.clear();

    let second = {
        let cache = Arc::clone(&cache);
        let key = key.clone();
        let builders = Arc::clone(&builders);
        tokio::spawn(async move {
            cache
                .get_or_build(&key, TTL, || async move {
                    builders.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, io::Error>(2)
                })
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(builders.load(Ordering::SeqCst), 1, "second caller must wait on the running build");

    release.notify_one();
    assert_eq!(first.await.unwrap().unwrap(), 1);
    assert_eq!(second.await.unwrap().unwrap(), 1);
    assert_eq!(builders.load(Ordering::SeqCst), 1);
    assert_eq!(cache.stats().builds, 1);

    // Once ready, invalidation drops the entry and the next caller rebuilds.
    assert!(cache.invalidate(&key));
    let rebuilt = cache
        .get_or_build(&key, TTL, || async { Ok::<_, io::Error>(3) })
        .await
        .unwrap();
    assert_eq!(rebuilt, 3);
}

#[tokio::test]
async fn test_expiry_publishes_new_snapshot() {
    let cache: CacheGuard<String, Arc<String>> = CacheGuard::new();
    let ttl = Duration::from_millis(40);
    let key = "en-US".to_string();

    let old = cache
        .get_or_build(&key, ttl, || async { Ok::<_, io::Error>(Arc::new("v1".to_string())) })
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(80)).await;

    let new = cache
        .get_or_build(&key, ttl, || async { Ok::<_, io::Error>(Arc::new("v2".to_string())) })
        .await
        .unwrap();

    // Holders of the previous snapshot keep a valid value.
    assert_eq!(old.as_str(), "v1");
    assert_eq!(new.as_str(), "v2");
    assert!(!Arc::ptr_eq(&old, &new));
}

#[test]
fn test_blocking_callers_via_block_on() {
    let cache: CacheGuard<u8, &'static str> = CacheGuard::new();

    let value = tokio_test::block_on(cache.get_or_build(&1, TTL, || async {
        Ok::<_, io::Error>("ready")
    }))
    .unwrap();

    assert_eq!(value, "ready");
    assert_eq!(cache.get(&1), Some("ready"));
}
