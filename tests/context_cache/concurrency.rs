//! Concurrent access to one cache from many test threads.

use super::support::{CountingLoader, child, config, delegate};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use today_test_context::{
    ContextCache, ContextCacheConfig, ContextLoaderDelegate, DefaultContextLoaderDelegate,
    HierarchyMode,
};

#[test]
fn concurrent_first_loads_build_exactly_once() {
    const THREADS: usize = 16;

    let loader = CountingLoader::slow(Duration::from_millis(25));
    let delegate = Arc::new(DefaultContextLoaderDelegate::new(
        ContextCache::new(),
        Arc::clone(&loader),
    ));
    let key = config("SlowConfig");
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let delegate = Arc::clone(&delegate);
            let barrier = Arc::clone(&barrier);
            let key = key.clone();
            thread::spawn(move || {
                barrier.wait();
                delegate.load_context(&key).unwrap()
            })
        })
        .collect();

    let contexts: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(loader.loads(), 1);
    assert!(contexts.iter().all(|c| Arc::ptr_eq(c, &contexts[0])));
    assert_eq!(delegate.cache().miss_count(), 1);
    assert_eq!(delegate.cache().hit_count(), THREADS as u64 - 1);
}

#[test]
fn concurrent_children_share_one_parent() {
    const THREADS: usize = 8;

    let (delegate, loader) = delegate();
    let delegate = Arc::new(delegate);
    let root = config("RootConfig");
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let delegate = Arc::clone(&delegate);
            let barrier = Arc::clone(&barrier);
            let key = child(&format!("Child{}", i), &root);
            thread::spawn(move || {
                barrier.wait();
                delegate.load_context(&key).unwrap()
            })
        })
        .collect();

    let contexts: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let parent = contexts[0].parent.clone().unwrap();

    assert_eq!(loader.loads(), THREADS + 1);
    assert!(
        contexts
            .iter()
            .all(|c| Arc::ptr_eq(c.parent.as_ref().unwrap(), &parent))
    );
    assert_eq!(delegate.cache().size(), THREADS + 1);
}

#[test]
fn mixed_load_and_close_keep_the_cache_consistent() {
    const THREADS: usize = 8;
    const ROUNDS: usize = 50;

    let cache = ContextCacheConfig::builder().max_size(4).build();
    let (delegate, loader) = super::support::delegate_with(cache);
    let delegate = Arc::new(delegate);
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let delegate = Arc::clone(&delegate);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for round in 0..ROUNDS {
                    let key = config(&format!("Config{}", (t + round) % 6));
                    let context = delegate.load_context(&key).unwrap();
                    assert!(!context.name.is_empty());
                    if round % 7 == 0 {
                        delegate.close_context(&key, HierarchyMode::Exhaustive);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let stats = delegate.cache().statistics();
    assert!(stats.size <= 4);
    assert_eq!(stats.hit_count + stats.miss_count, (THREADS * ROUNDS) as u64);
    assert_eq!(stats.miss_count as usize, loader.loads());
    // every build is either still cached or has been closed
    assert_eq!(loader.loads(), stats.size + loader.closed().len());
}
