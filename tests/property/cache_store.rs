//! Property tests for the cache store.
//!
//! Invariants tested:
//! - A bounded cache of flat configurations never exceeds its bound
//! - Hits, misses and evictions match a simple LRU model
//! - Every context that leaves the cache is closed exactly once

use proptest::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use today_test_context::{
    ApplicationContext, BoxError, ContextCache, ContextCacheConfig, HierarchyMode,
    MergedContextConfiguration,
};

#[derive(Debug)]
struct CountedContext {
    closes: AtomicUsize,
    total_closes: Arc<AtomicUsize>,
}

impl ApplicationContext for CountedContext {
    fn close(&self) -> Result<(), BoxError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.total_closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum Op {
    Get(usize),
    Put(usize),
    Remove(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..8).prop_map(Op::Get),
        (0usize..8).prop_map(Op::Put),
        (0usize..8).prop_map(Op::Remove),
    ]
}

fn key(id: usize) -> MergedContextConfiguration {
    MergedContextConfiguration::builder()
        .location(format!("context-{}.xml", id))
        .build()
}

/// Recency-ordered model, least recently used first.
#[derive(Default)]
struct Model {
    entries: Vec<usize>,
    hits: u64,
    misses: u64,
    evictions: u64,
    closes: usize,
}

impl Model {
    fn touch(&mut self, id: usize) -> bool {
        match self.entries.iter().position(|e| *e == id) {
            Some(index) => {
                self.entries.remove(index);
                self.entries.push(id);
                true
            }
            None => false,
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: The cache behaves like an LRU map with close-on-removal
    #[test]
    fn cache_matches_lru_model(
        max_size in 1usize..5,
        ops in prop::collection::vec(op(), 1..60),
    ) {
        let total_closes = Arc::new(AtomicUsize::new(0));
        let cache: ContextCache<CountedContext> =
            ContextCacheConfig::builder().max_size(max_size).build();
        let mut model = Model::default();
        let mut handed_out = Vec::new();

        for op in ops {
            match op {
                Op::Get(id) => {
                    let found = cache.get(&key(id));
                    prop_assert_eq!(found.is_some(), model.touch(id));
                    if found.is_some() {
                        model.hits += 1;
                    } else {
                        model.misses += 1;
                    }
                }
                Op::Put(id) => {
                    let context = Arc::new(CountedContext {
                        closes: AtomicUsize::new(0),
                        total_closes: Arc::clone(&total_closes),
                    });
                    handed_out.push(Arc::clone(&context));
                    cache.put(key(id), context);

                    if model.touch(id) {
                        model.closes += 1;
                    } else {
                        model.entries.push(id);
                        if model.entries.len() > max_size {
                            model.entries.remove(0);
                            model.evictions += 1;
                            model.closes += 1;
                        }
                    }
                }
                Op::Remove(id) => {
                    cache.remove(&key(id), HierarchyMode::Exhaustive);
                    if let Some(index) = model.entries.iter().position(|e| *e == id) {
                        model.entries.remove(index);
                        model.closes += 1;
                    }
                }
            }

            prop_assert!(cache.size() <= max_size);
            prop_assert_eq!(cache.size(), model.entries.len());
        }

        for id in 0..8 {
            prop_assert_eq!(cache.contains(&key(id)), model.entries.contains(&id));
        }
        prop_assert_eq!(cache.hit_count(), model.hits);
        prop_assert_eq!(cache.miss_count(), model.misses);
        prop_assert_eq!(cache.eviction_count(), model.evictions);
        prop_assert_eq!(total_closes.load(Ordering::SeqCst), model.closes);
        prop_assert!(handed_out.iter().all(|c| c.closes.load(Ordering::SeqCst) <= 1));
    }

    /// Property: Clearing closes every cached context and keeps the counters
    #[test]
    fn clear_closes_what_is_cached(
        ids in prop::collection::vec(0usize..8, 0..20),
    ) {
        let total_closes = Arc::new(AtomicUsize::new(0));
        let cache: ContextCache<CountedContext> = ContextCache::new();

        for id in &ids {
            if cache.get(&key(*id)).is_none() {
                cache.put(key(*id), Arc::new(CountedContext {
                    closes: AtomicUsize::new(0),
                    total_closes: Arc::clone(&total_closes),
                }));
            }
        }
        let cached = cache.size();
        let before = cache.statistics();

        cache.clear();

        prop_assert_eq!(cache.size(), 0);
        prop_assert_eq!(total_closes.load(Ordering::SeqCst), cached);
        prop_assert_eq!(cache.hit_count(), before.hit_count);
        prop_assert_eq!(cache.miss_count(), before.miss_count);
        prop_assert_eq!(cache.hit_count() + cache.miss_count(), ids.len() as u64);
    }
}
