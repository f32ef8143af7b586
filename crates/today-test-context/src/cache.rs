//! The context cache store.

use crate::config::ContextCacheConfig;
use crate::context::ApplicationContext;
use crate::events::{ContextCacheEvent, RemovalCause};
use crate::hierarchy::HierarchyMode;
use crate::key::MergedContextConfiguration;
use crate::stats::CacheStatistics;
use lru::LruCache;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use today_test_core::EventListeners;

#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

#[cfg(feature = "tracing")]
use tracing::{debug, info, warn};

type Key = MergedContextConfiguration;

/// Mutable state behind the cache lock.
struct CacheState<C> {
    /// Recency-ordered contexts. Unbounded: the size bound is enforced by
    /// [`CacheGuard`] so that evictions can cascade.
    contexts: LruCache<Key, Arc<C>>,
    /// Parent configuration to child configurations, in registration order.
    ///
    /// A configuration stays linked to its parent while it is cached or has
    /// linked children of its own, so an exhaustive removal still reaches
    /// grandchildren through an intermediate level that is not cached.
    hierarchy: HashMap<Key, Vec<Key>>,
    hit_count: u64,
    miss_count: u64,
    eviction_count: u64,
}

impl<C> CacheState<C> {
    fn new() -> Self {
        Self {
            contexts: LruCache::unbounded(),
            hierarchy: HashMap::new(),
            hit_count: 0,
            miss_count: 0,
            eviction_count: 0,
        }
    }
}

/// A thread-safe cache of application contexts keyed by
/// [`MergedContextConfiguration`].
///
/// `ContextCache` is a cheap handle: clones share the same store. Each
/// operation takes the cache lock for its whole duration; use
/// [`lock`](Self::lock) to run several operations as one atomic step.
///
/// The cache owns the lifecycle of the contexts stored in it. Removal,
/// eviction and [`clear`](Self::clear) close contexts; callers only ever
/// receive shared references.
///
/// There is no hidden global instance. A test suite that wants one cache for
/// the whole process creates it once at its composition root:
///
/// ```
/// use std::sync::LazyLock;
/// use today_test_context::{ApplicationContext, BoxError, ContextCache, ContextCacheConfig};
///
/// struct AppContext;
///
/// impl ApplicationContext for AppContext {
///     fn close(&self) -> Result<(), BoxError> {
///         Ok(())
///     }
/// }
///
/// static CONTEXT_CACHE: LazyLock<ContextCache<AppContext>> = LazyLock::new(|| {
///     ContextCacheConfig::builder()
///         .name("suite")
///         .max_size(32)
///         .build()
/// });
///
/// assert_eq!(CONTEXT_CACHE.size(), 0);
/// ```
pub struct ContextCache<C> {
    state: Arc<Mutex<CacheState<C>>>,
    config: Arc<ContextCacheConfig>,
}

impl<C> Clone for ContextCache<C> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            config: Arc::clone(&self.config),
        }
    }
}

impl<C: ApplicationContext> ContextCache<C> {
    /// Creates an unnamed, unbounded cache.
    pub fn new() -> Self {
        Self::with_config(ContextCacheConfig::builder().into_config())
    }

    /// Creates an empty cache with the given configuration.
    pub fn with_config(config: ContextCacheConfig) -> Self {
        #[cfg(feature = "metrics")]
        {
            describe_counter!(
                "context_cache_requests_total",
                "Total number of context cache lookups (hits and misses)"
            );
            describe_counter!(
                "context_cache_evictions_total",
                "Total number of contexts evicted by the size bound"
            );
            describe_counter!(
                "context_cache_load_failures_total",
                "Total number of failed context loads"
            );
            describe_gauge!("context_cache_size", "Current number of cached contexts");
            describe_histogram!(
                "context_cache_load_duration_seconds",
                "Time spent building contexts on cache misses"
            );
        }

        Self {
            state: Arc::new(Mutex::new(CacheState::new())),
            config: Arc::new(config),
        }
    }

    /// The configuration this cache was built with.
    pub fn config(&self) -> &ContextCacheConfig {
        &self.config
    }

    /// Name of this cache.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Acquires the cache lock.
    ///
    /// The lock is held until the guard is dropped. Events raised through the
    /// guard are delivered to listeners after the lock has been released, so
    /// listeners may use the cache. A poisoned lock is recovered: the store is
    /// only mutated once a context has been built successfully.
    pub fn lock(&self) -> CacheGuard<'_, C> {
        CacheGuard {
            state: self.state.lock().unwrap_or_else(PoisonError::into_inner),
            config: &self.config,
            events: PendingEvents {
                listeners: &self.config.event_listeners,
                events: Vec::new(),
            },
        }
    }

    /// Returns the cached context for `key`, counting a hit or a miss.
    ///
    /// Never builds a context.
    pub fn get(&self, key: &MergedContextConfiguration) -> Option<Arc<C>> {
        self.lock().get(key)
    }

    /// Stores `context` under `key`, replacing any previous entry.
    pub fn put(&self, key: MergedContextConfiguration, context: Arc<C>) {
        self.lock().put(key, context)
    }

    /// Returns true if a context is cached for `key`.
    pub fn contains(&self, key: &MergedContextConfiguration) -> bool {
        self.lock().contains(key)
    }

    /// Removes and closes the context for `key`, cascading according to `mode`.
    pub fn remove(&self, key: &MergedContextConfiguration, mode: HierarchyMode) {
        self.lock().remove(key, mode)
    }

    /// Closes and removes every cached context. Statistics are kept.
    pub fn clear(&self) {
        self.lock().clear()
    }

    /// Number of cached contexts.
    pub fn size(&self) -> usize {
        self.lock().size()
    }

    /// Configured size bound, `None` when unbounded.
    pub fn max_size(&self) -> Option<usize> {
        self.config.max_size()
    }

    /// Number of configurations that currently have linked children.
    pub fn parent_context_count(&self) -> usize {
        self.lock().parent_context_count()
    }

    /// Lookups that found a context.
    pub fn hit_count(&self) -> u64 {
        self.lock().state.hit_count
    }

    /// Lookups that found nothing.
    pub fn miss_count(&self) -> u64 {
        self.lock().state.miss_count
    }

    /// Contexts evicted by the size bound.
    pub fn eviction_count(&self) -> u64 {
        self.lock().state.eviction_count
    }

    /// Snapshot of the cache counters.
    pub fn statistics(&self) -> CacheStatistics {
        self.lock().statistics()
    }

    /// Logs the current statistics at debug level.
    ///
    /// Does nothing unless the `tracing` feature is enabled.
    pub fn log_statistics(&self) {
        self.lock().log_statistics()
    }
}

impl<C: ApplicationContext> Default for ContextCache<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for ContextCache<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextCache")
            .field("name", &self.config.name)
            .field("max_size", &self.config.max_size())
            .finish_non_exhaustive()
    }
}

/// Events collected while the cache lock is held.
///
/// Declared after the `MutexGuard` in [`CacheGuard`], so it drops after the
/// lock is released and only then delivers its events.
struct PendingEvents<'a> {
    listeners: &'a EventListeners<ContextCacheEvent>,
    events: Vec<ContextCacheEvent>,
}

impl Drop for PendingEvents<'_> {
    fn drop(&mut self) {
        // a listener panic while unwinding would abort
        if std::thread::panicking() {
            return;
        }
        for event in self.events.drain(..) {
            self.listeners.emit(&event);
        }
    }
}

/// Exclusive access to a [`ContextCache`], obtained from [`ContextCache::lock`].
///
/// All operations on one guard form a single atomic sequence with respect to
/// other users of the cache.
pub struct CacheGuard<'a, C> {
    state: MutexGuard<'a, CacheState<C>>,
    config: &'a ContextCacheConfig,
    events: PendingEvents<'a>,
}

impl<C: ApplicationContext> CacheGuard<'_, C> {
    /// Returns true if a context is cached for `key`.
    ///
    /// Does not count as a lookup and does not refresh recency.
    pub fn contains(&self, key: &MergedContextConfiguration) -> bool {
        self.state.contexts.contains(key)
    }

    /// Returns the cached context for `key`, counting a hit or a miss and
    /// marking the entry as most recently used.
    pub fn get(&mut self, key: &MergedContextConfiguration) -> Option<Arc<C>> {
        let found = self.state.contexts.get(key).map(Arc::clone);

        #[cfg(feature = "metrics")]
        {
            let result = if found.is_some() { "hit" } else { "miss" };
            counter!("context_cache_requests_total", "cache" => self.config.name.clone(), "result" => result)
                .increment(1);
        }

        if found.is_some() {
            self.state.hit_count += 1;

            #[cfg(feature = "tracing")]
            debug!(cache = %self.config.name, key = %key, "retrieved context from cache");

            self.record(|cache_name| ContextCacheEvent::Hit {
                cache_name,
                key: key.to_string(),
                timestamp: Instant::now(),
            });
        } else {
            self.state.miss_count += 1;

            #[cfg(feature = "tracing")]
            debug!(cache = %self.config.name, key = %key, "context cache miss");

            self.record(|cache_name| ContextCacheEvent::Miss {
                cache_name,
                key: key.to_string(),
                timestamp: Instant::now(),
            });
        }

        found
    }

    /// Stores `context` under `key`.
    ///
    /// Last write wins: a different context previously stored under an equal
    /// key is closed. If the cache then exceeds its size bound, least recently
    /// used contexts are evicted together with their cached descendants. The
    /// new entry and its ancestors are never chosen for eviction.
    pub fn put(&mut self, key: MergedContextConfiguration, context: Arc<C>) {
        self.link(&key);
        let incoming = Arc::clone(&context);

        #[cfg(feature = "tracing")]
        debug!(cache = %self.config.name, key = %key, "storing context in cache");

        if let Some(previous) = self.state.contexts.put(key.clone(), context) {
            if !Arc::ptr_eq(&previous, &incoming) {
                self.close(&key, &previous, RemovalCause::Replaced);
            }
        }

        self.enforce_capacity(&key);
        self.update_size_gauge();
    }

    /// Removes the context for `key` and closes it.
    ///
    /// With [`HierarchyMode::Exhaustive`] every cached descendant of `key` is
    /// removed as well, children before parents. Descendants are found even
    /// when `key` itself is not cached.
    pub fn remove(&mut self, key: &MergedContextConfiguration, mode: HierarchyMode) {
        self.remove_with_cause(key, mode, RemovalCause::Explicit);
        self.update_size_gauge();
    }

    /// Closes and removes every cached context. Statistics are kept.
    pub fn clear(&mut self) {
        let mut keys: Vec<Key> = self
            .state
            .contexts
            .iter()
            .rev()
            .map(|(key, _)| key.clone())
            .collect();
        // deepest configurations first
        keys.sort_by_key(|key| std::cmp::Reverse(key.ancestors().count()));

        for key in keys {
            if let Some(context) = self.state.contexts.pop(&key) {
                self.close(&key, &context, RemovalCause::Cleared);
            }
        }
        self.state.hierarchy.clear();
        self.update_size_gauge();
    }

    /// Number of cached contexts.
    pub fn size(&self) -> usize {
        self.state.contexts.len()
    }

    /// Number of configurations that currently have linked children.
    pub fn parent_context_count(&self) -> usize {
        self.state.hierarchy.len()
    }

    /// Snapshot of the cache counters.
    pub fn statistics(&self) -> CacheStatistics {
        CacheStatistics {
            name: self.config.name.clone(),
            size: self.size(),
            max_size: self.config.max_size(),
            parent_context_count: self.parent_context_count(),
            hit_count: self.state.hit_count,
            miss_count: self.state.miss_count,
            eviction_count: self.state.eviction_count,
        }
    }

    /// Logs the current statistics at debug level.
    pub fn log_statistics(&self) {
        #[cfg(feature = "tracing")]
        debug!(statistics = %self.statistics(), "context cache statistics");
    }

    /// Records a successful load of `key`.
    pub(crate) fn record_load(&mut self, key: &MergedContextConfiguration, duration: Duration) {
        #[cfg(feature = "metrics")]
        histogram!("context_cache_load_duration_seconds", "cache" => self.config.name.clone())
            .record(duration.as_secs_f64());

        #[cfg(feature = "tracing")]
        debug!(cache = %self.config.name, key = %key, elapsed = ?duration, "loaded context");

        self.record(|cache_name| ContextCacheEvent::Loaded {
            cache_name,
            key: key.to_string(),
            duration,
            timestamp: Instant::now(),
        });
    }

    /// Records a failed load of `key`.
    pub(crate) fn record_load_failure(
        &mut self,
        key: &MergedContextConfiguration,
        duration: Duration,
    ) {
        #[cfg(feature = "metrics")]
        counter!("context_cache_load_failures_total", "cache" => self.config.name.clone())
            .increment(1);

        #[cfg(feature = "tracing")]
        warn!(cache = %self.config.name, key = %key, elapsed = ?duration, "failed to load context");

        self.record(|cache_name| ContextCacheEvent::LoadFailed {
            cache_name,
            key: key.to_string(),
            duration,
            timestamp: Instant::now(),
        });
    }

    fn remove_with_cause(&mut self, key: &Key, mode: HierarchyMode, cause: RemovalCause) {
        let mut doomed = Vec::new();
        match mode {
            HierarchyMode::CurrentLevel => doomed.push(key.clone()),
            HierarchyMode::Exhaustive => self.collect_subtree(key, &mut doomed),
        }

        for victim in &doomed {
            if let Some(context) = self.state.contexts.pop(victim) {
                if cause == RemovalCause::Capacity {
                    self.state.eviction_count += 1;

                    #[cfg(feature = "metrics")]
                    counter!("context_cache_evictions_total", "cache" => self.config.name.clone())
                        .increment(1);

                    #[cfg(feature = "tracing")]
                    info!(cache = %self.config.name, key = %victim, "evicted context from cache");
                }
                self.close(victim, &context, cause);
            }
        }

        for victim in &doomed {
            self.unlink(victim);
        }
    }

    /// Post-order walk of the hierarchy below `key`: children precede parents.
    fn collect_subtree(&self, key: &Key, out: &mut Vec<Key>) {
        if let Some(children) = self.state.hierarchy.get(key) {
            for child in children {
                self.collect_subtree(child, out);
            }
        }
        out.push(key.clone());
    }

    /// Links `key` below its parent, and each ancestor below its own parent,
    /// up to the first link that already exists.
    fn link(&mut self, key: &Key) {
        let mut current = key;
        while let Some(parent) = current.parent() {
            let children = self.state.hierarchy.entry(parent.clone()).or_default();
            if children.contains(current) {
                return;
            }
            children.push(current.clone());
            current = parent;
        }
    }

    /// Drops hierarchy links that no longer lead to a cached context,
    /// walking up from `key`.
    fn unlink(&mut self, key: &Key) {
        let mut current = key.clone();
        loop {
            let has_children = self
                .state
                .hierarchy
                .get(&current)
                .is_some_and(|children| !children.is_empty());
            if has_children || self.state.contexts.contains(&current) {
                return;
            }
            self.state.hierarchy.remove(&current);

            let Some(parent) = current.parent().cloned() else {
                return;
            };
            if let Some(siblings) = self.state.hierarchy.get_mut(&parent) {
                siblings.retain(|sibling| sibling != &current);
                if siblings.is_empty() {
                    self.state.hierarchy.remove(&parent);
                }
            }
            current = parent;
        }
    }

    fn enforce_capacity(&mut self, newest: &Key) {
        let Some(max_size) = self.config.max_size else {
            return;
        };

        while self.state.contexts.len() > max_size.get() {
            let victim = self
                .state
                .contexts
                .iter()
                .rev()
                .map(|(key, _)| key)
                .find(|candidate| {
                    *candidate != newest && !newest.ancestors().any(|a| a == *candidate)
                })
                .cloned();

            match victim {
                Some(victim) => {
                    self.remove_with_cause(&victim, HierarchyMode::Exhaustive, RemovalCause::Capacity)
                }
                // only the new entry's own ancestry is left
                None => return,
            }
        }
    }

    fn close(&mut self, key: &Key, context: &Arc<C>, cause: RemovalCause) {
        match context.close() {
            Ok(()) => {
                #[cfg(feature = "tracing")]
                debug!(cache = %self.config.name, key = %key, ?cause, "closed context");
            }
            Err(error) => {
                #[cfg(feature = "tracing")]
                warn!(cache = %self.config.name, key = %key, %error, "failed to close context");

                self.record(|cache_name| ContextCacheEvent::CloseFailed {
                    cache_name,
                    key: key.to_string(),
                    error: error.to_string(),
                    timestamp: Instant::now(),
                });
            }
        }

        self.record(|cache_name| ContextCacheEvent::Removed {
            cache_name,
            key: key.to_string(),
            cause,
            timestamp: Instant::now(),
        });
    }

    fn record<F>(&mut self, event: F)
    where
        F: FnOnce(String) -> ContextCacheEvent,
    {
        if !self.events.listeners.is_empty() {
            self.events.events.push(event(self.config.name.clone()));
        }
    }

    fn update_size_gauge(&self) {
        #[cfg(feature = "metrics")]
        gauge!("context_cache_size", "cache" => self.config.name.clone())
            .set(self.state.contexts.len() as f64);
    }
}
