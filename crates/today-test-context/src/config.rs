//! Configuration for the context cache.

use crate::context::ApplicationContext;
use crate::error::{ContextError, Result};
use crate::events::ContextCacheEvent;
use std::num::NonZeroUsize;
use today_test_core::{EventListeners, FnListener};

/// Environment variable read by [`ContextCacheConfigBuilder::max_size_from_env`].
pub const MAX_SIZE_ENV: &str = "TODAY_TEST_CONTEXT_CACHE_MAX_SIZE";

/// Configuration shared by every handle of one [`ContextCache`](crate::ContextCache).
pub struct ContextCacheConfig {
    pub(crate) name: String,
    pub(crate) max_size: Option<NonZeroUsize>,
    pub(crate) event_listeners: EventListeners<ContextCacheEvent>,
}

impl ContextCacheConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> ContextCacheConfigBuilder {
        ContextCacheConfigBuilder::new()
    }

    /// Name of the cache, used in logs, metrics and events.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Maximum number of cached contexts, `None` when unbounded.
    pub fn max_size(&self) -> Option<usize> {
        self.max_size.map(NonZeroUsize::get)
    }
}

/// Builder for configuring and constructing a context cache.
pub struct ContextCacheConfigBuilder {
    name: String,
    max_size: Option<NonZeroUsize>,
    event_listeners: EventListeners<ContextCacheEvent>,
}

impl ContextCacheConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            name: String::from("<unnamed>"),
            max_size: None,
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the name of this cache for observability.
    ///
    /// Default: `"<unnamed>"`
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Bounds the number of cached contexts.
    ///
    /// Once the bound is exceeded, the least recently used context is evicted
    /// together with its cached descendants.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero.
    pub fn max_size(mut self, size: usize) -> Self {
        self.max_size = Some(NonZeroUsize::new(size).expect("max_size must be greater than zero"));
        self
    }

    /// Removes any size bound.
    ///
    /// Default: unbounded
    pub fn unbounded(mut self) -> Self {
        self.max_size = None;
        self
    }

    /// Reads the size bound from the `TODAY_TEST_CONTEXT_CACHE_MAX_SIZE`
    /// environment variable.
    ///
    /// An unset or blank variable leaves the current setting untouched. Any
    /// other value must be a positive integer.
    pub fn max_size_from_env(self) -> Result<Self> {
        match std::env::var(MAX_SIZE_ENV) {
            Ok(raw) => self.max_size_from_str(&raw),
            Err(std::env::VarError::NotPresent) => Ok(self),
            Err(std::env::VarError::NotUnicode(_)) => Err(ContextError::InvalidConfiguration {
                message: format!("{} is not valid unicode", MAX_SIZE_ENV),
            }),
        }
    }

    fn max_size_from_str(mut self, raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(self);
        }
        let size = raw
            .parse::<usize>()
            .ok()
            .and_then(NonZeroUsize::new)
            .ok_or_else(|| ContextError::InvalidConfiguration {
                message: format!(
                    "{} must be a positive integer, got {:?}",
                    MAX_SIZE_ENV, raw
                ),
            })?;
        self.max_size = Some(size);
        Ok(self)
    }

    /// Registers a callback invoked on every event.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&ContextCacheEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(f));
        self
    }

    /// Registers a callback invoked when a lookup finds a cached context.
    pub fn on_hit<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event: &ContextCacheEvent| {
            if matches!(event, ContextCacheEvent::Hit { .. }) {
                f();
            }
        }));
        self
    }

    /// Registers a callback invoked when a lookup finds nothing.
    pub fn on_miss<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event: &ContextCacheEvent| {
            if matches!(event, ContextCacheEvent::Miss { .. }) {
                f();
            }
        }));
        self
    }

    /// Registers a callback invoked with the load duration after a context
    /// has been built and cached.
    pub fn on_load<F>(mut self, f: F) -> Self
    where
        F: Fn(std::time::Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event: &ContextCacheEvent| {
            if let ContextCacheEvent::Loaded { duration, .. } = event {
                f(*duration);
            }
        }));
        self
    }

    /// Registers a callback invoked when the loader fails.
    pub fn on_load_failure<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event: &ContextCacheEvent| {
            if matches!(event, ContextCacheEvent::LoadFailed { .. }) {
                f();
            }
        }));
        self
    }

    /// Registers a callback invoked for every context evicted by the size bound.
    pub fn on_eviction<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event: &ContextCacheEvent| {
            if event.is_eviction() {
                f();
            }
        }));
        self
    }

    /// Builds the configuration without creating a cache.
    pub fn into_config(self) -> ContextCacheConfig {
        ContextCacheConfig {
            name: self.name,
            max_size: self.max_size,
            event_listeners: self.event_listeners,
        }
    }

    /// Builds an empty cache.
    pub fn build<C: ApplicationContext>(self) -> crate::ContextCache<C> {
        crate::ContextCache::with_config(self.into_config())
    }
}

impl Default for ContextCacheConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
