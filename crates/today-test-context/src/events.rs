//! Events emitted by the context cache.

use std::time::{Duration, Instant};
use today_test_core::TestEvent;

/// Why a context left the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalCause {
    /// The cache exceeded its maximum size.
    Capacity,
    /// A caller asked for the removal.
    Explicit,
    /// The entry was overwritten by a different context.
    Replaced,
    /// The whole cache was cleared.
    Cleared,
}

/// Events emitted by a [`ContextCache`](crate::ContextCache).
///
/// `key` fields carry the `Display` form of the configuration involved.
#[derive(Debug, Clone)]
pub enum ContextCacheEvent {
    /// A lookup found a cached context.
    Hit {
        cache_name: String,
        key: String,
        timestamp: Instant,
    },
    /// A lookup found nothing.
    Miss {
        cache_name: String,
        key: String,
        timestamp: Instant,
    },
    /// The loader built a context that is now cached.
    Loaded {
        cache_name: String,
        key: String,
        duration: Duration,
        timestamp: Instant,
    },
    /// The loader failed; nothing was cached.
    LoadFailed {
        cache_name: String,
        key: String,
        duration: Duration,
        timestamp: Instant,
    },
    /// A context was removed and closed.
    Removed {
        cache_name: String,
        key: String,
        cause: RemovalCause,
        timestamp: Instant,
    },
    /// Closing a removed context failed. The context is dropped regardless.
    CloseFailed {
        cache_name: String,
        key: String,
        error: String,
        timestamp: Instant,
    },
}

impl ContextCacheEvent {
    /// Description of the configuration this event concerns.
    pub fn key(&self) -> &str {
        match self {
            ContextCacheEvent::Hit { key, .. }
            | ContextCacheEvent::Miss { key, .. }
            | ContextCacheEvent::Loaded { key, .. }
            | ContextCacheEvent::LoadFailed { key, .. }
            | ContextCacheEvent::Removed { key, .. }
            | ContextCacheEvent::CloseFailed { key, .. } => key,
        }
    }

    /// Returns true for removals caused by the size bound.
    pub fn is_eviction(&self) -> bool {
        matches!(
            self,
            ContextCacheEvent::Removed {
                cause: RemovalCause::Capacity,
                ..
            }
        )
    }
}

impl TestEvent for ContextCacheEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ContextCacheEvent::Hit { .. } => "hit",
            ContextCacheEvent::Miss { .. } => "miss",
            ContextCacheEvent::Loaded { .. } => "loaded",
            ContextCacheEvent::LoadFailed { .. } => "load_failed",
            ContextCacheEvent::Removed { .. } => "removed",
            ContextCacheEvent::CloseFailed { .. } => "close_failed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            ContextCacheEvent::Hit { timestamp, .. }
            | ContextCacheEvent::Miss { timestamp, .. }
            | ContextCacheEvent::Loaded { timestamp, .. }
            | ContextCacheEvent::LoadFailed { timestamp, .. }
            | ContextCacheEvent::Removed { timestamp, .. }
            | ContextCacheEvent::CloseFailed { timestamp, .. } => *timestamp,
        }
    }

    fn source_name(&self) -> &str {
        match self {
            ContextCacheEvent::Hit { cache_name, .. }
            | ContextCacheEvent::Miss { cache_name, .. }
            | ContextCacheEvent::Loaded { cache_name, .. }
            | ContextCacheEvent::LoadFailed { cache_name, .. }
            | ContextCacheEvent::Removed { cache_name, .. }
            | ContextCacheEvent::CloseFailed { cache_name, .. } => cache_name,
        }
    }
}
