//! Cache statistics snapshots.

use std::fmt;

/// Point-in-time view of a cache's counters.
///
/// Hit, miss and eviction counts only ever grow for the lifetime of the
/// cache; clearing the cache does not reset them.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CacheStatistics {
    /// Name of the cache.
    pub name: String,
    /// Number of cached contexts.
    pub size: usize,
    /// Configured bound, `None` when unbounded.
    pub max_size: Option<usize>,
    /// Number of distinct configurations that currently have cached children.
    pub parent_context_count: usize,
    /// Lookups that found a context.
    pub hit_count: u64,
    /// Lookups that found nothing.
    pub miss_count: u64,
    /// Contexts removed to honor the size bound, cascades included.
    pub eviction_count: u64,
}

impl CacheStatistics {
    /// Fraction of lookups that hit, or `0.0` before the first lookup.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hit_count + self.miss_count;
        if total == 0 {
            0.0
        } else {
            self.hit_count as f64 / total as f64
        }
    }
}

impl fmt::Display for CacheStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ContextCache [{}] size = {}, max_size = {}, parent_context_count = {}, \
             hit_count = {}, miss_count = {}, eviction_count = {}",
            self.name,
            self.size,
            self.max_size
                .map_or_else(|| "unbounded".to_string(), |m| m.to_string()),
            self.parent_context_count,
            self.hit_count,
            self.miss_count,
            self.eviction_count,
        )
    }
}
