//! Context hierarchy removal modes.

use std::fmt;

/// Controls how far a removal reaches into a context hierarchy.
///
/// Contexts form a forest through the parent link of their configuration.
/// When a context is removed from the cache, the mode decides whether the
/// cached descendants go with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HierarchyMode {
    /// Remove only the context for the given configuration.
    ///
    /// Cached children stay cached; they may keep using a parent that is no
    /// longer tracked by the cache.
    #[default]
    CurrentLevel,

    /// Remove the context for the given configuration and every cached
    /// context whose configuration has it as an ancestor.
    ///
    /// Children are closed before their parents.
    Exhaustive,
}

impl fmt::Display for HierarchyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HierarchyMode::CurrentLevel => f.write_str("current_level"),
            HierarchyMode::Exhaustive => f.write_str("exhaustive"),
        }
    }
}
