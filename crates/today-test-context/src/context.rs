//! The cached application context abstraction.

use today_test_core::BoxError;

/// An expensive-to-build runtime object holding the wired collaborators of a
/// test: the thing the cache exists to avoid rebuilding.
///
/// The cache stores contexts behind an `Arc` and hands out clones of it.
/// Callers must not call [`close`](Self::close) on a context obtained from the
/// cache; only eviction or an explicit removal closes it, so a context is
/// never closed under a test that still uses it.
pub trait ApplicationContext: Send + Sync + 'static {
    /// Releases the resources held by this context.
    ///
    /// Errors are reported to the cache's listeners and logs but never
    /// surface to the caller that triggered the removal.
    fn close(&self) -> Result<(), BoxError>;

    /// Returns whether the context is still usable.
    fn is_active(&self) -> bool {
        true
    }
}
