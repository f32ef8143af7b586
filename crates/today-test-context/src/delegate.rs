//! Loading contexts through the cache.

use crate::cache::{CacheGuard, ContextCache};
use crate::context::ApplicationContext;
use crate::error::{ContextError, Result};
use crate::hierarchy::HierarchyMode;
use crate::key::MergedContextConfiguration;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use today_test_core::BoxError;

/// Builds a context for a configuration.
///
/// This is where a test bootstrap plugs in: read the configuration, wire the
/// collaborators, return the context. When the configuration has a parent,
/// the parent context is loaded first and handed in as `parent`.
///
/// Loaders run while the cache lock is held and must not call back into the
/// delegate or the cache that invoked them.
pub trait ContextLoader<C>: Send + Sync {
    /// Builds a new context for `config`.
    fn load_context(
        &self,
        config: &MergedContextConfiguration,
        parent: Option<Arc<C>>,
    ) -> std::result::Result<C, BoxError>;
}

impl<C, L> ContextLoader<C> for Arc<L>
where
    L: ContextLoader<C> + ?Sized,
{
    fn load_context(
        &self,
        config: &MergedContextConfiguration,
        parent: Option<Arc<C>>,
    ) -> std::result::Result<C, BoxError> {
        (**self).load_context(config, parent)
    }
}

/// A [`ContextLoader`] backed by a closure. Created with [`loader_fn`].
#[derive(Clone)]
pub struct LoaderFn<F> {
    f: F,
}

impl<F> fmt::Debug for LoaderFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderFn")
            .field("f", &std::any::type_name::<F>())
            .finish()
    }
}

/// Wraps a closure as a [`ContextLoader`].
///
/// ```
/// use today_test_context::{loader_fn, ApplicationContext, BoxError, ContextLoader,
///     MergedContextConfiguration};
///
/// struct Beans(Vec<String>);
///
/// impl ApplicationContext for Beans {
///     fn close(&self) -> Result<(), BoxError> {
///         Ok(())
///     }
/// }
///
/// let loader = loader_fn(|config: &MergedContextConfiguration, _parent| {
///     Ok::<_, BoxError>(Beans(config.classes().to_vec()))
/// });
///
/// let config = MergedContextConfiguration::builder().class("AppConfig").build();
/// let context = loader.load_context(&config, None).unwrap();
/// assert_eq!(context.0, ["AppConfig"]);
/// ```
pub fn loader_fn<C, F, E>(f: F) -> LoaderFn<F>
where
    F: Fn(&MergedContextConfiguration, Option<Arc<C>>) -> std::result::Result<C, E> + Send + Sync,
    E: Into<BoxError>,
{
    LoaderFn { f }
}

impl<C, F, E> ContextLoader<C> for LoaderFn<F>
where
    F: Fn(&MergedContextConfiguration, Option<Arc<C>>) -> std::result::Result<C, E> + Send + Sync,
    E: Into<BoxError>,
{
    fn load_context(
        &self,
        config: &MergedContextConfiguration,
        parent: Option<Arc<C>>,
    ) -> std::result::Result<C, BoxError> {
        (self.f)(config, parent).map_err(Into::into)
    }
}

/// The entry point test infrastructure uses to obtain contexts.
pub trait ContextLoaderDelegate<C> {
    /// Returns true if a context for `config` is cached.
    fn is_context_loaded(&self, config: &MergedContextConfiguration) -> bool;

    /// Returns the cached context for `config`, building and caching it first
    /// if needed.
    fn load_context(&self, config: &MergedContextConfiguration) -> Result<Arc<C>>;

    /// Removes the context for `config` from the cache and closes it.
    fn close_context(&self, config: &MergedContextConfiguration, mode: HierarchyMode);
}

/// A [`ContextLoaderDelegate`] that serves contexts from a [`ContextCache`]
/// and builds missing ones with a [`ContextLoader`].
///
/// The whole lookup-or-build sequence runs under the cache lock, so a
/// configuration is built at most once no matter how many threads ask for it
/// at the same time. Failed loads are not cached: the next request tries
/// again.
///
/// Several delegates may share one cache by cloning the [`ContextCache`]
/// handle; independent caches isolate, for example, parallel test shards.
pub struct DefaultContextLoaderDelegate<C, L> {
    cache: ContextCache<C>,
    loader: L,
}

impl<C, L> DefaultContextLoaderDelegate<C, L>
where
    C: ApplicationContext,
    L: ContextLoader<C>,
{
    /// Creates a delegate over `cache` that builds contexts with `loader`.
    pub fn new(cache: ContextCache<C>, loader: L) -> Self {
        Self { cache, loader }
    }

    /// The cache this delegate reads and fills.
    pub fn cache(&self) -> &ContextCache<C> {
        &self.cache
    }

    /// The loader used on cache misses.
    pub fn loader(&self) -> &L {
        &self.loader
    }

    fn load_locked(
        &self,
        guard: &mut CacheGuard<'_, C>,
        config: &MergedContextConfiguration,
    ) -> Result<Arc<C>> {
        if let Some(context) = guard.get(config) {
            return Ok(context);
        }

        let parent = match config.parent() {
            Some(parent) => Some(self.load_locked(guard, parent)?),
            None => None,
        };

        let started = Instant::now();
        match self.loader.load_context(config, parent) {
            Ok(context) => {
                let context = Arc::new(context);
                guard.put(config.clone(), Arc::clone(&context));
                guard.record_load(config, started.elapsed());
                Ok(context)
            }
            Err(source) => {
                guard.record_load_failure(config, started.elapsed());
                Err(ContextError::Load {
                    key: config.to_string(),
                    source,
                })
            }
        }
    }
}

impl<C, L> ContextLoaderDelegate<C> for DefaultContextLoaderDelegate<C, L>
where
    C: ApplicationContext,
    L: ContextLoader<C>,
{
    fn is_context_loaded(&self, config: &MergedContextConfiguration) -> bool {
        self.cache.contains(config)
    }

    fn load_context(&self, config: &MergedContextConfiguration) -> Result<Arc<C>> {
        let mut guard = self.cache.lock();
        let loaded = self.load_locked(&mut guard, config);
        guard.log_statistics();
        loaded
    }

    fn close_context(&self, config: &MergedContextConfiguration, mode: HierarchyMode) {
        self.cache.remove(config, mode);
    }
}

impl<C, L: Clone> Clone for DefaultContextLoaderDelegate<C, L> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            loader: self.loader.clone(),
        }
    }
}

impl<C, L> fmt::Debug for DefaultContextLoaderDelegate<C, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultContextLoaderDelegate")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
