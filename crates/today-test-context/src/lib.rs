//! Caching of test application contexts.
//!
//! Building an application context for an integration test is expensive.
//! Tests that declare the same configuration can share one context, so this
//! crate keeps built contexts in a cache keyed by the full merged test
//! configuration and rebuilds only when a configuration has not been seen
//! before.
//!
//! # Features
//!
//! - **Value-equal keys**: [`MergedContextConfiguration`] compares every
//!   configuration input, ignores the declaring test class and treats profiles
//!   as a set
//! - **LRU eviction**: An optional size bound evicts the least recently used
//!   context, together with any cached children
//! - **Context hierarchies**: Parent configurations are tracked so that
//!   closing a parent can close every descendant ([`HierarchyMode`])
//! - **Build once**: [`DefaultContextLoaderDelegate`] builds each
//!   configuration at most once, even under concurrent requests
//! - **Statistics and events**: Hit, miss and eviction counts, plus
//!   listeners, `tracing` logs and `metrics` counters behind feature flags
//!
//! # Examples
//!
//! ```
//! use today_test_context::{
//!     loader_fn, ApplicationContext, BoxError, ContextCacheConfig, ContextLoaderDelegate,
//!     DefaultContextLoaderDelegate, HierarchyMode, MergedContextConfiguration,
//! };
//! use std::sync::Arc;
//!
//! struct TestContext {
//!     profiles: Vec<String>,
//! }
//!
//! impl ApplicationContext for TestContext {
//!     fn close(&self) -> Result<(), BoxError> {
//!         Ok(())
//!     }
//! }
//!
//! let cache = ContextCacheConfig::builder()
//!     .name("integration-tests")
//!     .max_size(32)
//!     .on_eviction(|| println!("context evicted"))
//!     .build();
//!
//! let delegate = DefaultContextLoaderDelegate::new(
//!     cache,
//!     loader_fn(|config: &MergedContextConfiguration, _parent| {
//!         Ok::<_, BoxError>(TestContext {
//!             profiles: config.active_profiles().map(String::from).collect(),
//!         })
//!     }),
//! );
//!
//! let a = MergedContextConfiguration::builder()
//!     .class("AppConfig")
//!     .profiles(["dev", "test"])
//!     .build();
//! let b = MergedContextConfiguration::builder()
//!     .test_class("OtherTest")
//!     .class("AppConfig")
//!     .profiles(["test", "dev"])
//!     .build();
//!
//! let first = delegate.load_context(&a)?;
//! let second = delegate.load_context(&b)?;
//! assert!(Arc::ptr_eq(&first, &second));
//! assert_eq!(first.profiles, ["dev", "test"]);
//!
//! delegate.close_context(&a, HierarchyMode::Exhaustive);
//! assert!(!delegate.is_context_loaded(&b));
//! # Ok::<(), today_test_context::ContextError>(())
//! ```
//!
//! # Sharing a cache
//!
//! [`ContextCache`] is a cheap handle: clones share the same store. A test
//! harness that wants one cache for the whole process keeps it in a static at
//! its composition root:
//!
//! ```
//! use today_test_context::{ApplicationContext, BoxError, ContextCache, ContextCacheConfig};
//! use std::sync::LazyLock;
//!
//! struct TestContext;
//!
//! impl ApplicationContext for TestContext {
//!     fn close(&self) -> Result<(), BoxError> {
//!         Ok(())
//!     }
//! }
//!
//! static CONTEXT_CACHE: LazyLock<ContextCache<TestContext>> = LazyLock::new(|| {
//!     ContextCacheConfig::builder()
//!         .name("process")
//!         .max_size(32)
//!         .build()
//! });
//!
//! assert_eq!(CONTEXT_CACHE.max_size(), Some(32));
//! ```

mod cache;
mod config;
mod context;
mod customizer;
mod delegate;
mod error;
mod events;
mod hierarchy;
mod key;
mod stats;

pub use cache::{CacheGuard, ContextCache};
pub use config::{ContextCacheConfig, ContextCacheConfigBuilder, MAX_SIZE_ENV};
pub use context::ApplicationContext;
pub use customizer::ContextCustomizer;
pub use delegate::{
    loader_fn, ContextLoader, ContextLoaderDelegate, DefaultContextLoaderDelegate, LoaderFn,
};
pub use error::{ContextError, Result};
pub use events::{ContextCacheEvent, RemovalCause};
pub use hierarchy::HierarchyMode;
pub use key::{
    Ancestors, MergedContextConfiguration, MergedContextConfigurationBuilder,
    DEFAULT_CONTEXT_LOADER,
};
pub use stats::CacheStatistics;
pub use today_test_core::BoxError;
