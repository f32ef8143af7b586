//! Tests for the context cache.
//!
//! Test organization:
//! - support.rs: Shared test context and counting loader
//! - delegate_loading.rs: Build-once loading, failures, key equality end to end
//! - hierarchy.rs: Parent loading and cascading removal
//! - eviction.rs: Size bound, LRU order and eviction cascades
//! - concurrency.rs: Many threads against one cache
//! - observability.rs: Events, statistics, logging and serialization

mod concurrency;
mod hierarchy;
