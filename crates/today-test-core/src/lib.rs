//! Core infrastructure for today-test.
//!
//! This crate provides functionality shared by the test-context crates:
//! - Event system for observing caches and loaders
//! - The boxed error type used at extension points

pub mod error;
pub mod events;

pub use error::BoxError;
pub use events::{BoxedEventListener, EventListener, EventListeners, FnListener, TestEvent};
