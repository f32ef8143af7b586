//! Context customizers that take part in cache identity.

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A value that adjusts a context while it is being built.
///
/// Customizers are part of a [`MergedContextConfiguration`], so they take part
/// in cache identity. Two customizers are equal when their captured values
/// are equal, never by identity; otherwise two identical configurations would
/// never share a cache slot.
///
/// The trait is implemented for every type that is `PartialEq + Eq + Hash +
/// Debug + Send + Sync + 'static`. Loaders find the customizers they know how
/// to apply with [`MergedContextConfiguration::customizer`].
///
/// ```
/// use today_test_context::MergedContextConfiguration;
///
/// #[derive(Debug, PartialEq, Eq, Hash)]
/// struct MockServerPort(u16);
///
/// let config = MergedContextConfiguration::builder()
///     .class("WebConfig")
///     .customizer(MockServerPort(8080))
///     .build();
///
/// assert_eq!(config.customizer::<MockServerPort>(), Some(&MockServerPort(8080)));
/// ```
///
/// [`MergedContextConfiguration`]: crate::MergedContextConfiguration
/// [`MergedContextConfiguration::customizer`]: crate::MergedContextConfiguration::customizer
pub trait ContextCustomizer: Any + Send + Sync + fmt::Debug + 'static {
    /// Value equality against another customizer of any type.
    fn dyn_eq(&self, other: &dyn ContextCustomizer) -> bool;

    /// Feeds this customizer's value into `state`.
    fn dyn_hash(&self, state: &mut dyn Hasher);

    /// Upcast used for downcasting to the concrete customizer.
    fn as_any(&self) -> &dyn Any;
}

impl<T> ContextCustomizer for T
where
    T: Any + PartialEq + Eq + Hash + fmt::Debug + Send + Sync,
{
    fn dyn_eq(&self, other: &dyn ContextCustomizer) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }

    fn dyn_hash(&self, mut state: &mut dyn Hasher) {
        std::any::TypeId::of::<T>().hash(&mut state);
        self.hash(&mut state);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl PartialEq for dyn ContextCustomizer {
    fn eq(&self, other: &Self) -> bool {
        self.dyn_eq(other)
    }
}

impl Eq for dyn ContextCustomizer {}

impl Hash for dyn ContextCustomizer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.dyn_hash(state);
    }
}
