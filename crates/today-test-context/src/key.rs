//! Merged test configuration: the cache key.

use crate::customizer::ContextCustomizer;
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Loader identifier used when none is configured.
pub const DEFAULT_CONTEXT_LOADER: &str = "default";

/// The fully merged configuration of a test class, used as the cache key.
///
/// Configurations are immutable once built. Equality and hashing cover every
/// field except [`test_class`](Self::test_class), so test classes that declare
/// the same configuration share one cached context:
///
/// - active profiles are sorted and de-duplicated, so declaration order does
///   not matter;
/// - customizers compare by value, as a set;
/// - the parent configuration takes part recursively.
///
/// ```
/// use today_test_context::MergedContextConfiguration;
///
/// let a = MergedContextConfiguration::builder()
///     .test_class("OrderServiceTests")
///     .location("a.xml")
///     .profiles(["dev", "test"])
///     .build();
/// let b = MergedContextConfiguration::builder()
///     .test_class("InvoiceServiceTests")
///     .location("a.xml")
///     .profiles(["test", "dev", "test"])
///     .build();
///
/// assert_eq!(a, b);
/// ```
#[derive(Clone)]
pub struct MergedContextConfiguration {
    test_class: Option<String>,
    locations: Vec<String>,
    classes: Vec<String>,
    context_initializers: BTreeSet<String>,
    active_profiles: BTreeSet<String>,
    property_source_locations: Vec<String>,
    property_source_properties: Vec<String>,
    customizers: Vec<Arc<dyn ContextCustomizer>>,
    context_loader: String,
    resource_base_path: Option<String>,
    parent: Option<Arc<MergedContextConfiguration>>,
}

impl MergedContextConfiguration {
    /// Creates a new configuration builder.
    pub fn builder() -> MergedContextConfigurationBuilder {
        MergedContextConfigurationBuilder::new()
    }

    /// Name of the test class this configuration was merged for, if recorded.
    pub fn test_class(&self) -> Option<&str> {
        self.test_class.as_deref()
    }

    /// Resource locations, in declaration order.
    pub fn locations(&self) -> &[String] {
        &self.locations
    }

    /// Configuration classes, in declaration order.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Context initializer identifiers.
    pub fn context_initializers(&self) -> impl Iterator<Item = &str> {
        self.context_initializers.iter().map(String::as_str)
    }

    /// Active profiles, sorted.
    pub fn active_profiles(&self) -> impl Iterator<Item = &str> {
        self.active_profiles.iter().map(String::as_str)
    }

    /// Property source locations, in declaration order.
    pub fn property_source_locations(&self) -> &[String] {
        &self.property_source_locations
    }

    /// Inlined `key=value` properties, in declaration order.
    pub fn property_source_properties(&self) -> &[String] {
        &self.property_source_properties
    }

    /// Registered customizers.
    pub fn customizers(&self) -> impl Iterator<Item = &(dyn ContextCustomizer + 'static)> {
        self.customizers.iter().map(|c| &**c)
    }

    /// Looks up a customizer by its concrete type.
    pub fn customizer<T: ContextCustomizer>(&self) -> Option<&T> {
        self.customizers()
            .find_map(|c| c.as_any().downcast_ref::<T>())
    }

    /// Identifier of the loader strategy that builds this configuration.
    pub fn context_loader(&self) -> &str {
        &self.context_loader
    }

    /// Root directory of the web application, for web configurations.
    pub fn resource_base_path(&self) -> Option<&str> {
        self.resource_base_path.as_deref()
    }

    /// Returns true if this configuration describes a web application context.
    pub fn is_web(&self) -> bool {
        self.resource_base_path.is_some()
    }

    /// The parent configuration, if this context is part of a hierarchy.
    pub fn parent(&self) -> Option<&MergedContextConfiguration> {
        self.parent.as_deref()
    }

    /// Returns true if this configuration has a parent.
    pub fn has_parent(&self) -> bool {
        self.parent.is_some()
    }

    /// Walks the parent chain, nearest ancestor first.
    pub fn ancestors(&self) -> Ancestors<'_> {
        Ancestors {
            next: self.parent(),
        }
    }

    fn customizer_set_eq(&self, other: &Self) -> bool {
        self.customizers.len() == other.customizers.len()
            && self
                .customizers()
                .all(|mine| other.customizers().any(|theirs| mine == theirs))
    }

    fn customizer_set_hash(&self) -> u64 {
        let mut hashes: Vec<u64> = self
            .customizers()
            .map(|c| {
                let mut hasher = DefaultHasher::new();
                c.hash(&mut hasher);
                hasher.finish()
            })
            .collect();
        hashes.sort_unstable();

        let mut hasher = DefaultHasher::new();
        hashes.hash(&mut hasher);
        hasher.finish()
    }
}

impl PartialEq for MergedContextConfiguration {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        self.locations == other.locations
            && self.classes == other.classes
            && self.context_initializers == other.context_initializers
            && self.active_profiles == other.active_profiles
            && self.property_source_locations == other.property_source_locations
            && self.property_source_properties == other.property_source_properties
            && self.context_loader == other.context_loader
            && self.resource_base_path == other.resource_base_path
            && self.parent == other.parent
            && self.customizer_set_eq(other)
    }
}

impl Eq for MergedContextConfiguration {}

impl Hash for MergedContextConfiguration {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.locations.hash(state);
        self.classes.hash(state);
        self.context_initializers.hash(state);
        self.active_profiles.hash(state);
        self.property_source_locations.hash(state);
        self.property_source_properties.hash(state);
        self.context_loader.hash(state);
        self.resource_base_path.hash(state);
        self.parent.hash(state);
        state.write_u64(self.customizer_set_hash());
    }
}

impl fmt::Debug for MergedContextConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergedContextConfiguration")
            .field("test_class", &self.test_class)
            .field("locations", &self.locations)
            .field("classes", &self.classes)
            .field("context_initializers", &self.context_initializers)
            .field("active_profiles", &self.active_profiles)
            .field("property_source_locations", &self.property_source_locations)
            .field("property_source_properties", &self.property_source_properties)
            .field("customizers", &self.customizers)
            .field("context_loader", &self.context_loader)
            .field("resource_base_path", &self.resource_base_path)
            .field("parent", &self.parent)
            .finish()
    }
}

impl fmt::Display for MergedContextConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[test_class = {}, locations = {:?}, classes = {:?}, context_initializers = {:?}, \
             active_profiles = {:?}, property_source_locations = {:?}, \
             property_source_properties = {:?}, customizers = {}, context_loader = {}",
            self.test_class.as_deref().unwrap_or("<none>"),
            self.locations,
            self.classes,
            self.context_initializers,
            self.active_profiles,
            self.property_source_locations,
            self.property_source_properties,
            self.customizers.len(),
            self.context_loader,
        )?;
        if let Some(path) = &self.resource_base_path {
            write!(f, ", resource_base_path = {}", path)?;
        }
        match &self.parent {
            Some(parent) => write!(f, ", parent = {}]", parent),
            None => f.write_str(", parent = <none>]"),
        }
    }
}

/// Iterator over the ancestors of a configuration.
#[derive(Debug, Clone)]
pub struct Ancestors<'a> {
    next: Option<&'a MergedContextConfiguration>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a MergedContextConfiguration;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.parent();
        Some(current)
    }
}

/// Builder for [`MergedContextConfiguration`].
#[derive(Default)]
pub struct MergedContextConfigurationBuilder {
    test_class: Option<String>,
    locations: Vec<String>,
    classes: Vec<String>,
    context_initializers: BTreeSet<String>,
    active_profiles: BTreeSet<String>,
    property_source_locations: Vec<String>,
    property_source_properties: Vec<String>,
    customizers: Vec<Arc<dyn ContextCustomizer>>,
    context_loader: Option<String>,
    resource_base_path: Option<String>,
    parent: Option<Arc<MergedContextConfiguration>>,
}

impl MergedContextConfigurationBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the test class the configuration is merged for.
    ///
    /// Does not take part in equality.
    pub fn test_class(mut self, name: impl Into<String>) -> Self {
        self.test_class = Some(name.into());
        self
    }

    /// Adds a resource location. Repeated locations are ignored.
    pub fn location(mut self, location: impl Into<String>) -> Self {
        push_unique(&mut self.locations, location.into());
        self
    }

    /// Adds several resource locations.
    pub fn locations<I, S>(self, locations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        locations.into_iter().fold(self, |b, l| b.location(l))
    }

    /// Adds a configuration class. Repeated classes are ignored.
    pub fn class(mut self, class: impl Into<String>) -> Self {
        push_unique(&mut self.classes, class.into());
        self
    }

    /// Adds several configuration classes.
    pub fn classes<I, S>(self, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        classes.into_iter().fold(self, |b, c| b.class(c))
    }

    /// Adds a context initializer identifier.
    pub fn context_initializer(mut self, initializer: impl Into<String>) -> Self {
        self.context_initializers.insert(initializer.into());
        self
    }

    /// Activates a profile. Profiles are kept sorted and de-duplicated.
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.active_profiles.insert(profile.into());
        self
    }

    /// Activates several profiles.
    pub fn profiles<I, S>(self, profiles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        profiles.into_iter().fold(self, |b, p| b.profile(p))
    }

    /// Adds a property source location.
    pub fn property_source_location(mut self, location: impl Into<String>) -> Self {
        self.property_source_locations.push(location.into());
        self
    }

    /// Adds an inlined `key=value` property.
    pub fn property(mut self, property: impl Into<String>) -> Self {
        self.property_source_properties.push(property.into());
        self
    }

    /// Adds a customizer. A customizer equal to one already present is ignored.
    pub fn customizer<C: ContextCustomizer>(self, customizer: C) -> Self {
        self.shared_customizer(Arc::new(customizer))
    }

    /// Adds an already shared customizer.
    pub fn shared_customizer(mut self, customizer: Arc<dyn ContextCustomizer>) -> Self {
        let candidate: &(dyn ContextCustomizer + 'static) = &*customizer;
        if !self.customizers.iter().any(|c| &**c == candidate) {
            self.customizers.push(customizer);
        }
        self
    }

    /// Sets the loader strategy identifier.
    ///
    /// Default: [`DEFAULT_CONTEXT_LOADER`]
    pub fn context_loader(mut self, loader: impl Into<String>) -> Self {
        self.context_loader = Some(loader.into());
        self
    }

    /// Marks this as a web configuration rooted at `path`.
    ///
    /// Blank paths are ignored.
    pub fn resource_base_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.resource_base_path = if path.trim().is_empty() {
            None
        } else {
            Some(path)
        };
        self
    }

    /// Sets the parent configuration.
    pub fn parent(mut self, parent: impl Into<Arc<MergedContextConfiguration>>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> MergedContextConfiguration {
        MergedContextConfiguration {
            test_class: self.test_class,
            locations: self.locations,
            classes: self.classes,
            context_initializers: self.context_initializers,
            active_profiles: self.active_profiles,
            property_source_locations: self.property_source_locations,
            property_source_properties: self.property_source_properties,
            customizers: self.customizers,
            context_loader: self
                .context_loader
                .unwrap_or_else(|| DEFAULT_CONTEXT_LOADER.to_string()),
            resource_base_path: self.resource_base_path,
            parent: self.parent,
        }
    }
}

fn push_unique(values: &mut Vec<String>, value: String) {
    if !values.contains(&value) {
        values.push(value);
    }
}
