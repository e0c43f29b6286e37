//! Resource kind registry.

use std::collections::BTreeMap;

use super::{file_provider, Resource, ResourceError};

/// Provider function for one resource kind: given the local resource
/// name and the declaration body, build the resource.
pub type Provider =
    Box<dyn Fn(&str, &toml::Table) -> Result<Box<dyn Resource>, ResourceError> + Send + Sync>;

/// Name-indexed mapping from resource kind to its provider.
///
/// Built once at startup, before any module is loaded, and treated as
/// immutable afterwards. The module loader only recognizes kinds that
/// are registered here; everything else is an unknown key.
#[derive(Default)]
pub struct Registry {
    kinds: BTreeMap<String, Provider>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in kinds registered.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("file", Box::new(file_provider));
        registry
    }

    /// Registers a provider for a kind, replacing any previous one.
    pub fn register(&mut self, kind: &str, provider: Provider) {
        self.kinds.insert(kind.to_string(), provider);
    }

    /// Looks up the provider for a kind.
    pub fn provider(&self, kind: &str) -> Option<&Provider> {
        self.kinds.get(kind)
    }

    /// True when the kind has a registered provider.
    pub fn is_registered(&self, kind: &str) -> bool {
        self.kinds.contains_key(kind)
    }

    /// Registered kind names, sorted.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.kinds.keys().map(String::as_str)
    }
}
