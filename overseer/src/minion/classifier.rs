//! Classifier facts.
//!
//! A classifier is a key/value fact a minion publishes about itself so
//! operators can select minions by it. Sources produce the value at
//! refresh time; the registry is built before the minion starts
//! serving and never mutated afterwards.

use serde::{Deserialize, Serialize};

use super::MinionError;

/// A published classifier fact, as stored under
/// `classifier/<key>` in the minion's subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classifier {
    #[serde(rename = "Key")]
    pub key: String,

    #[serde(rename = "Description")]
    pub description: String,

    #[serde(rename = "Value")]
    pub value: String,
}

/// Produces one classifier fact on demand.
pub trait ClassifierSource: Send + Sync {
    /// Classifier key, unique within the registry.
    fn key(&self) -> &str;

    /// Human-readable description of the fact.
    fn description(&self) -> &str;

    /// Current value; re-read on every refresh cycle.
    fn value(&self) -> Result<String, MinionError>;
}

/// A classifier with a fixed value.
pub struct StaticClassifier {
    key: String,
    description: String,
    value: String,
}

impl StaticClassifier {
    pub fn new(
        key: impl Into<String>,
        description: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            description: description.into(),
            value: value.into(),
        }
    }
}

impl ClassifierSource for StaticClassifier {
    fn key(&self) -> &str {
        &self.key
    }
    fn description(&self) -> &str {
        &self.description
    }
    fn value(&self) -> Result<String, MinionError> {
        Ok(self.value.clone())
    }
}

/// Operating system of the host.
pub struct OsClassifier;

impl ClassifierSource for OsClassifier {
    fn key(&self) -> &str {
        "os"
    }
    fn description(&self) -> &str {
        "Operating system"
    }
    fn value(&self) -> Result<String, MinionError> {
        Ok(std::env::consts::OS.to_string())
    }
}

/// CPU architecture of the host.
pub struct ArchClassifier;

impl ClassifierSource for ArchClassifier {
    fn key(&self) -> &str {
        "arch"
    }
    fn description(&self) -> &str {
        "CPU architecture"
    }
    fn value(&self) -> Result<String, MinionError> {
        Ok(std::env::consts::ARCH.to_string())
    }
}

/// The set of classifier sources a minion refreshes periodically.
#[derive(Default)]
pub struct ClassifierRegistry {
    sources: Vec<Box<dyn ClassifierSource>>,
}

impl ClassifierRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in host facts registered.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(OsClassifier));
        registry.register(Box::new(ArchClassifier));
        registry
    }

    /// Registers a classifier source.
    pub fn register(&mut self, source: Box<dyn ClassifierSource>) {
        self.sources.push(source);
    }

    /// Iterates over the registered sources.
    pub fn iter(&self) -> impl Iterator<Item = &dyn ClassifierSource> {
        self.sources.iter().map(Box::as_ref)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
