//! Resource abstraction.
//!
//! A resource is a declaratively managed entity (a file, a package, a
//! service) with a desired life state and an observed one. Providers
//! implement the [`Resource`] capability per kind and register
//! themselves in a [`Registry`] so the module loader can dispatch by
//! kind name.
//!
//! Resources are created by the module loader during catalog load,
//! mutated only by the catalog evaluation loop (one at a time), and
//! discarded at the end of a run.

mod file;
mod registry;

pub use file::{file_provider, FileResource};
pub use registry::{Provider, Registry};

use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during resource operations.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// I/O failure while probing or actuating the managed entity.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A resource declaration carried an invalid attribute.
    #[error("invalid attribute in resource {resource}: {reason}")]
    InvalidAttribute { resource: String, reason: String },

    /// Provider-specific failure.
    #[error("provider error: {0}")]
    Provider(String),
}

/// Canonical resource identifier, `"<kind>[<name>]"`.
///
/// Unique within a catalog; also the node key in the resource
/// dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    /// Builds the identifier for a kind and a resource name.
    pub fn new(kind: &str, name: &str) -> Self {
        Self(format!("{}[{}]", kind, name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ResourceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ResourceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Life state of a managed entity.
///
/// `Unknown` is only ever observed, never declared as a want.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifeState {
    Present,
    Running,
    Absent,
    Stopped,
    Unknown,
}

impl LifeState {
    /// True for the states that mean "the entity exists / is active".
    pub fn is_up(self) -> bool {
        matches!(self, LifeState::Present | LifeState::Running)
    }

    /// True for the states that mean "the entity is gone / inactive".
    pub fn is_down(self) -> bool {
        matches!(self, LifeState::Absent | LifeState::Stopped)
    }
}

impl fmt::Display for LifeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifeState::Present => "present",
            LifeState::Running => "running",
            LifeState::Absent => "absent",
            LifeState::Stopped => "stopped",
            LifeState::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Result of evaluating a resource against the live system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct State {
    /// Declared life state.
    pub want: LifeState,
    /// Observed life state.
    pub current: LifeState,
    /// True when observed attributes diverge from the declared ones
    /// while the life state itself matches.
    pub update: bool,
}

/// Capability set every resource kind implements.
///
/// `evaluate` must be read-only: probing the system twice without any
/// change in between yields the same [`State`].
pub trait Resource: Send {
    /// Canonical identifier, unique within a catalog.
    fn resource_id(&self) -> ResourceId;

    /// Resources this one must be ordered before.
    fn want_before(&self) -> &[ResourceId];

    /// Resources this one must be ordered after.
    fn want_after(&self) -> &[ResourceId];

    /// Probes the live system and reports declared vs. observed state.
    fn evaluate(&self) -> Result<State, ResourceError>;

    /// Brings an absent/stopped entity to its present/running state.
    fn create(&self) -> Result<(), ResourceError>;

    /// Removes or stops the entity.
    fn delete(&self) -> Result<(), ResourceError>;

    /// Reconciles diverged attributes on an entity whose life state
    /// already matches.
    fn update(&self) -> Result<(), ResourceError>;
}

impl fmt::Debug for dyn Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Resource").field(&self.resource_id()).finish()
    }
}
