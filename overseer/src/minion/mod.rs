//! Minion runtime.
//!
//! A minion is a long-running worker identified by a stable UUID. It
//! advertises its name, heartbeat and classifier facts in the
//! coordination store, consumes command tasks from its own queue
//! subtree and persists the results to its log subtree.
//!
//! [`Minion`] is the public capability contract; [`KvMinion`] is the
//! store-backed realization. Tests use it against
//! [`crate::kv::MemoryKv`].

mod classifier;
mod kv;
mod task;

pub use classifier::{
    ArchClassifier, Classifier, ClassifierRegistry, ClassifierSource, OsClassifier,
    StaticClassifier,
};
pub use kv::{KvMinion, KvMinionConfig, DEFAULT_CLASSIFIER_TTL, DEFAULT_HEARTBEAT_INTERVAL};
pub use task::MinionTask;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::kv::KvError;

/// Root namespace of the minion keyspace in the coordination store.
pub const MINION_SPACE: &str = "/gru/minion";

/// Errors that can occur in the minion runtime.
#[derive(Debug, Error)]
pub enum MinionError {
    #[error(transparent)]
    Kv(#[from] KvError),

    /// Task or classifier (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A classifier source could not produce its value.
    #[error("classifier error: {0}")]
    Classifier(String),
}

/// Derives the stable identifier of a minion from its name.
///
/// UUIDv5 over the DNS namespace, so two minions constructed with the
/// same name always carry the same identity and re-registration is
/// idempotent.
pub fn generate_uuid(name: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_DNS, name.as_bytes())
}

/// Capability contract of a minion.
#[async_trait]
pub trait Minion: Send + Sync {
    /// Unique identifier of the minion.
    fn id(&self) -> Uuid;

    /// Assigned human-readable name.
    fn name(&self) -> &str;

    /// Publishes one classifier fact to the store.
    async fn set_classifier(&self, source: &dyn ClassifierSource) -> Result<(), MinionError>;

    /// Listens for new tasks and forwards them for processing.
    async fn task_listener(
        &self,
        tasks: mpsc::UnboundedSender<MinionTask>,
    ) -> Result<(), MinionError>;

    /// Runs tasks as delivered by the listener.
    async fn task_runner(
        &self,
        tasks: mpsc::UnboundedReceiver<MinionTask>,
    ) -> Result<(), MinionError>;

    /// Starts serving: registration, heartbeat, backlog drain, task
    /// listener and runner; returns after shutdown is requested.
    async fn serve(&self) -> Result<(), MinionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_uuid_is_stable() {
        let a = generate_uuid("kevin");
        let b = generate_uuid("kevin");
        assert_eq!(a, b);
    }

    #[test]
    fn test_generate_uuid_differs_per_name() {
        assert_ne!(generate_uuid("kevin"), generate_uuid("bob"));
    }

    #[test]
    fn test_generate_uuid_canonical_form() {
        let rendered = generate_uuid("kevin").to_string();
        // 8-4-4-4-12 hyphenated hex.
        assert_eq!(rendered.len(), 36);
        assert_eq!(rendered.matches('-').count(), 4);
    }
}
