//! Coordination store client facade.
//!
//! A narrow, mockable interface over the coordination store: keys are
//! `/`-separated hierarchical paths, values are strings, entries may
//! carry a TTL, and prefixes can be listed recursively or watched for
//! changes. The facade hides retry and reconnection; consumers assume
//! watches resume after transient disconnects.
//!
//! [`MemoryKv`] is the built-in realization, used by the test suites
//! and by local single-process deployments. Production stores plug in
//! by implementing [`KvClient`].

mod memory;

pub use memory::MemoryKv;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum KvError {
    /// The requested key does not exist.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// The store could not be reached or answered abnormally.
    #[error("store transport error: {0}")]
    Transport(String),

    /// The watch stream ended and cannot produce further events.
    #[error("watch closed")]
    WatchClosed,
}

/// What happened to a watched key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KvAction {
    Set,
    Delete,
    Expire,
}

/// A single key/value entry returned by [`KvClient::get`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvNode {
    pub key: String,
    pub value: String,
}

/// A change notification from a watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub action: KvAction,
    pub key: String,
    /// New value for `Set`; last known value for `Delete`/`Expire`.
    pub value: String,
}

/// Options for [`KvClient::set`]. Sets are unconditional upserts.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetOptions {
    /// Entry lifetime; the store expires the key once it elapses.
    pub ttl: Option<Duration>,
}

impl SetOptions {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self { ttl: Some(ttl) }
    }
}

/// Options for [`KvClient::get`].
#[derive(Debug, Clone, Copy, Default)]
pub struct GetOptions {
    /// List every entry under the key instead of the key itself.
    pub recursive: bool,
    /// Order the listing by key.
    pub sort: bool,
}

/// Options for [`KvClient::watch`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WatchOptions {
    /// Watch the whole subtree under the prefix.
    pub recursive: bool,
}

/// Stream of [`WatchEvent`]s for a watched prefix.
pub struct Watcher {
    rx: mpsc::UnboundedReceiver<WatchEvent>,
}

impl Watcher {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<WatchEvent>) -> Self {
        Self { rx }
    }

    /// Waits for the next event.
    ///
    /// # Errors
    ///
    /// [`KvError::WatchClosed`] once the store side of the stream is
    /// gone.
    pub async fn next(&mut self) -> Result<WatchEvent, KvError> {
        self.rx.recv().await.ok_or(KvError::WatchClosed)
    }
}

/// Client capability over the coordination store.
#[async_trait]
pub trait KvClient: Send + Sync {
    /// Writes a key, unconditionally replacing any previous value.
    async fn set(&self, key: &str, value: &str, opts: SetOptions) -> Result<(), KvError>;

    /// Reads a key, or lists a subtree when `opts.recursive` is set.
    async fn get(&self, key: &str, opts: GetOptions) -> Result<Vec<KvNode>, KvError>;

    /// Removes a key.
    async fn delete(&self, key: &str) -> Result<(), KvError>;

    /// Starts watching a prefix for changes.
    async fn watch(&self, prefix: &str, opts: WatchOptions) -> Result<Watcher, KvError>;
}
