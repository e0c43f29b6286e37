//! In-memory coordination store.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{
    GetOptions, KvAction, KvClient, KvError, KvNode, SetOptions, WatchEvent, WatchOptions, Watcher,
};

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

struct WatchRegistration {
    prefix: String,
    recursive: bool,
    tx: mpsc::UnboundedSender<WatchEvent>,
}

#[derive(Default)]
struct Inner {
    entries: BTreeMap<String, Entry>,
    watchers: Vec<WatchRegistration>,
}

/// In-memory [`KvClient`] realization.
///
/// Shares state across clones, so a minion and a test harness can hold
/// handles to the same store. TTL expiry is enforced lazily: every
/// operation first purges elapsed entries and emits `Expire` events
/// for them, which is sufficient for consumers that only observe
/// expiry on read.
#[derive(Clone, Default)]
pub struct MemoryKv {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    fn notify(inner: &mut Inner, action: KvAction, key: &str, value: &str) {
        inner.watchers.retain(|w| {
            let matches = if w.recursive {
                key.starts_with(&w.prefix)
            } else {
                key == w.prefix
            };
            if !matches {
                return true;
            }
            // A failed send means the watcher is gone; drop it.
            w.tx
                .send(WatchEvent {
                    action,
                    key: key.to_string(),
                    value: value.to_string(),
                })
                .is_ok()
        });
    }

    fn purge_expired(inner: &mut Inner, now: Instant) {
        let expired: Vec<(String, String)> = inner
            .entries
            .iter()
            .filter(|(_, e)| e.expires_at.is_some_and(|at| at <= now))
            .map(|(k, e)| (k.clone(), e.value.clone()))
            .collect();

        for (key, value) in expired {
            inner.entries.remove(&key);
            Self::notify(inner, KvAction::Expire, &key, &value);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned store mutex means a panic elsewhere already sank
        // the process; propagating the inner state is still sound.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Normalized subtree prefix for a directory-style key.
    fn subtree_prefix(key: &str) -> String {
        format!("{}/", key.trim_end_matches('/'))
    }
}

#[async_trait]
impl KvClient for MemoryKv {
    async fn set(&self, key: &str, value: &str, opts: SetOptions) -> Result<(), KvError> {
        let mut inner = self.lock();
        let now = Instant::now();
        Self::purge_expired(&mut inner, now);

        inner.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: opts.ttl.map(|ttl| now + ttl),
            },
        );
        Self::notify(&mut inner, KvAction::Set, key, value);
        Ok(())
    }

    async fn get(&self, key: &str, opts: GetOptions) -> Result<Vec<KvNode>, KvError> {
        let mut inner = self.lock();
        Self::purge_expired(&mut inner, Instant::now());

        if !opts.recursive {
            let entry = inner
                .entries
                .get(key)
                .ok_or_else(|| KvError::KeyNotFound(key.to_string()))?;
            return Ok(vec![KvNode {
                key: key.to_string(),
                value: entry.value.clone(),
            }]);
        }

        let prefix = Self::subtree_prefix(key);
        // BTreeMap iterates in key order, so the listing is sorted
        // whether or not the caller asked for it.
        let nodes = inner
            .entries
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .map(|(k, e)| KvNode {
                key: k.clone(),
                value: e.value.clone(),
            })
            .collect();
        Ok(nodes)
    }

    async fn delete(&self, key: &str) -> Result<(), KvError> {
        let mut inner = self.lock();
        Self::purge_expired(&mut inner, Instant::now());

        match inner.entries.remove(key) {
            Some(entry) => {
                Self::notify(&mut inner, KvAction::Delete, key, &entry.value);
                Ok(())
            }
            None => Err(KvError::KeyNotFound(key.to_string())),
        }
    }

    async fn watch(&self, prefix: &str, opts: WatchOptions) -> Result<Watcher, KvError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        inner.watchers.push(WatchRegistration {
            prefix: if opts.recursive {
                Self::subtree_prefix(prefix)
            } else {
                prefix.to_string()
            },
            recursive: opts.recursive,
            tx,
        });
        Ok(Watcher::new(rx))
    }
}
