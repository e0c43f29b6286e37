//! Store-backed minion.
//!
//! [`KvMinion`] keeps a small, fixed set of long-lived activities
//! running until shutdown:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          KvMinion                            │
//! │                                                              │
//! │  periodic runner ──► classifier/<key> (TTL), lastseen        │
//! │                                                              │
//! │  queue backlog ──┐                                           │
//! │                  ├──► task channel ──► task runner           │
//! │  queue watch ────┘                      │        │           │
//! │                                    (serial)  (concurrent     │
//! │                                         │      worker)       │
//! │                                         ▼                    │
//! │                                    log/<taskid>              │
//! │                                                              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Task delivery is at-least-once for submission and at-most-once for
//! effect: the listener removes a queue entry before the command runs,
//! so a crash in between loses the result, not the (possibly already
//! performed) side effect. There is no automatic re-submission across
//! crashes; operators requiring exactly-once make commands idempotent.
//!
//! Shutdown cancels the long-lived activities between tasks; a command
//! already in flight is left to finish in its own time and there is no
//! task-level timeout, so a hung child process hangs the serial runner.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::kv::{GetOptions, KvAction, KvClient, SetOptions, WatchOptions};

use super::{
    generate_uuid, Classifier, ClassifierRegistry, ClassifierSource, Minion, MinionError,
    MinionTask, MINION_SPACE,
};

/// Default interval between heartbeat/classifier refresh cycles.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Default lifetime of a published classifier fact.
pub const DEFAULT_CLASSIFIER_TTL: Duration = Duration::from_secs(60 * 60);

/// Tunables of the store-backed minion.
#[derive(Debug, Clone, Copy)]
pub struct KvMinionConfig {
    /// Interval of the periodic runner. The first cycle fires
    /// immediately on startup.
    pub heartbeat_interval: Duration,

    /// TTL applied to classifier entries; stale facts disappear from
    /// the store once a minion stops refreshing them.
    pub classifier_ttl: Duration,
}

impl Default for KvMinionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            classifier_ttl: DEFAULT_CLASSIFIER_TTL,
        }
    }
}

/// A minion backed by the coordination store.
///
/// Cheap to clone; clones share the store handle, the classifier
/// registry and the shutdown token.
#[derive(Clone)]
pub struct KvMinion {
    name: String,
    id: Uuid,
    root_dir: String,
    queue_dir: String,
    classifier_dir: String,
    log_dir: String,
    kv: Arc<dyn KvClient>,
    classifiers: Arc<ClassifierRegistry>,
    config: KvMinionConfig,
    shutdown: CancellationToken,
}

impl KvMinion {
    /// Creates a new minion. The identity is derived from `name`, so
    /// constructing the same name twice yields the same subtree.
    pub fn new(
        name: impl Into<String>,
        kv: Arc<dyn KvClient>,
        classifiers: Arc<ClassifierRegistry>,
        config: KvMinionConfig,
    ) -> Self {
        let name = name.into();
        let id = generate_uuid(&name);
        let root_dir = format!("{}/{}", MINION_SPACE, id);

        Self {
            queue_dir: format!("{}/queue", root_dir),
            classifier_dir: format!("{}/classifier", root_dir),
            log_dir: format!("{}/log", root_dir),
            root_dir,
            name,
            id,
            kv,
            classifiers,
            config,
            shutdown: CancellationToken::new(),
        }
    }

    /// Token that stops [`Minion::serve`] when cancelled; the
    /// programmatic equivalent of an interrupt.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Registers the human-readable name under the minion's subtree.
    async fn set_name(&self) -> Result<(), MinionError> {
        let key = format!("{}/name", self.root_dir);
        self.kv.set(&key, &self.name, SetOptions::default()).await?;
        Ok(())
    }

    /// Records the time the minion was last seen, in epoch seconds.
    async fn set_lastseen(&self, seconds: i64) -> Result<(), MinionError> {
        let key = format!("{}/lastseen", self.root_dir);
        self.kv
            .set(&key, &seconds.to_string(), SetOptions::default())
            .await?;
        Ok(())
    }

    /// Refreshes classifiers and the lastseen stamp on every tick
    /// until shutdown. Store errors are logged and retried on the
    /// next cycle.
    async fn periodic_runner(&self) {
        let mut ticker = time::interval(self.config.heartbeat_interval);
        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => return,

                _ = ticker.tick() => {
                    for source in self.classifiers.iter() {
                        if let Err(e) = self.set_classifier(source).await {
                            warn!(classifier = source.key(), "failed to refresh classifier: {}", e);
                        }
                    }
                    if let Err(e) = self.set_lastseen(Utc::now().timestamp()).await {
                        warn!("failed to update lastseen time: {}", e);
                    }
                }
            }
        }
    }

    /// Drains tasks already sitting in the queue, in store-sorted
    /// order, before the watch-driven listener takes over.
    ///
    /// Entries are removed from the queue as they are picked up;
    /// entries that fail to deserialize are dropped with a log line.
    async fn check_queue(
        &self,
        tasks: &mpsc::UnboundedSender<MinionTask>,
    ) -> Result<(), MinionError> {
        let opts = GetOptions {
            recursive: true,
            sort: true,
        };
        let backlog = match self.kv.get(&self.queue_dir, opts).await {
            Ok(nodes) => nodes,
            Err(e) => {
                debug!("queue backlog unavailable: {}", e);
                return Ok(());
            }
        };
        if backlog.is_empty() {
            return Ok(());
        }

        info!("found {} tasks in backlog", backlog.len());
        for node in backlog {
            let parsed: Result<MinionTask, _> = serde_json::from_str(&node.value);
            if let Err(e) = self.kv.delete(&node.key).await {
                warn!(key = %node.key, "failed to remove task from queue: {}", e);
            }
            match parsed {
                Ok(task) => {
                    if tasks.send(task).is_err() {
                        return Ok(());
                    }
                }
                Err(e) => warn!(key = %node.key, "invalid task: {}", e),
            }
        }

        Ok(())
    }

    /// Executes one task and persists the outcome to the log subtree.
    async fn process_task(&self, mut task: MinionTask) -> Result<(), MinionError> {
        info!(task = %task.task_id, command = %task.command, "processing task");

        let output = Command::new(&task.command).args(&task.args).output().await;
        task.time_processed = Utc::now().timestamp();

        match output {
            Ok(output) => {
                let mut merged = String::from_utf8_lossy(&output.stdout).into_owned();
                merged.push_str(&String::from_utf8_lossy(&output.stderr));
                task.result = merged;

                if output.status.success() {
                    info!(task = %task.task_id, "finished processing task");
                } else {
                    task.error = output.status.to_string();
                    warn!(task = %task.task_id, status = %output.status, "task command failed");
                }
            }
            Err(e) => {
                task.error = e.to_string();
                warn!(task = %task.task_id, "failed to run task command: {}", e);
            }
        }

        self.save_task(&task).await
    }

    /// Writes a processed task to the minion's log.
    async fn save_task(&self, task: &MinionTask) -> Result<(), MinionError> {
        let key = format!("{}/{}", self.log_dir, task.task_id);
        let data = serde_json::to_string(task)?;
        self.kv.set(&key, &data, SetOptions::default()).await?;
        Ok(())
    }
}

#[async_trait]
impl Minion for KvMinion {
    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn set_classifier(&self, source: &dyn ClassifierSource) -> Result<(), MinionError> {
        let classifier = Classifier {
            key: source.key().to_string(),
            description: source.description().to_string(),
            value: source.value()?,
        };
        let data = serde_json::to_string(&classifier)?;
        let key = format!("{}/{}", self.classifier_dir, classifier.key);
        self.kv
            .set(&key, &data, SetOptions::with_ttl(self.config.classifier_ttl))
            .await?;
        Ok(())
    }

    /// Watches the queue subtree and forwards new tasks.
    ///
    /// `Delete` events are the listener's own queue removals and are
    /// ignored. Watch errors are logged and the watch is
    /// re-established.
    async fn task_listener(
        &self,
        tasks: mpsc::UnboundedSender<MinionTask>,
    ) -> Result<(), MinionError> {
        let opts = WatchOptions { recursive: true };
        let mut watcher = self.kv.watch(&self.queue_dir, opts).await?;

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => return Ok(()),

                event = watcher.next() => {
                    let event = match event {
                        Ok(event) => event,
                        Err(e) => {
                            warn!("failed to read task event: {}", e);
                            watcher = self.kv.watch(&self.queue_dir, opts).await?;
                            continue;
                        }
                    };

                    if event.action != KvAction::Set {
                        continue;
                    }

                    let parsed: Result<MinionTask, _> = serde_json::from_str(&event.value);
                    if let Err(e) = self.kv.delete(&event.key).await {
                        warn!(key = %event.key, "failed to remove task from queue: {}", e);
                    }
                    match parsed {
                        Ok(task) => {
                            info!(task = %task.task_id, "received task");
                            if tasks.send(task).is_err() {
                                return Ok(());
                            }
                        }
                        Err(e) => warn!(key = %event.key, "invalid task: {}", e),
                    }
                }
            }
        }
    }

    /// Processes tasks as delivered by the listener.
    ///
    /// Non-concurrent tasks run inline, serializing with each other in
    /// delivery order; a task marked concurrent is handed to its own
    /// worker so the runner keeps draining the channel.
    async fn task_runner(
        &self,
        mut tasks: mpsc::UnboundedReceiver<MinionTask>,
    ) -> Result<(), MinionError> {
        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => return Ok(()),

                received = tasks.recv() => {
                    let Some(mut task) = received else { return Ok(()) };
                    task.time_received = Utc::now().timestamp();

                    if task.is_concurrent {
                        let minion = self.clone();
                        tokio::spawn(async move {
                            if let Err(e) = minion.process_task(task).await {
                                error!("failed to process task: {}", e);
                            }
                        });
                    } else if let Err(e) = self.process_task(task).await {
                        error!("failed to process task: {}", e);
                    }
                }
            }
        }
    }

    async fn serve(&self) -> Result<(), MinionError> {
        self.set_name().await?;
        info!(minion = %self.id, name = %self.name, "minion is ready to serve");

        let periodic = {
            let minion = self.clone();
            tokio::spawn(async move { minion.periodic_runner().await })
        };

        let (tx, rx) = mpsc::unbounded_channel();
        self.check_queue(&tx).await?;

        let listener = {
            let minion = self.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                if let Err(e) = minion.task_listener(tx).await {
                    error!("task listener terminated: {}", e);
                }
            })
        };
        let runner = {
            let minion = self.clone();
            tokio::spawn(async move {
                if let Err(e) = minion.task_runner(rx).await {
                    error!("task runner terminated: {}", e);
                }
            })
        };
        drop(tx);

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received, shutting down");
            }
            _ = self.shutdown.cancelled() => {
                info!("shutdown requested");
            }
        }
        self.shutdown.cancel();

        let _ = periodic.await;
        let _ = listener.await;
        let _ = runner.await;
        Ok(())
    }
}
