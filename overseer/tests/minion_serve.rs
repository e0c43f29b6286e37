//! Minion runtime scenarios against the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout};

use overseer::kv::{GetOptions, KvClient, MemoryKv, SetOptions};
use overseer::minion::{
    ClassifierRegistry, KvMinion, KvMinionConfig, Minion, MinionTask, MINION_SPACE,
};

const WAIT: Duration = Duration::from_secs(5);

fn spawn_minion(kv: &MemoryKv) -> KvMinion {
    let minion = KvMinion::new(
        "kevin",
        Arc::new(kv.clone()),
        Arc::new(ClassifierRegistry::with_builtin()),
        KvMinionConfig::default(),
    );
    let serving = minion.clone();
    tokio::spawn(async move { serving.serve().await });
    minion
}

async fn queue_task(kv: &MemoryKv, minion: &KvMinion, task: &MinionTask) {
    let key = format!("{}/{}/queue/{}", MINION_SPACE, minion.id(), task.task_id);
    kv.set(&key, &serde_json::to_string(task).unwrap(), SetOptions::default())
        .await
        .unwrap();
}

async fn wait_for_log(kv: &MemoryKv, minion: &KvMinion, task: &MinionTask) -> MinionTask {
    let key = format!("{}/{}/log/{}", MINION_SPACE, minion.id(), task.task_id);
    timeout(WAIT, async {
        loop {
            if let Ok(nodes) = kv.get(&key, GetOptions::default()).await {
                return serde_json::from_str::<MinionTask>(&nodes[0].value).unwrap();
            }
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("task never reached the log")
}

async fn log_exists(kv: &MemoryKv, minion: &KvMinion, task: &MinionTask) -> bool {
    let key = format!("{}/{}/log/{}", MINION_SPACE, minion.id(), task.task_id);
    kv.get(&key, GetOptions::default()).await.is_ok()
}

#[tokio::test]
async fn serve_registers_name_heartbeat_and_classifiers() {
    let kv = MemoryKv::new();
    let minion = spawn_minion(&kv);
    let root = format!("{}/{}", MINION_SPACE, minion.id());

    timeout(WAIT, async {
        loop {
            let name_ok = kv
                .get(&format!("{}/name", root), GetOptions::default())
                .await
                .map(|nodes| nodes[0].value == "kevin")
                .unwrap_or(false);
            let lastseen_ok = kv
                .get(&format!("{}/lastseen", root), GetOptions::default())
                .await
                .map(|nodes| nodes[0].value.parse::<i64>().is_ok())
                .unwrap_or(false);
            let os_ok = kv
                .get(&format!("{}/classifier/os", root), GetOptions::default())
                .await
                .is_ok();
            if name_ok && lastseen_ok && os_ok {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("registration never completed");

    minion.shutdown_token().cancel();
}

#[tokio::test]
async fn backlog_is_drained_in_order_before_watch_delivery() {
    let kv = MemoryKv::new();

    // Seed the queue before the minion starts; key order decides the
    // drain order, so give the tasks fixed, sorted ids.
    let registry = Arc::new(ClassifierRegistry::new());
    let minion = KvMinion::new(
        "kevin",
        Arc::new(kv.clone()),
        registry,
        KvMinionConfig::default(),
    );

    let mut first = MinionTask::new("echo", vec!["first".to_string()]);
    first.task_id = "00000000-0000-4000-8000-000000000001".parse().unwrap();
    let mut second = MinionTask::new("echo", vec!["second".to_string()]);
    second.task_id = "00000000-0000-4000-8000-000000000002".parse().unwrap();

    queue_task(&kv, &minion, &first).await;
    queue_task(&kv, &minion, &second).await;

    let serving = minion.clone();
    tokio::spawn(async move { serving.serve().await });

    let first_logged = wait_for_log(&kv, &minion, &first).await;
    let second_logged = wait_for_log(&kv, &minion, &second).await;

    assert_eq!(first_logged.result, "first\n");
    assert_eq!(second_logged.result, "second\n");
    assert!(first_logged.time_received <= second_logged.time_received);

    // Both entries were consumed from the queue.
    let queue = kv
        .get(
            &format!("{}/{}/queue", MINION_SPACE, minion.id()),
            GetOptions {
                recursive: true,
                sort: true,
            },
        )
        .await
        .unwrap();
    assert!(queue.is_empty());

    minion.shutdown_token().cancel();
}

#[tokio::test]
async fn watched_task_is_consumed_executed_and_logged() {
    let kv = MemoryKv::new();
    let minion = spawn_minion(&kv);

    // Give the listener a moment to establish its watch.
    sleep(Duration::from_millis(50)).await;

    let task = MinionTask::new("echo", vec!["over", "the", "wire"].iter().map(|s| s.to_string()).collect());
    queue_task(&kv, &minion, &task).await;

    let logged = wait_for_log(&kv, &minion, &task).await;
    assert_eq!(logged.result, "over the wire\n");
    assert!(logged.succeeded());
    assert!(logged.time_received > 0);
    assert!(logged.time_processed >= logged.time_received);

    minion.shutdown_token().cancel();
}

#[tokio::test]
async fn failing_command_is_logged_with_error() {
    let kv = MemoryKv::new();
    let minion = spawn_minion(&kv);
    sleep(Duration::from_millis(50)).await;

    let task = MinionTask::new("overseer-missing-binary", vec![]);
    queue_task(&kv, &minion, &task).await;

    let logged = wait_for_log(&kv, &minion, &task).await;
    assert!(!logged.succeeded());
    assert!(!logged.error.is_empty());

    minion.shutdown_token().cancel();
}

#[tokio::test]
async fn invalid_queue_entry_is_dropped() {
    let kv = MemoryKv::new();
    let minion = spawn_minion(&kv);
    sleep(Duration::from_millis(50)).await;

    let bogus_key = format!("{}/{}/queue/not-a-task", MINION_SPACE, minion.id());
    kv.set(&bogus_key, "not json", SetOptions::default())
        .await
        .unwrap();

    // A well-formed task behind it still gets through.
    let task = MinionTask::new("echo", vec!["alive".to_string()]);
    queue_task(&kv, &minion, &task).await;

    let logged = wait_for_log(&kv, &minion, &task).await;
    assert!(logged.succeeded());

    // The malformed entry was removed from the queue.
    assert!(kv.get(&bogus_key, GetOptions::default()).await.is_err());

    minion.shutdown_token().cancel();
}

#[tokio::test]
async fn concurrent_task_does_not_block_serial_tasks() {
    let kv = MemoryKv::new();
    let minion = spawn_minion(&kv);
    sleep(Duration::from_millis(50)).await;

    let slow = MinionTask::new("sleep", vec!["2".to_string()]).concurrent();
    let quick = MinionTask::new("echo", vec!["quick".to_string()]);

    queue_task(&kv, &minion, &slow).await;
    queue_task(&kv, &minion, &quick).await;

    // The quick serial task completes while the concurrent sleep is
    // still running.
    let logged = wait_for_log(&kv, &minion, &quick).await;
    assert_eq!(logged.result, "quick\n");
    assert!(
        !log_exists(&kv, &minion, &slow).await,
        "concurrent task should still be in flight"
    );

    let slow_logged = wait_for_log(&kv, &minion, &slow).await;
    assert!(slow_logged.succeeded());

    minion.shutdown_token().cancel();
}
