//! State store contract tests
//!
//! The same suite runs against the memory backend and the persistent (redb)
//! backend; both must expose identical observable behavior.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use linkstash::errors::LinkstashError;
use linkstash::storage::{
    BatchMode, Item, MemoryStateStore, PersistentStateStore, StateStore, StoreState,
};
use tempfile::TempDir;

// =============================================================================
// Test Setup
// =============================================================================

/// 测试用存储，持有临时目录直到测试结束
struct Harness {
    store: Arc<dyn StateStore>,
    _dir: Option<TempDir>,
}

/// 创建并初始化内存存储
async fn memory(batch_mode: BatchMode) -> Harness {
    let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new(batch_mode));
    store.init().await.expect("memory init failed");
    Harness { store, _dir: None }
}

/// 在临时目录中创建并初始化持久化存储
async fn persistent(batch_mode: BatchMode) -> Harness {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store: Arc<dyn StateStore> = Arc::new(PersistentStateStore::with_options(
        dir.path().join("state"),
        Duration::from_secs(3600),
        batch_mode,
    ));
    store.init().await.expect("persistent init failed");
    Harness {
        store,
        _dir: Some(dir),
    }
}

fn keys_of(items: &[Item]) -> HashSet<String> {
    items.iter().map(|item| item.key.clone()).collect()
}

// =============================================================================
// Contract checks
// =============================================================================

async fn check_write_then_read(store: &dyn StateStore) {
    let cases: [(&str, &str, Result<(), LinkstashError>); 3] = [
        ("key0", "value0", Ok(())),
        ("key1", "value1", Ok(())),
        (
            "key0",
            "other",
            Err(LinkstashError::key_already_exists("key0")),
        ),
    ];
    for (key, value, expected) in cases {
        assert_eq!(store.save(Item::new(key, value)).await, expected, "save {key}");
    }

    assert_eq!(store.load("key0").await.unwrap(), "value0");
    assert_eq!(store.load("key1").await.unwrap(), "value1");
    assert_eq!(
        store.load("_key3").await,
        Err(LinkstashError::key_not_found("_key3"))
    );
}

async fn check_load_all(store: &dyn StateStore) {
    assert!(store.load_all().await.unwrap().is_empty());

    let expected: Vec<Item> = (0..10)
        .map(|i| Item::new(format!("key{i}"), format!("https://example.com/{i}")))
        .collect();
    for item in &expected {
        store.save(item.clone()).await.unwrap();
    }

    let mut all = store.load_all().await.unwrap();
    all.sort_by(|a, b| a.key.cmp(&b.key));
    let mut sorted = expected.clone();
    sorted.sort_by(|a, b| a.key.cmp(&b.key));
    assert_eq!(all, sorted);
}

async fn check_delete(store: &dyn StateStore) {
    store.save(Item::new("gone", "https://gone.example")).await.unwrap();
    store.save(Item::new("kept", "https://kept.example")).await.unwrap();

    assert_eq!(
        store.delete("gone").await.unwrap().as_deref(),
        Some("https://gone.example")
    );
    assert!(matches!(
        store.load("gone").await,
        Err(LinkstashError::KeyNotFound(_))
    ));
    // 删除不存在的 key 不是错误
    assert_eq!(store.delete("gone").await.unwrap(), None);
    assert_eq!(store.delete("never-existed").await.unwrap(), None);

    assert_eq!(store.load("kept").await.unwrap(), "https://kept.example");

    // 删除后可以重新写入
    store.save(Item::new("gone", "https://again.example")).await.unwrap();
    assert_eq!(store.load("gone").await.unwrap(), "https://again.example");
}

async fn check_concurrent_saves(store: Arc<dyn StateStore>) {
    let mut handles = Vec::new();
    for worker in 0..8 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            for i in 0..25 {
                store
                    .save(Item::new(format!("w{worker}-{i}"), format!("v{worker}-{i}")))
                    .await
                    .expect("distinct key save failed");
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(store.load_all().await.unwrap().len(), 8 * 25);

    // 同一个 key 并发写入，只能有一个成功
    let mut racers = Vec::new();
    for worker in 0..8 {
        let store = Arc::clone(&store);
        racers.push(tokio::spawn(async move {
            store
                .save(Item::new("race", format!("winner-{worker}")))
                .await
        }));
    }
    let mut winners = 0;
    for racer in racers {
        match racer.await.unwrap() {
            Ok(()) => winners += 1,
            Err(e) => assert_eq!(e, LinkstashError::key_already_exists("race")),
        }
    }
    assert_eq!(winners, 1);
    assert!(store.load("race").await.unwrap().starts_with("winner-"));
}

async fn check_atomic_batch(store: &dyn StateStore) {
    store.save(Item::new("b", "original")).await.unwrap();

    let err = store
        .save_all(vec![
            Item::new("a", "1"),
            Item::new("b", "2"),
            Item::new("c", "3"),
        ])
        .await
        .unwrap_err();
    assert_eq!(err, LinkstashError::batch_rejected(vec!["b".to_string()]));

    // 整批未写入
    assert!(matches!(store.load("a").await, Err(LinkstashError::KeyNotFound(_))));
    assert!(matches!(store.load("c").await, Err(LinkstashError::KeyNotFound(_))));
    assert_eq!(store.load("b").await.unwrap(), "original");

    // 批次内重复的 key 同样导致整批拒绝
    let err = store
        .save_all(vec![Item::new("d", "1"), Item::new("d", "2")])
        .await
        .unwrap_err();
    assert_eq!(err, LinkstashError::batch_rejected(vec!["d".to_string()]));
    assert!(matches!(store.load("d").await, Err(LinkstashError::KeyNotFound(_))));

    let outcome = store
        .save_all(vec![Item::new("x", "1"), Item::new("y", "2")])
        .await
        .unwrap();
    assert_eq!(outcome.saved, 2);
    assert!(outcome.skipped.is_empty());
    assert_eq!(store.load("y").await.unwrap(), "2");
}

async fn check_best_effort_batch(store: &dyn StateStore) {
    store.save(Item::new("b", "original")).await.unwrap();

    let outcome = store
        .save_all(vec![
            Item::new("a", "1"),
            Item::new("b", "2"),
            Item::new("c", "3"),
            Item::new("a", "4"),
        ])
        .await
        .unwrap();
    assert_eq!(outcome.saved, 2);
    assert_eq!(outcome.skipped, vec!["b".to_string(), "a".to_string()]);

    assert_eq!(store.load("a").await.unwrap(), "1");
    assert_eq!(store.load("b").await.unwrap(), "original");
    assert_eq!(store.load("c").await.unwrap(), "3");
}

async fn check_empty_batch(store: &dyn StateStore) {
    let outcome = store.save_all(Vec::new()).await.unwrap();
    assert_eq!(outcome.saved, 0);
    assert!(outcome.skipped.is_empty());
}

async fn check_lifecycle(store: &dyn StateStore) {
    assert_eq!(store.state(), StoreState::Ready);
    store.save(Item::new("k", "v")).await.unwrap();

    store.close().await;
    store.close().await;
    assert_eq!(store.state(), StoreState::Closed);

    assert!(matches!(
        store.save(Item::new("k2", "v")).await,
        Err(LinkstashError::StoreNotReady(_))
    ));
    assert!(matches!(store.load("k").await, Err(LinkstashError::StoreNotReady(_))));
    assert!(matches!(store.delete("k").await, Err(LinkstashError::StoreNotReady(_))));
    assert!(matches!(
        store.save_all(vec![Item::new("k3", "v")]).await,
        Err(LinkstashError::StoreNotReady(_))
    ));
    // 关闭后不能再次 init
    assert!(store.init().await.is_err());
}

// =============================================================================
// 两个后端共享的测试套件
// =============================================================================

macro_rules! state_store_contract {
    ($name:ident, $factory:ident) => {
        #[cfg(test)]
        mod $name {
            use super::*;

            #[tokio::test]
            async fn write_then_read() {
                let h = $factory(BatchMode::Atomic).await;
                check_write_then_read(h.store.as_ref()).await;
            }

            #[tokio::test]
            async fn load_all_returns_every_item() {
                let h = $factory(BatchMode::Atomic).await;
                check_load_all(h.store.as_ref()).await;
            }

            #[tokio::test]
            async fn delete_returns_previous_value() {
                let h = $factory(BatchMode::Atomic).await;
                check_delete(h.store.as_ref()).await;
            }

            #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
            async fn concurrent_saves() {
                let h = $factory(BatchMode::Atomic).await;
                check_concurrent_saves(Arc::clone(&h.store)).await;
            }

            #[tokio::test]
            async fn atomic_batch_is_all_or_nothing() {
                let h = $factory(BatchMode::Atomic).await;
                check_atomic_batch(h.store.as_ref()).await;
            }

            #[tokio::test]
            async fn best_effort_batch_skips_conflicts() {
                let h = $factory(BatchMode::BestEffort).await;
                check_best_effort_batch(h.store.as_ref()).await;
            }

            #[tokio::test]
            async fn empty_batch_is_noop() {
                let atomic = $factory(BatchMode::Atomic).await;
                check_empty_batch(atomic.store.as_ref()).await;
                let best_effort = $factory(BatchMode::BestEffort).await;
                check_empty_batch(best_effort.store.as_ref()).await;
            }

            #[tokio::test]
            async fn closed_store_rejects_operations() {
                let h = $factory(BatchMode::Atomic).await;
                check_lifecycle(h.store.as_ref()).await;
            }
        }
    };
}

state_store_contract!(memory_backend, memory);
state_store_contract!(persistent_backend, persistent);

// =============================================================================
// 持久化后端专属测试
// =============================================================================

#[cfg(test)]
mod persistent_only_tests {
    use super::*;

    fn store_at(path: &std::path::Path) -> PersistentStateStore {
        PersistentStateStore::with_options(path, Duration::from_secs(3600), BatchMode::Atomic)
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state");

        let store = store_at(&path);
        store.init().await.unwrap();
        store.save(Item::new("keep", "https://keep.example")).await.unwrap();
        store.save(Item::new("drop", "https://drop.example")).await.unwrap();
        store.delete("drop").await.unwrap();
        store
            .save_all(vec![Item::new("b1", "1"), Item::new("b2", "2")])
            .await
            .unwrap();
        store.close().await;

        let reopened = store_at(&path);
        reopened.init().await.unwrap();
        assert_eq!(reopened.load("keep").await.unwrap(), "https://keep.example");
        assert!(matches!(
            reopened.load("drop").await,
            Err(LinkstashError::KeyNotFound(_))
        ));
        assert_eq!(
            keys_of(&reopened.load_all().await.unwrap()),
            HashSet::from(["keep".to_string(), "b1".to_string(), "b2".to_string()])
        );
        reopened.close().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn close_waits_for_in_flight_operations_before_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state");

        let store = Arc::new(store_at(&path));
        store.init().await.unwrap();
        let items: Vec<Item> = (0..200)
            .map(|i| Item::new(format!("key_{i}"), "x".repeat(128)))
            .collect();
        store.save_all(items).await.unwrap();

        // 并发全量扫描，直到存储关闭
        let mut readers = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            readers.push(tokio::spawn(async move {
                loop {
                    match store.load_all().await {
                        Ok(items) => assert_eq!(items.len(), 200),
                        Err(LinkstashError::StoreNotReady(_)) => break,
                        Err(e) => panic!("unexpected error: {e:?}"),
                    }
                }
            }));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        store.close().await;
        assert_eq!(store.state(), StoreState::Closed);

        // close 返回时文件已释放，同一路径立即可以重新打开
        let reopened = store_at(&path);
        reopened.init().await.unwrap();
        assert_eq!(reopened.load_all().await.unwrap().len(), 200);

        for reader in readers {
            reader.await.unwrap();
        }
        reopened.close().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn dropped_request_future_still_holds_close() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state");

        let store = Arc::new(store_at(&path));
        store.init().await.unwrap();
        for i in 0..100 {
            store
                .save(Item::new(format!("key_{i}"), "y".repeat(256)))
                .await
                .unwrap();
        }

        // 调用方的 future 被取消，阻塞线程上的扫描仍在进行
        for _ in 0..8 {
            let store = Arc::clone(&store);
            let task = tokio::spawn(async move { store.load_all().await });
            tokio::task::yield_now().await;
            task.abort();
        }

        store.close().await;

        let reopened = store_at(&path);
        reopened.init().await.unwrap();
        assert_eq!(reopened.load_all().await.unwrap().len(), 100);
        reopened.close().await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn second_instance_on_same_path_is_locked() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state");

        let first = store_at(&path);
        first.init().await.unwrap();

        let second = store_at(&path);
        let err = second.init().await.unwrap_err();
        assert!(matches!(err, LinkstashError::StoreLocked(_)), "got {err:?}");
        assert_eq!(second.state(), StoreState::Failed);

        // 第一个实例不受影响
        first.save(Item::new("k", "v")).await.unwrap();
        first.close().await;

        // 释放后可以重新打开
        let third = store_at(&path);
        third.init().await.unwrap();
        assert_eq!(third.load("k").await.unwrap(), "v");
        third.close().await;
    }

    #[tokio::test]
    async fn reclaim_while_serving_keeps_data_intact() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(PersistentStateStore::with_options(
            dir.path().join("state"),
            Duration::from_millis(20),
            BatchMode::Atomic,
        ));
        store.init().await.unwrap();

        for round in 0..5 {
            for i in 0..50 {
                store
                    .save(Item::new(format!("k{round}-{i}"), "x".repeat(256)))
                    .await
                    .unwrap();
            }
            for i in 0..40 {
                store.delete(&format!("k{round}-{i}")).await.unwrap();
            }
            tokio::time::sleep(Duration::from_millis(30)).await;
        }

        assert_eq!(store.load_all().await.unwrap().len(), 5 * 10);
        assert!(store.reclaim_cycles().unwrap_or(0) >= 1);

        // 回收只在有删除时压缩，空闲的 tick 不占用数据库
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(store.reclaimable_bytes(), 0);
        store.close().await;
        assert_eq!(store.reclaim_cycles(), None);
    }
}
