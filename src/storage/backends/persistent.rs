//! 持久化存储后端
//!
//! 基于 redb 的嵌入式事务型 KV 引擎。所有短链接存放在单个 `links` 表中，
//! key 和 value 都是 `&str`。redb 的写事务是串行的，因此“先读后写”的
//! 插入在一个写事务内完成即可保证原子性。
//!
//! 引擎调用都是阻塞的，统一通过 `spawn_blocking` 放到阻塞线程池执行。
//! 每个操作在整个阻塞调用期间持有 in-flight 读锁，`close` 取写锁等待它们全部结束后
//! 才释放数据库，保证 `close` 返回时文件锁已经释放。

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use redb::{Database, DatabaseError, ReadableDatabase, ReadableTable, TableDefinition};
use tokio::sync::{Mutex, OwnedRwLockReadGuard, RwLock as AsyncRwLock};
use tracing::{debug, error, info, trace, warn};

use super::reclaim::{self, ReclaimHandle, ReclaimReport};
use crate::config::StorageConfig;
use crate::errors::{LinkstashError, Result};
use crate::storage::{
    BatchMode, BatchOutcome, Item, StateStore, StorageValue, StoreState, partition_batch,
};

/// 存储目录下的数据库文件名
pub const DATABASE_FILE_NAME: &str = "state.redb";

/// 短链接表：key -> 目标 URL
const LINKS: TableDefinition<&str, &str> = TableDefinition::new("links");

type SharedDatabase = Arc<RwLock<Database>>;

enum Lifecycle {
    Uninitialized,
    Ready {
        db: SharedDatabase,
        reclaim: ReclaimHandle,
    },
    Closed,
    Failed,
}

impl Lifecycle {
    fn state(&self) -> StoreState {
        match self {
            Lifecycle::Uninitialized => StoreState::Uninitialized,
            Lifecycle::Ready { .. } => StoreState::Ready,
            Lifecycle::Closed => StoreState::Closed,
            Lifecycle::Failed => StoreState::Failed,
        }
    }
}

pub struct PersistentStateStore {
    dir: PathBuf,
    gc_interval: Duration,
    batch_mode: BatchMode,
    lifecycle: RwLock<Lifecycle>,
    /// 串行化 init / close，避免两者交错
    transition: Mutex<()>,
    /// 进行中的操作持有读锁，`close` 取写锁等待它们结束
    inflight: Arc<AsyncRwLock<()>>,
    /// 自上次压缩以来删除释放的字节数
    reclaimable: Arc<AtomicU64>,
}

impl PersistentStateStore {
    pub fn new(config: &StorageConfig) -> Self {
        Self::with_options(&config.path, config.gc_interval(), config.batch_mode)
    }

    pub fn with_options(
        dir: impl AsRef<Path>,
        gc_interval: Duration,
        batch_mode: BatchMode,
    ) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            gc_interval,
            batch_mode,
            lifecycle: RwLock::new(Lifecycle::Uninitialized),
            transition: Mutex::new(()),
            inflight: Arc::new(AsyncRwLock::new(())),
            reclaimable: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 后台回收任务已完成的轮数（未就绪时为 `None`）
    pub fn reclaim_cycles(&self) -> Option<u64> {
        match &*self.lifecycle.read() {
            Lifecycle::Ready { reclaim, .. } => Some(reclaim.completed_cycles()),
            _ => None,
        }
    }

    /// 自上次压缩以来删除释放、等待回收的字节数
    pub fn reclaimable_bytes(&self) -> u64 {
        self.reclaimable.load(Ordering::Acquire)
    }

    /// 立即执行一轮空间回收（不等待定时器）
    pub async fn reclaim_now(&self) -> Result<ReclaimReport> {
        let (inflight, db) = self.acquire().await?;
        let reclaimable = Arc::clone(&self.reclaimable);
        // 手动触发不响应停止信号
        let (_stop_tx, stop_rx) = tokio::sync::watch::channel(false);
        tokio::task::spawn_blocking(move || {
            let _inflight = inflight;
            let db = db;
            reclaim::run_cycle(&db, &reclaimable, &stop_rx)
        })
        .await?
    }

    fn database(&self) -> Result<SharedDatabase> {
        match &*self.lifecycle.read() {
            Lifecycle::Ready { db, .. } => Ok(Arc::clone(db)),
            other => Err(LinkstashError::store_not_ready(format!(
                "persistent store at {} is {}",
                self.dir.display(),
                other.state()
            ))),
        }
    }

    /// 登记一个进行中的操作并取得数据库句柄
    ///
    /// 先取 in-flight 读锁再检查状态：`close` 切换到 Closed 之后拿到锁的操作
    /// 一定看到 Closed，之前拿到锁的操作会被 `close` 等待。
    async fn acquire(&self) -> Result<(OwnedRwLockReadGuard<()>, SharedDatabase)> {
        let inflight = Arc::clone(&self.inflight).read_owned().await;
        let db = self.database()?;
        Ok((inflight, db))
    }

    /// 在阻塞线程池中持有数据库读锁执行 `f`
    ///
    /// in-flight 读锁随闭包一起移动到阻塞线程，调用方的 future 被丢弃时
    /// 阻塞调用仍然受 `close` 等待。
    async fn with_database<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (inflight, db) = self.acquire().await?;
        tokio::task::spawn_blocking(move || {
            // 局部变量逆序释放：数据库句柄先于 in-flight 读锁释放
            let _inflight = inflight;
            let db = db;
            let guard = db.read();
            f(&*guard)
        })
        .await?
    }
}

impl Drop for PersistentStateStore {
    fn drop(&mut self) {
        if let Lifecycle::Ready { reclaim, .. } = self.lifecycle.get_mut() {
            reclaim.signal_stop();
        }
    }
}

/// 打开（必要时创建）存储目录下的数据库，并确保表存在
fn open_database(dir: &Path) -> Result<Database> {
    std::fs::create_dir_all(dir).map_err(|e| {
        LinkstashError::store_open(format!(
            "Failed to create state store directory {}: {}",
            dir.display(),
            e
        ))
    })?;

    let file = dir.join(DATABASE_FILE_NAME);
    let db = Database::create(&file).map_err(|e| match e {
        DatabaseError::DatabaseAlreadyOpen => LinkstashError::store_locked(format!(
            "{} is already opened by another process or store instance",
            file.display()
        )),
        other => LinkstashError::store_open(format!(
            "Failed to open state store {}: {}",
            file.display(),
            other
        )),
    })?;

    // 在写事务中打开表即可创建不存在的表
    let txn = db.begin_write()?;
    txn.open_table(LINKS)?;
    txn.commit()?;

    Ok(db)
}

fn insert_if_absent(db: &Database, item: &Item) -> Result<()> {
    let txn = db.begin_write()?;
    let inserted = {
        let mut table = txn.open_table(LINKS)?;
        let exists = table.get(item.key.as_str())?.is_some();
        if !exists {
            table.insert(item.key.as_str(), item.value.as_str())?;
        }
        !exists
    };

    if !inserted {
        txn.abort()?;
        return Err(LinkstashError::key_already_exists(item.key.clone()));
    }

    txn.commit()?;
    Ok(())
}

fn save_all_atomic(db: &Database, items: Vec<Item>) -> Result<BatchOutcome> {
    let txn = db.begin_write()?;
    let result = {
        let mut table = txn.open_table(LINKS)?;
        let (accepted, conflicts) =
            partition_batch(items, |key| Ok(table.get(key)?.is_some()))?;

        if conflicts.is_empty() {
            for item in &accepted {
                table.insert(item.key.as_str(), item.value.as_str())?;
            }
            Ok(accepted.len())
        } else {
            Err(conflicts)
        }
    };

    match result {
        Ok(saved) => {
            txn.commit()?;
            Ok(BatchOutcome {
                saved,
                skipped: Vec::new(),
            })
        }
        Err(conflicts) => {
            txn.abort()?;
            debug!(
                "PersistentStateStore: batch rejected, {} conflicting keys",
                conflicts.len()
            );
            Err(LinkstashError::batch_rejected(conflicts))
        }
    }
}

fn save_all_best_effort(db: &Database, items: Vec<Item>) -> Result<BatchOutcome> {
    let mut outcome = BatchOutcome::default();

    for item in items {
        match insert_if_absent(db, &item) {
            Ok(()) => outcome.saved += 1,
            Err(LinkstashError::KeyAlreadyExists(key)) => outcome.skipped.push(key),
            Err(e) => {
                warn!(
                    "PersistentStateStore: batch aborted after {} saved items: {}",
                    outcome.saved, e
                );
                return Err(e);
            }
        }
    }

    Ok(outcome)
}

#[async_trait]
impl StateStore for PersistentStateStore {
    async fn init(&self) -> Result<()> {
        let _transition = self.transition.lock().await;

        let current = self.lifecycle.read().state();
        if current != StoreState::Uninitialized {
            return Err(LinkstashError::store_not_ready(format!(
                "persistent store cannot be initialized from state {}",
                current
            )));
        }

        info!("Loading state store from {}", self.dir.display());
        let dir = self.dir.clone();
        let opened = match tokio::task::spawn_blocking(move || open_database(&dir)).await {
            Ok(result) => result,
            Err(e) => Err(LinkstashError::from(e)),
        };

        match opened {
            Ok(db) => {
                let db = Arc::new(RwLock::new(db));
                let reclaim = ReclaimHandle::spawn(
                    Arc::clone(&db),
                    Arc::clone(&self.reclaimable),
                    self.gc_interval,
                );
                *self.lifecycle.write() = Lifecycle::Ready { db, reclaim };
                Ok(())
            }
            Err(e) => {
                error!("Failed to initialize persistent state store: {}", e);
                *self.lifecycle.write() = Lifecycle::Failed;
                Err(e)
            }
        }
    }

    async fn save(&self, item: Item) -> Result<()> {
        self.with_database(move |db| {
            insert_if_absent(db, &item)?;
            trace!("PersistentStateStore: saved key {}", item.key);
            Ok(())
        })
        .await
    }

    async fn save_all(&self, items: Vec<Item>) -> Result<BatchOutcome> {
        let batch_mode = self.batch_mode;
        self.with_database(move |db| match batch_mode {
            BatchMode::Atomic => save_all_atomic(db, items),
            BatchMode::BestEffort => save_all_best_effort(db, items),
        })
        .await
    }

    async fn load(&self, key: &str) -> Result<StorageValue> {
        let key = key.to_string();
        self.with_database(move |db| {
            let txn = db.begin_read()?;
            let table = txn.open_table(LINKS)?;
            // 复制出事务之外，调用方在事务结束后仍可使用
            let value = table.get(key.as_str())?.map(|guard| guard.value().to_string());
            value.ok_or_else(|| LinkstashError::key_not_found(key))
        })
        .await
    }

    async fn load_all(&self) -> Result<Vec<Item>> {
        self.with_database(|db| {
            let txn = db.begin_read()?;
            let table = txn.open_table(LINKS)?;
            let mut items = Vec::new();
            for entry in table.iter()? {
                let (key, value) = entry?;
                items.push(Item::new(key.value(), value.value()));
            }
            Ok(items)
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<Option<StorageValue>> {
        let key = key.to_string();
        let reclaimable = Arc::clone(&self.reclaimable);
        self.with_database(move |db| {
            let txn = db.begin_write()?;
            let previous = {
                let mut table = txn.open_table(LINKS)?;
                let removed = table.remove(key.as_str())?;
                removed.map(|guard| guard.value().to_string())
            };

            if let Some(value) = &previous {
                txn.commit()?;
                reclaimable.fetch_add((key.len() + value.len()) as u64, Ordering::AcqRel);
                trace!("PersistentStateStore: deleted key {}", key);
            } else {
                txn.abort()?;
            }
            Ok(previous)
        })
        .await
    }

    async fn close(&self) {
        let _transition = self.transition.lock().await;

        let (db, reclaim) = {
            let mut lifecycle = self.lifecycle.write();
            match std::mem::replace(&mut *lifecycle, Lifecycle::Closed) {
                Lifecycle::Ready { db, reclaim } => (db, reclaim),
                other => {
                    *lifecycle = other;
                    return;
                }
            }
        };

        // 先停止回收任务并等待进行中的一轮结束
        reclaim.shutdown().await;

        // 等待所有进行中的操作结束；之后到达的操作只会看到 Closed
        let drained = self.inflight.write().await;
        debug!("State store at {} drained in-flight operations", self.dir.display());

        match Arc::try_unwrap(db) {
            Ok(lock) => drop(lock.into_inner()),
            Err(shared) => error!(
                "State store handle still referenced {} times after drain",
                Arc::strong_count(&shared) - 1
            ),
        }
        drop(drained);

        info!("Persistent state store at {} closed", self.dir.display());
    }

    fn backend_name(&self) -> &'static str {
        "persistent"
    }

    fn state(&self) -> StoreState {
        self.lifecycle.read().state()
    }
}
