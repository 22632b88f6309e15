//! 内存存储后端
//!
//! 数据只存在于进程内存中，`close` 后即丢弃。与持久化后端共享同一套错误语义，
//! 契约测试可以在两个后端上交替运行。

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::{RwLock, RwLockReadGuard};
use tracing::{debug, info, trace};

use crate::errors::{LinkstashError, Result};
use crate::storage::{
    BatchMode, BatchOutcome, Item, StateStore, StorageKey, StorageValue, StoreState,
    partition_batch,
};

pub struct MemoryStateStore {
    db: DashMap<StorageKey, StorageValue>,
    state: RwLock<StoreState>,
    /// 单条写入持有读锁并发执行；原子批量写入持有写锁独占执行
    batch_gate: RwLock<()>,
    batch_mode: BatchMode,
}

impl MemoryStateStore {
    pub fn new(batch_mode: BatchMode) -> Self {
        Self {
            db: DashMap::new(),
            state: RwLock::new(StoreState::Uninitialized),
            batch_gate: RwLock::new(()),
            batch_mode,
        }
    }

    /// 检查状态并返回状态读锁
    ///
    /// 调用方在整个操作期间持有返回的 guard，`close` 无法在检查与写入之间清空数据。
    fn ensure_ready(&self) -> Result<RwLockReadGuard<'_, StoreState>> {
        let state = self.state.read();
        if *state == StoreState::Ready {
            Ok(state)
        } else {
            Err(LinkstashError::store_not_ready(format!(
                "memory store is {}",
                *state
            )))
        }
    }

    fn save_all_atomic(&self, items: Vec<Item>) -> Result<BatchOutcome> {
        let _gate = self.batch_gate.write();

        let (accepted, conflicts) = partition_batch(items, |key| Ok(self.db.contains_key(key)))?;
        if !conflicts.is_empty() {
            debug!(
                "MemoryStateStore: batch rejected, {} conflicting keys",
                conflicts.len()
            );
            return Err(LinkstashError::batch_rejected(conflicts));
        }

        let saved = accepted.len();
        for item in accepted {
            self.db.insert(item.key, item.value);
        }

        Ok(BatchOutcome {
            saved,
            skipped: Vec::new(),
        })
    }

    fn save_all_best_effort(&self, items: Vec<Item>) -> Result<BatchOutcome> {
        let _gate = self.batch_gate.read();

        let mut outcome = BatchOutcome::default();
        for item in items {
            match self.db.entry(item.key) {
                Entry::Occupied(entry) => outcome.skipped.push(entry.key().clone()),
                Entry::Vacant(entry) => {
                    entry.insert(item.value);
                    outcome.saved += 1;
                }
            }
        }

        Ok(outcome)
    }
}

impl Default for MemoryStateStore {
    fn default() -> Self {
        Self::new(BatchMode::default())
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn init(&self) -> Result<()> {
        let mut state = self.state.write();
        if *state != StoreState::Uninitialized {
            return Err(LinkstashError::store_not_ready(format!(
                "memory store cannot be initialized from state {}",
                *state
            )));
        }

        info!("Initializing memory state store");
        self.db.clear();
        *state = StoreState::Ready;
        Ok(())
    }

    async fn save(&self, item: Item) -> Result<()> {
        let _ready = self.ensure_ready()?;
        let _gate = self.batch_gate.read();

        match self.db.entry(item.key) {
            Entry::Occupied(entry) => Err(LinkstashError::key_already_exists(entry.key().clone())),
            Entry::Vacant(entry) => {
                trace!("MemoryStateStore: saved key {}", entry.key());
                entry.insert(item.value);
                Ok(())
            }
        }
    }

    async fn save_all(&self, items: Vec<Item>) -> Result<BatchOutcome> {
        let _ready = self.ensure_ready()?;

        match self.batch_mode {
            BatchMode::Atomic => self.save_all_atomic(items),
            BatchMode::BestEffort => self.save_all_best_effort(items),
        }
    }

    async fn load(&self, key: &str) -> Result<StorageValue> {
        let _ready = self.ensure_ready()?;

        self.db
            .get(key)
            .map(|value| value.clone())
            .ok_or_else(|| LinkstashError::key_not_found(key))
    }

    async fn load_all(&self) -> Result<Vec<Item>> {
        let _ready = self.ensure_ready()?;

        Ok(self
            .db
            .iter()
            .map(|entry| Item::new(entry.key().clone(), entry.value().clone()))
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<Option<StorageValue>> {
        let _ready = self.ensure_ready()?;
        let _gate = self.batch_gate.read();

        Ok(self.db.remove(key).map(|(_, value)| value))
    }

    async fn close(&self) {
        let mut state = self.state.write();
        if *state != StoreState::Ready {
            return;
        }

        self.db.clear();
        *state = StoreState::Closed;
        info!("Memory state store closed");
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn state(&self) -> StoreState {
        *self.state.read()
    }
}
