//! 状态存储
//!
//! 所有后端都实现 [`StateStore`]，调用方只持有 `Arc<dyn StateStore>`。
//! - `memory`: 进程内易失存储，用于测试和临时部署
//! - `persistent`: 基于 redb 的持久化存储，带后台空间回收任务

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::{StorageBackend, StorageConfig};
use crate::errors::Result;

pub mod backends;
pub mod models;

pub use backends::{MemoryStateStore, PersistentStateStore};
pub use models::{BatchMode, BatchOutcome, Item, StorageKey, StorageValue, StoreState};

/// 状态存储契约
///
/// 每个操作对单个 key 都是可线性化的；不同 key 之间不保证顺序。
/// 除 `init` / `close` 外，所有操作只能在 [`StoreState::Ready`] 状态下调用，
/// 否则立即返回 `StoreNotReady`。
#[async_trait]
pub trait StateStore: Send + Sync {
    /// 打开底层资源
    async fn init(&self) -> Result<()>;

    /// 仅插入：key 已存在时返回 `KeyAlreadyExists`，绝不覆盖
    async fn save(&self, item: Item) -> Result<()>;

    /// 批量写入，语义由 [`BatchMode`] 决定；不会返回 `KeyAlreadyExists`
    async fn save_all(&self, items: Vec<Item>) -> Result<BatchOutcome>;

    /// 读取 key 对应的值，不存在时返回 `KeyNotFound`
    async fn load(&self, key: &str) -> Result<StorageValue>;

    /// 全量扫描，结果无序
    async fn load_all(&self) -> Result<Vec<Item>>;

    /// 删除 key 并返回删除前的值；key 不存在时返回 `Ok(None)` 而不是错误
    async fn delete(&self, key: &str) -> Result<Option<StorageValue>>;

    /// 释放底层资源，可重复调用
    async fn close(&self);

    fn backend_name(&self) -> &'static str;

    fn state(&self) -> StoreState;
}

pub struct StorageFactory;

impl StorageFactory {
    /// 根据配置创建存储后端（尚未 `init`）
    pub fn create(config: &StorageConfig) -> Arc<dyn StateStore> {
        let store: Arc<dyn StateStore> = match config.backend {
            StorageBackend::Memory => Arc::new(MemoryStateStore::new(config.batch_mode)),
            StorageBackend::Persistent => Arc::new(PersistentStateStore::new(config)),
        };
        info!(
            "Using storage backend: {} (batch mode: {})",
            store.backend_name(),
            config.batch_mode
        );
        store
    }
}

/// 按 key 是否已存在划分批次
///
/// 返回 (可写入的条目, 冲突的 key)。同一批次中重复出现的 key，
/// 第一次出现按正常规则判断，之后的出现都视为冲突。
pub(crate) fn partition_batch<F>(
    items: Vec<Item>,
    mut exists: F,
) -> Result<(Vec<Item>, Vec<StorageKey>)>
where
    F: FnMut(&str) -> Result<bool>,
{
    let mut seen: HashSet<StorageKey> = HashSet::with_capacity(items.len());
    let mut accepted = Vec::with_capacity(items.len());
    let mut conflicts = Vec::new();

    for item in items {
        if seen.contains(&item.key) || exists(&item.key)? {
            conflicts.push(item.key);
            continue;
        }
        seen.insert(item.key.clone());
        accepted.push(item);
    }

    Ok((accepted, conflicts))
}
