use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::config::StorageConfig;
use crate::storage::{StateStore, StorageFactory};

/// 构建并初始化存储后端
///
/// 初始化失败（目录无法创建、数据文件损坏、已被其他进程占用）时返回错误，
/// 调用方应终止启动。
pub async fn prepare_storage(config: &StorageConfig) -> Result<Arc<dyn StateStore>> {
    let start_time = std::time::Instant::now();
    debug!("Preparing state store...");

    let store = StorageFactory::create(config);
    store
        .init()
        .await
        .with_context(|| format!("Failed to initialize {} state store", store.backend_name()))?;

    info!(
        "State store ready: {} (took {:?})",
        store.backend_name(),
        start_time.elapsed()
    );
    Ok(store)
}
