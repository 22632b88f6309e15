use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::storage::StateStore;

/// 关闭存储的超时时间（秒）
const STORE_CLOSE_TIMEOUT_SECS: u64 = 30;

/// 等待 Ctrl+C 信号
pub async fn wait_for_signal() {
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received, stopping server...");
        }
        Err(e) => {
            warn!(
                "Failed to listen for Ctrl+C: {}. Proceeding with shutdown anyway.",
                e
            );
        }
    }
}

/// 关闭存储，等待进行中的回收任务结束
///
/// 超时返回 false，调用方决定是否强制退出。
pub async fn close_store(store: &Arc<dyn StateStore>) -> bool {
    match timeout(Duration::from_secs(STORE_CLOSE_TIMEOUT_SECS), store.close()).await {
        Ok(()) => {
            info!("State store closed ({})", store.backend_name());
            true
        }
        Err(_) => {
            error!(
                "Closing state store timed out after {} seconds",
                STORE_CLOSE_TIMEOUT_SECS
            );
            false
        }
    }
}
