//! 后台空间回收任务
//!
//! 按固定间隔对数据库文件执行压缩，回收已删除条目占用的空间。
//! 压缩需要独占数据库句柄：回收任务只在能立即拿到写锁时才开始（`try_write`），
//! 拿不到就跳过本轮，因此回收任务从不等待请求。
//! 但压缩进行期间，新到达的请求会在读锁上等待这一次压缩结束。
//! 为了限制这种停顿，每轮最多压缩一次，且只在自上次压缩以来有删除时才压缩。

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use redb::Database;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::errors::Result;

/// 回收间隔下限，tokio interval 不接受零间隔
const MIN_RECLAIM_INTERVAL: Duration = Duration::from_millis(10);

/// 单轮回收结果
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReclaimReport {
    /// 本轮是否执行了有实际进展的压缩
    pub compacted: bool,
    /// 本轮开始时待回收的字节数（删除条目的 key + value 长度之和）
    pub reclaimable_bytes: u64,
    /// 自上次压缩以来没有删除，无需压缩
    pub idle: bool,
    /// 拿不到独占句柄，本轮跳过
    pub skipped: bool,
    /// 收到停止信号，本轮未开始
    pub interrupted: bool,
}

/// 执行一轮回收
///
/// 阻塞调用，应在 `spawn_blocking` 中运行。`reclaimable` 记录自上次压缩以来
/// 删除释放的字节数，为零时直接返回，不触碰写锁。压缩失败或被跳过时计数保留到下一轮。
pub(crate) fn run_cycle(
    db: &RwLock<Database>,
    reclaimable: &AtomicU64,
    stop: &watch::Receiver<bool>,
) -> Result<ReclaimReport> {
    let mut report = ReclaimReport::default();

    if *stop.borrow() {
        report.interrupted = true;
        return Ok(report);
    }

    report.reclaimable_bytes = reclaimable.load(Ordering::Acquire);
    if report.reclaimable_bytes == 0 {
        report.idle = true;
        return Ok(report);
    }

    let Some(mut guard) = db.try_write() else {
        report.skipped = true;
        return Ok(report);
    };

    // 持有写锁期间不会有新的删除，清零后再压缩
    let taken = reclaimable.swap(0, Ordering::AcqRel);
    match guard.compact() {
        Ok(progressed) => report.compacted = progressed,
        Err(e) => {
            reclaimable.fetch_add(taken, Ordering::AcqRel);
            return Err(e.into());
        }
    }
    drop(guard);

    Ok(report)
}

/// 后台回收任务句柄
pub struct ReclaimHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
    cycles: Arc<AtomicU64>,
}

impl ReclaimHandle {
    /// 启动后台回收任务（必须在 tokio runtime 中调用）
    pub fn spawn(
        db: Arc<RwLock<Database>>,
        reclaimable: Arc<AtomicU64>,
        interval: Duration,
    ) -> Self {
        let interval = interval.max(MIN_RECLAIM_INTERVAL);
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let cycles = Arc::new(AtomicU64::new(0));
        let cycles_counter = Arc::clone(&cycles);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // 第一次 tick 立即返回，跳过
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = stop_rx.changed() => break,
                }

                let cycle_db = Arc::clone(&db);
                let cycle_reclaimable = Arc::clone(&reclaimable);
                let cycle_stop = stop_rx.clone();
                let cycle = tokio::task::spawn_blocking(move || {
                    run_cycle(&cycle_db, &cycle_reclaimable, &cycle_stop)
                });
                match cycle.await {
                    Ok(Ok(report)) if report.idle => {
                        debug!("State store GC idle: nothing deleted since last compaction");
                    }
                    Ok(Ok(report)) if report.skipped => {
                        debug!("State store GC skipped: database busy, retrying next tick");
                    }
                    Ok(Ok(report)) => {
                        debug!("State store GC cycle finished: {:?}", report);
                    }
                    Ok(Err(e)) => {
                        warn!("State store GC cycle failed: {}, retrying next tick", e);
                    }
                    Err(e) => {
                        error!("State store GC cycle panicked: {}", e);
                    }
                }
                cycles_counter.fetch_add(1, Ordering::Relaxed);

                if *stop_rx.borrow() {
                    break;
                }
            }

            debug!("State store GC loop stopped");
        });

        info!(
            "State store GC background task started (interval: {:?})",
            interval
        );

        Self {
            stop_tx,
            task,
            cycles,
        }
    }

    /// 已完成的回收轮数
    pub fn completed_cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// 发出停止信号，不等待任务结束
    pub fn signal_stop(&self) {
        self.stop_tx.send_replace(true);
    }

    /// 发出停止信号并等待进行中的回收轮次结束
    pub async fn shutdown(self) {
        self.signal_stop();
        if let Err(e) = self.task.await {
            warn!("State store GC task ended abnormally: {}", e);
        }
    }
}
