//! 周期性清理过期数据的后台任务

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

/// 后台清理任务的句柄，drop 时终止任务
#[derive(Debug)]
pub struct SweeperHandle {
    task: JoinHandle<()>,
}

impl SweeperHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// 每隔 `every` 对 `target` 执行一次 `sweep`
///
/// 任务只持有弱引用，`target` 被释放后任务自行退出，不会比它的所有者活得更久。
pub fn spawn_sweeper<T, F>(target: &Arc<T>, every: Duration, name: &'static str, sweep: F) -> SweeperHandle
where
    T: Send + Sync + 'static,
    F: Fn(&T) -> usize + Send + 'static,
{
    let target: Weak<T> = Arc::downgrade(target);
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let Some(target) = target.upgrade() else {
                break;
            };
            let removed = sweep(&target);
            if removed > 0 {
                trace!(sweeper = name, removed, "swept expired entries");
            }
        }
        debug!(sweeper = name, "sweeper stopped");
    });
    SweeperHandle { task }
}
