//! 进程内的固定窗口限流器

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::clock::{Clock, SystemClock};
use crate::sweep::{SweeperHandle, spawn_sweeper};

use super::counter::ExpiringCounters;
use super::{Decision, LimiterError, RateLimiterConfig};

/// 每个客户端键在一个固定窗口内最多放行 `limit` 个请求
///
/// 窗口从该键的第一个请求开始，`window` 之后结束，中间的流量不会延长窗口。
/// 所有计数器放在同一张表里，由一把锁保护，同一个键的并发请求不会丢失计数。
pub struct FixedWindowLimiter {
    limit: u64,
    window: Duration,
    clock: Arc<dyn Clock>,
    counters: Mutex<ExpiringCounters>,
}

impl FixedWindowLimiter {
    /// 使用系统时钟
    pub fn new(config: RateLimiterConfig) -> Result<Self, LimiterError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: RateLimiterConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, LimiterError> {
        config.validate()?;
        Ok(Self {
            limit: config.limit,
            window: config.window,
            clock,
            counters: Mutex::new(ExpiringCounters::new(config.window)),
        })
    }

    /// 判断 `key` 的这次请求能否放行
    ///
    /// 拒绝时给出的重试时间固定为完整窗口，精确的剩余时间只写进日志。
    pub fn allow(&self, key: &str) -> Decision {
        let now = self.clock.now();
        let mut counters = self.counters.lock();

        match counters.increment_below(key, self.limit, now) {
            Some(count) => {
                drop(counters);
                trace!(key, count, limit = self.limit, "request admitted");
                Decision::admitted()
            }
            None => {
                let resets_in = counters.time_to_reset(key, now);
                drop(counters);
                debug!(key, limit = self.limit, resets_in = ?resets_in, "rate limit exceeded");
                Decision::rejected(self.window)
            }
        }
    }

    /// 当前窗口内已经计入的请求数
    pub fn current_count(&self, key: &str) -> Option<u64> {
        self.counters.lock().get(key, self.clock.now())
    }

    /// 距离窗口重置的精确时间，用于诊断
    pub fn remaining_window(&self, key: &str) -> Option<Duration> {
        self.counters.lock().time_to_reset(key, self.clock.now())
    }

    /// 清理窗口已经结束的计数器
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        self.counters.lock().sweep(now)
    }

    pub fn tracked_keys(&self) -> usize {
        self.counters.lock().len()
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// 启动后台清理任务，每隔 `every` 执行一次
    ///
    /// 限流器被释放后任务自行退出，丢弃返回的句柄会立即终止任务。
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> SweeperHandle {
        spawn_sweeper(self, every, "rate_limit", FixedWindowLimiter::sweep)
    }
}
