//! 请求准入：按客户端键做固定窗口限流

mod backend;
mod counter;
mod distributed;
mod limiter;

use std::time::Duration;

use thiserror::Error;

pub use backend::AdmissionControl;
pub use counter::ExpiringCounters;
pub use distributed::RedisRateLimiter;
pub use limiter::FixedWindowLimiter;

/// 限流策略，限流器创建后不可修改
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiterConfig {
    /// 每个窗口放行的请求数
    pub limit: u64,
    /// 窗口长度，从键的第一个请求开始计算
    pub window: Duration,
}

impl RateLimiterConfig {
    pub fn validate(&self) -> Result<(), LimiterError> {
        if self.limit == 0 {
            return Err(LimiterError::InvalidLimit);
        }
        if self.window.is_zero() {
            return Err(LimiterError::InvalidWindow);
        }
        Ok(())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LimiterError {
    #[error("rate limit must allow at least one request per window")]
    InvalidLimit,

    #[error("rate limit window must be longer than zero")]
    InvalidWindow,
}

/// 准入判断结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub admitted: bool,
    /// 放行时为零
    pub retry_after: Duration,
}

impl Decision {
    pub fn admitted() -> Self {
        Self {
            admitted: true,
            retry_after: Duration::ZERO,
        }
    }

    pub fn rejected(retry_after: Duration) -> Self {
        Self {
            admitted: false,
            retry_after,
        }
    }
}
