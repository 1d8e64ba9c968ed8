//! 多实例部署使用的 Redis 固定窗口限流器

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{AdmissionControl, Decision, LimiterError, RateLimiterConfig};

/// 限流计数键前缀
const RATE_LIMIT_PREFIX: &str = "rate_limit:";

/// 检查、计数和设置过期在一次脚本调用里完成
///
/// 到达上限后不再自增。没有过期时间的键（例如旧版本留下的）会被补上窗口。
static ADMIT_SCRIPT: LazyLock<redis::Script> = LazyLock::new(|| {
    redis::Script::new(
        r"
local current = tonumber(redis.call('GET', KEYS[1]) or '0')
local admitted = 0
if current < tonumber(ARGV[1]) then
    current = redis.call('INCR', KEYS[1])
    admitted = 1
end
local ttl = redis.call('PTTL', KEYS[1])
if ttl < 0 then
    redis.call('PEXPIRE', KEYS[1], ARGV[2])
    ttl = tonumber(ARGV[2])
end
return {admitted, current, ttl}
",
    )
});

/// 基于 Redis 的固定窗口限流器
///
/// 窗口从键的第一次请求开始，之后的请求不会延长窗口，语义与进程内的
/// `FixedWindowLimiter` 相同，只是计数在所有实例之间共享。
#[derive(Clone)]
pub struct RedisRateLimiter {
    redis: Arc<redis::Client>,
    limit: u64,
    window: Duration,
}

impl RedisRateLimiter {
    pub fn new(redis: Arc<redis::Client>, config: RateLimiterConfig) -> Result<Self, LimiterError> {
        config.validate()?;
        Ok(Self {
            redis,
            limit: config.limit,
            window: config.window,
        })
    }

    fn window_millis(&self) -> u64 {
        // PEXPIRE 至少一毫秒
        (self.window.as_millis() as u64).max(1)
    }

    /// 返回 (是否放行, 当前计数, 窗口剩余毫秒)
    async fn admit(&self, key: &str) -> Result<(bool, u64, u64), redis::RedisError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;

        let (admitted, count, ttl): (i64, u64, i64) = ADMIT_SCRIPT
            .key(format!("{}{}", RATE_LIMIT_PREFIX, key))
            .arg(self.limit)
            .arg(self.window_millis())
            .invoke_async(&mut conn)
            .await?;

        Ok((admitted == 1, count, ttl.max(0) as u64))
    }
}

#[async_trait]
impl AdmissionControl for RedisRateLimiter {
    async fn allow(&self, key: &str) -> Decision {
        match self.admit(key).await {
            Ok((true, _, _)) => Decision::admitted(),
            Ok((false, count, ttl)) => {
                debug!(
                    key,
                    count,
                    limit = self.limit,
                    resets_in = ?Duration::from_millis(ttl),
                    "rate limit exceeded"
                );
                Decision::rejected(self.window)
            }
            Err(e) => {
                // Redis 不可用时放行
                warn!(key, error = %e, "rate limit store unavailable, admitting request");
                Decision::admitted()
            }
        }
    }
}
