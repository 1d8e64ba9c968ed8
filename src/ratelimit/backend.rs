//! 进程内限流器和 Redis 限流器共用的准入接口

use async_trait::async_trait;

use super::{Decision, FixedWindowLimiter};

/// 按客户端键放行或拒绝请求
///
/// HTTP 中间件只依赖这个 trait，单实例用进程内计数，多实例部署换成共享计数存储。
#[async_trait]
pub trait AdmissionControl: Send + Sync {
    async fn allow(&self, key: &str) -> Decision;
}

#[async_trait]
impl AdmissionControl for FixedWindowLimiter {
    async fn allow(&self, key: &str) -> Decision {
        FixedWindowLimiter::allow(self, key)
    }
}
