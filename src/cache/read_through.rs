//! 读穿透缓存：先查缓存存储，未命中时回源并写回

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, timeout_at};
use tracing::{debug, trace, warn};

use super::{CacheError, CacheStore, CacheStoreError, EntityId, SourceError, SourceOfRecord};

/// 单个缓存实例的参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// 写入的条目在多长时间内有效
    pub ttl: Duration,
    /// 一次 `get` 的总期限，包括缓存读写和回源
    pub timeout: Duration,
    /// 单次缓存存储操作的期限，应明显小于 `timeout`，给回源留出时间
    pub store_timeout: Duration,
}

/// 缓存旁路读取
///
/// 未命中时按配置的 TTL 写回，不缓存“不存在”，写操作之后由调用方执行
/// [`ReadThroughCache::invalidate`]。同一个键的并发写回以最后一次为准。
pub struct ReadThroughCache<K, V> {
    store: Arc<dyn CacheStore<K, V>>,
    source: Arc<dyn SourceOfRecord<K, V>>,
    ttl: Duration,
    timeout: Duration,
    store_timeout: Duration,
    strict: bool,
}

impl<K, V> ReadThroughCache<K, V>
where
    K: EntityId,
    V: Send + Sync + 'static,
{
    pub fn new(
        store: Arc<dyn CacheStore<K, V>>,
        source: Arc<dyn SourceOfRecord<K, V>>,
        config: CacheConfig,
    ) -> Result<Self, CacheError> {
        if config.ttl.is_zero() {
            return Err(CacheError::InvalidConfig("ttl must be longer than zero"));
        }
        if config.timeout.is_zero() {
            return Err(CacheError::InvalidConfig("timeout must be longer than zero"));
        }
        if config.store_timeout.is_zero() {
            return Err(CacheError::InvalidConfig("store timeout must be longer than zero"));
        }
        Ok(Self {
            store,
            source,
            ttl: config.ttl,
            timeout: config.timeout,
            store_timeout: config.store_timeout,
            strict: false,
        })
    }

    /// 缓存存储出错时直接返回 `CacheUnavailable`，不再回源
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// 使用实例默认期限读取 `id`
    pub async fn get(&self, id: &K) -> Result<V, CacheError> {
        self.get_within(id, self.timeout).await
    }

    /// 读取 `id`，超过 `timeout` 后放弃
    ///
    /// 缓存读取另有更短的期限，存储卡住时仍有时间回源。
    pub async fn get_within(&self, id: &K, timeout: Duration) -> Result<V, CacheError> {
        ensure_assigned(id)?;
        let deadline = Instant::now() + timeout;

        let cached = match timeout_at(self.store_deadline(deadline), self.store.load(id)).await {
            Ok(result) => result,
            Err(_) => Err(CacheStoreError::Timeout),
        };
        match cached {
            Ok(Some(value)) => {
                trace!(%id, "cache hit");
                return Ok(value);
            }
            Ok(None) => trace!(%id, "cache miss"),
            Err(e) if self.strict => return Err(CacheError::CacheUnavailable(e)),
            Err(e) => warn!(%id, error = %e, "cache unavailable, reading from source"),
        }

        let value = match timeout_at(deadline, self.source.fetch_by_id(id)).await {
            Ok(Ok(value)) => value,
            Ok(Err(SourceError::NotFound)) => return Err(CacheError::NotFound),
            Ok(Err(SourceError::Unavailable(reason))) => {
                return Err(CacheError::SourceUnavailable(reason));
            }
            Err(_) => return Err(CacheError::Timeout(timeout)),
        };

        // 写回失败不影响这次读取
        let populate = self.store.store(id, &value, self.ttl);
        match timeout_at(self.store_deadline(deadline), populate).await {
            Ok(Ok(())) => debug!(%id, ttl = ?self.ttl, "cache populated"),
            Ok(Err(e)) => warn!(%id, error = %e, "failed to populate cache"),
            Err(_) => warn!(%id, "cache populate timed out"),
        }

        Ok(value)
    }

    /// 写操作之后用新值覆盖缓存
    pub async fn put(&self, id: &K, value: &V) -> Result<(), CacheError> {
        ensure_assigned(id)?;
        self.run(self.store.store(id, value, self.ttl)).await
    }

    /// 删除 `id` 的缓存，可以重复调用
    ///
    /// 失败会返回给调用方，写操作不能在旧数据可能仍被读到时报告成功。
    pub async fn invalidate(&self, id: &K) -> Result<(), CacheError> {
        ensure_assigned(id)?;
        self.run(self.store.delete(id)).await?;
        debug!(%id, "cache invalidated");
        Ok(())
    }

    fn store_deadline(&self, deadline: Instant) -> Instant {
        deadline.min(Instant::now() + self.store_timeout)
    }

    async fn run<F>(&self, op: F) -> Result<(), CacheError>
    where
        F: Future<Output = Result<(), CacheStoreError>>,
    {
        match tokio::time::timeout(self.store_timeout, op).await {
            Ok(result) => result.map_err(CacheError::CacheUnavailable),
            Err(_) => Err(CacheError::CacheUnavailable(CacheStoreError::Timeout)),
        }
    }
}

fn ensure_assigned<K: EntityId>(id: &K) -> Result<(), CacheError> {
    if id.is_assigned() {
        Ok(())
    } else {
        Err(CacheError::InvalidKey(id.to_string()))
    }
}
