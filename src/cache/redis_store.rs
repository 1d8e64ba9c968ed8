use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, Client as RedisClient};
use serde::{Serialize, de::DeserializeOwned};

use super::keys::USER_INFO_PREFIX;
use super::{CacheStore, CacheStoreError, EntityId};

/// Redis 缓存存储，值以 JSON 保存，过期交给 Redis 的 SETEX
pub struct RedisCacheStore<V> {
    redis: Arc<RedisClient>,
    prefix: &'static str,
    _value: PhantomData<fn() -> V>,
}

impl<V> RedisCacheStore<V> {
    pub fn new(redis: Arc<RedisClient>, prefix: &'static str) -> Self {
        Self {
            redis,
            prefix,
            _value: PhantomData,
        }
    }

    /// 用户信息缓存
    pub fn users(redis: Arc<RedisClient>) -> Self {
        Self::new(redis, USER_INFO_PREFIX)
    }

    fn key(&self, id: &impl EntityId) -> String {
        format!("{}{}", self.prefix, id)
    }
}

/// SETEX 只接受整秒，向上取整且至少一秒
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs_f64().ceil().max(1.0) as u64
}

#[async_trait]
impl<K, V> CacheStore<K, V> for RedisCacheStore<V>
where
    K: EntityId,
    V: Serialize + DeserializeOwned + Send + Sync,
{
    async fn load(&self, id: &K) -> Result<Option<V>, CacheStoreError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;

        let result: Option<String> = conn.get(self.key(id)).await?;
        match result {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn store(&self, id: &K, value: &V, ttl: Duration) -> Result<(), CacheStoreError> {
        let json = serde_json::to_string(value)?;
        let mut conn = self.redis.get_multiplexed_async_connection().await?;

        let _: () = conn.set_ex(self.key(id), json, ttl_secs(ttl)).await?;
        Ok(())
    }

    async fn delete(&self, id: &K) -> Result<(), CacheStoreError> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;

        let _: () = conn.del(self.key(id)).await?;
        Ok(())
    }
}
