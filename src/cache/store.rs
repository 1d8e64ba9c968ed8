use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::clock::{Clock, SystemClock};
use crate::sweep::{SweeperHandle, spawn_sweeper};

use super::{CacheEntry, CacheStoreError, EntityId};

/// 缓存存储后端，可以是进程内的也可以是远程的键值服务
///
/// `load` 返回 `Ok(None)` 表示未命中，`Err` 表示存储本身出错，两者不能混为一谈。
#[async_trait]
pub trait CacheStore<K, V>: Send + Sync
where
    K: EntityId,
    V: Send + Sync,
{
    async fn load(&self, id: &K) -> Result<Option<V>, CacheStoreError>;

    async fn store(&self, id: &K, value: &V, ttl: Duration) -> Result<(), CacheStoreError>;

    async fn delete(&self, id: &K) -> Result<(), CacheStoreError>;
}

/// 进程内缓存存储
///
/// 读取时惰性淘汰过期条目，`purge_expired` 可以定期清理冷键以限制内存。
/// 返回给调用方的是值的拷贝，调用方修改不会影响缓存内容。
pub struct MemoryCacheStore<K, V> {
    entries: Mutex<HashMap<K, CacheEntry<V>>>,
    clock: Arc<dyn Clock>,
}

impl<K, V> MemoryCacheStore<K, V>
where
    K: EntityId,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// 清理所有过期条目，返回清理数量
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// 定期清理过期条目
    pub fn spawn_purger(self: &Arc<Self>, every: Duration) -> SweeperHandle {
        spawn_sweeper(self, every, "memory_cache", Self::purge_expired)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl<K, V> Default for MemoryCacheStore<K, V>
where
    K: EntityId,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<K, V> CacheStore<K, V> for MemoryCacheStore<K, V>
where
    K: EntityId,
    V: Clone + Send + Sync + 'static,
{
    async fn load(&self, id: &K) -> Result<Option<V>, CacheStoreError> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        match entries.get(id) {
            None => return Ok(None),
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value().clone())),
            Some(_) => {}
        }
        entries.remove(id);
        Ok(None)
    }

    async fn store(&self, id: &K, value: &V, ttl: Duration) -> Result<(), CacheStoreError> {
        let entry = CacheEntry::new(value.clone(), self.clock.now(), ttl);
        self.entries.lock().insert(id.clone(), entry);
        Ok(())
    }

    async fn delete(&self, id: &K) -> Result<(), CacheStoreError> {
        self.entries.lock().remove(id);
        Ok(())
    }
}
