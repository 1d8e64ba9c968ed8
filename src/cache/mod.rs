// 缓存模块
// 读穿透缓存及其存储后端

pub mod entry;
pub mod keys;
pub mod read_through;
pub mod redis_store;
pub mod source;
pub mod store;

use std::fmt::Display;
use std::hash::Hash;
use std::time::Duration;

use thiserror::Error;

pub use entry::CacheEntry;
pub use read_through::{CacheConfig, ReadThroughCache};
pub use redis_store::RedisCacheStore;
pub use source::{SourceError, SourceOfRecord};
pub use store::{CacheStore, MemoryCacheStore};

/// 可以作为缓存键的实体标识
pub trait EntityId: Clone + Eq + Hash + Display + Send + Sync + 'static {
    /// 标识是否已经分配（例如数据库自增 ID 必须大于 0）
    fn is_assigned(&self) -> bool;
}

impl EntityId for i64 {
    fn is_assigned(&self) -> bool {
        *self > 0
    }
}

/// 缓存存储层错误
#[derive(Error, Debug)]
pub enum CacheStoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("cache store timed out")]
    Timeout,

    #[error("{0}")]
    Other(String),
}

/// 读穿透缓存对外暴露的错误
#[derive(Error, Debug)]
pub enum CacheError {
    /// 标识未分配或不合法，请求不会到达任何存储
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("resource not found")]
    NotFound,

    #[error("cache unavailable: {0}")]
    CacheUnavailable(#[source] CacheStoreError),

    #[error("source of record unavailable: {0}")]
    SourceUnavailable(String),

    #[error("source of record timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid cache configuration: {0}")]
    InvalidConfig(&'static str),
}
