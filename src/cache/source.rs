use async_trait::async_trait;
use thiserror::Error;

/// 数据源（通常是数据库）返回的错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("resource not found")]
    NotFound,

    #[error("{0}")]
    Unavailable(String),
}

/// 缓存未命中时回源读取的权威数据源
#[async_trait]
pub trait SourceOfRecord<K, V>: Send + Sync
where
    K: Send + Sync,
{
    async fn fetch_by_id(&self, id: &K) -> Result<V, SourceError>;
}
