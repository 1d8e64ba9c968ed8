// 数据存储模块
// 每张表一个存储库，处理器只依赖 trait

pub mod comments;
pub mod posts;
pub mod roles;
pub mod users;

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use thiserror::Error;

pub use comments::{Comment, CommentRepository, CommentStore};
pub use posts::{FeedItem, FeedQuery, NewPost, Post, PostRepository, PostStore, PostUpdate, SortOrder};
pub use roles::{ADMIN_ROLE, DEFAULT_ROLE, MODERATOR_ROLE, Role, RoleRepository, RoleStore};
pub use users::{NewUser, UserProfile, UserRecord, UserRepository, UserStore};

/// PostgreSQL 唯一约束冲突
const UNIQUE_VIOLATION: &str = "23505";
/// PostgreSQL 外键约束冲突
const FOREIGN_KEY_VIOLATION: &str = "23503";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("resource not found")]
    NotFound,

    #[error("a user with that email already exists")]
    DuplicateEmail,

    #[error("a user with that username already exists")]
    DuplicateUsername,

    #[error("you're following this user already")]
    AlreadyFollowing,

    #[error("you're not following this user")]
    NotFollowing,

    /// 乐观锁版本不匹配
    #[error("edit conflict, reload and try again")]
    Conflict,

    #[error("query timed out after {0:?}")]
    Timeout(Duration),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// 把约束冲突翻译成业务错误
pub(crate) fn classify(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        match (db.code().as_deref(), db.constraint()) {
            (Some(UNIQUE_VIOLATION), Some("users_email_key")) => return StoreError::DuplicateEmail,
            (Some(UNIQUE_VIOLATION), Some("users_username_key")) => {
                return StoreError::DuplicateUsername;
            }
            (Some(UNIQUE_VIOLATION), Some("followers_pkey")) => return StoreError::AlreadyFollowing,
            (Some(FOREIGN_KEY_VIOLATION), _) => return StoreError::NotFound,
            _ => {}
        }
    }
    StoreError::Database(err)
}

/// 给一次查询加上超时
pub(crate) async fn timed<T>(
    timeout: Duration,
    query: impl Future<Output = Result<T, StoreError>>,
) -> Result<T, StoreError> {
    tokio::time::timeout(timeout, query)
        .await
        .map_err(|_| StoreError::Timeout(timeout))?
}

/// 全部存储库
#[derive(Clone)]
pub struct Storage {
    pub users: Arc<dyn UserRepository>,
    pub posts: Arc<dyn PostRepository>,
    pub comments: Arc<dyn CommentRepository>,
    pub roles: Arc<dyn RoleRepository>,
}

impl Storage {
    /// 基于 PostgreSQL 的存储库，共用一个连接池
    ///
    /// 用户存储库由调用方提供，同一个实例还要作为用户缓存的数据源。
    pub fn postgres(
        users: Arc<dyn UserRepository>,
        pool: PgPool,
        query_timeout: Duration,
    ) -> Self {
        Self {
            users,
            posts: Arc::new(PostStore::new(pool.clone(), query_timeout)),
            comments: Arc::new(CommentStore::new(pool.clone(), query_timeout)),
            roles: Arc::new(RoleStore::new(pool, query_timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_database_errors_pass_through() {
        assert!(matches!(
            classify(sqlx::Error::RowNotFound),
            StoreError::Database(sqlx::Error::RowNotFound)
        ));
    }

    #[tokio::test]
    async fn test_slow_query_times_out() {
        let result = timed(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, StoreError>(())
        })
        .await;
        assert!(matches!(result, Err(StoreError::Timeout(_))));
    }
}
