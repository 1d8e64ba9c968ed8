use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use super::{StoreError, classify, timed};

/// 评论，带评论者的用户名
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub username: String,
}

#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// 帖子不存在时返回 `StoreError::NotFound`
    async fn create(&self, post_id: i64, user_id: i64, content: &str) -> Result<Comment, StoreError>;

    /// 最新的评论在前
    async fn list_by_post(&self, post_id: i64) -> Result<Vec<Comment>, StoreError>;
}

#[derive(Clone)]
pub struct CommentStore {
    pool: PgPool,
    query_timeout: Duration,
}

impl CommentStore {
    pub fn new(pool: PgPool, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
        }
    }
}

#[async_trait]
impl CommentRepository for CommentStore {
    async fn create(&self, post_id: i64, user_id: i64, content: &str) -> Result<Comment, StoreError> {
        timed(self.query_timeout, async {
            sqlx::query_as::<_, Comment>(
                "WITH c AS (INSERT INTO comments (post_id, user_id, content) VALUES ($1, $2, $3) \
                 RETURNING id, post_id, user_id, content, created_at) \
                 SELECT c.id, c.post_id, c.user_id, c.content, c.created_at, u.username \
                 FROM c JOIN users u ON u.id = c.user_id",
            )
            .bind(post_id)
            .bind(user_id)
            .bind(content)
            .fetch_one(&self.pool)
            .await
            .map_err(classify)
        })
        .await
    }

    async fn list_by_post(&self, post_id: i64) -> Result<Vec<Comment>, StoreError> {
        timed(self.query_timeout, async {
            Ok(sqlx::query_as::<_, Comment>(
                "SELECT c.id, c.post_id, c.user_id, c.content, c.created_at, u.username \
                 FROM comments c JOIN users u ON u.id = c.user_id \
                 WHERE c.post_id = $1 ORDER BY c.created_at DESC",
            )
            .bind(post_id)
            .fetch_all(&self.pool)
            .await?)
        })
        .await
    }
}
