use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use super::{StoreError, classify, timed};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Post {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    /// 每次更新加一，用于乐观锁
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct NewPost<'a> {
    pub user_id: i64,
    pub title: &'a str,
    pub content: &'a str,
    pub tags: &'a [String],
}

/// 一次更新：`version` 是调用方读到的版本
#[derive(Debug)]
pub struct PostUpdate<'a> {
    pub title: &'a str,
    pub content: &'a str,
    pub version: i32,
}

/// 动态流中的一条，带作者名和评论数
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct FeedItem {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub post: Post,
    pub username: String,
    pub comments_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        })
    }
}

/// 已校验的动态流分页和过滤条件
#[derive(Debug, Clone, PartialEq)]
pub struct FeedQuery {
    pub limit: i64,
    pub offset: i64,
    pub sort: SortOrder,
    /// 帖子必须包含全部标签
    pub tags: Vec<String>,
    /// 标题或正文包含的文本，空串表示不过滤
    pub search: String,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl Default for FeedQuery {
    fn default() -> Self {
        Self {
            limit: 20,
            offset: 0,
            sort: SortOrder::Desc,
            tags: Vec::new(),
            search: String::new(),
            since: None,
            until: None,
        }
    }
}

#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn create(&self, post: NewPost<'_>) -> Result<Post, StoreError>;

    async fn get_by_id(&self, post_id: i64) -> Result<Post, StoreError>;

    /// 版本不匹配时返回 `StoreError::Conflict`
    async fn update(&self, post_id: i64, update: PostUpdate<'_>) -> Result<Post, StoreError>;

    async fn delete(&self, post_id: i64) -> Result<(), StoreError>;

    /// 用户自己和其关注的人发的帖子
    async fn feed(&self, user_id: i64, query: &FeedQuery) -> Result<Vec<FeedItem>, StoreError>;
}

#[derive(Clone)]
pub struct PostStore {
    pool: PgPool,
    query_timeout: Duration,
}

const POST_COLUMNS: &str = "id, user_id, title, content, tags, version, created_at, updated_at";

impl PostStore {
    pub fn new(pool: PgPool, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
        }
    }
}

#[async_trait]
impl PostRepository for PostStore {
    async fn create(&self, post: NewPost<'_>) -> Result<Post, StoreError> {
        timed(self.query_timeout, async {
            sqlx::query_as::<_, Post>(&format!(
                "INSERT INTO posts (user_id, title, content, tags) VALUES ($1, $2, $3, $4) RETURNING {}",
                POST_COLUMNS
            ))
            .bind(post.user_id)
            .bind(post.title)
            .bind(post.content)
            .bind(post.tags)
            .fetch_one(&self.pool)
            .await
            .map_err(classify)
        })
        .await
    }

    async fn get_by_id(&self, post_id: i64) -> Result<Post, StoreError> {
        timed(self.query_timeout, async {
            sqlx::query_as::<_, Post>(&format!("SELECT {} FROM posts WHERE id = $1", POST_COLUMNS))
                .bind(post_id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or(StoreError::NotFound)
        })
        .await
    }

    async fn update(&self, post_id: i64, update: PostUpdate<'_>) -> Result<Post, StoreError> {
        timed(self.query_timeout, async {
            sqlx::query_as::<_, Post>(&format!(
                "UPDATE posts SET title = $1, content = $2, version = version + 1, updated_at = NOW() \
                 WHERE id = $3 AND version = $4 RETURNING {}",
                POST_COLUMNS
            ))
            .bind(update.title)
            .bind(update.content)
            .bind(post_id)
            .bind(update.version)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::Conflict)
        })
        .await
    }

    async fn delete(&self, post_id: i64) -> Result<(), StoreError> {
        timed(self.query_timeout, async {
            let result = sqlx::query("DELETE FROM posts WHERE id = $1")
                .bind(post_id)
                .execute(&self.pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
        .await
    }

    async fn feed(&self, user_id: i64, query: &FeedQuery) -> Result<Vec<FeedItem>, StoreError> {
        // 排序方向来自枚举，不是用户输入
        let sql = format!(
            "SELECT p.id, p.user_id, p.title, p.content, p.tags, p.version, p.created_at, p.updated_at, \
                    u.username, COUNT(c.id) AS comments_count \
             FROM posts p \
             JOIN users u ON u.id = p.user_id \
             LEFT JOIN comments c ON c.post_id = p.id \
             WHERE (p.user_id = $1 OR p.user_id IN (SELECT user_id FROM followers WHERE follower_id = $1)) \
               AND (p.title ILIKE '%' || $4 || '%' OR p.content ILIKE '%' || $4 || '%') \
               AND (cardinality($5::text[]) = 0 OR p.tags @> $5::text[]) \
               AND ($6::timestamptz IS NULL OR p.created_at >= $6) \
               AND ($7::timestamptz IS NULL OR p.created_at <= $7) \
             GROUP BY p.id, u.username \
             ORDER BY p.created_at {} \
             LIMIT $2 OFFSET $3",
            query.sort
        );

        timed(self.query_timeout, async {
            Ok(sqlx::query_as::<_, FeedItem>(&sql)
                .bind(user_id)
                .bind(query.limit)
                .bind(query.offset)
                .bind(&query.search)
                .bind(&query.tags)
                .bind(query.since)
                .bind(query.until)
                .fetch_all(&self.pool)
                .await?)
        })
        .await
    }
}
