use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::cache::{SourceError, SourceOfRecord};

use super::{StoreError, classify, timed};

/// 用户公开信息，也是缓存中保存的内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
    /// 角色名
    pub role: String,
    /// 角色等级，越大权限越高
    pub role_level: i32,
}

/// 带密码摘要的完整用户记录，只在登录时使用，永远不进缓存
#[derive(Debug, Clone, FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
}

#[derive(Debug)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    /// 注册时分配的角色名
    pub role: &'a str,
}

/// 用户读写
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// 创建用户和激活邀请，邀请写入失败时用户也不会留下
    async fn create_and_invite(
        &self,
        user: NewUser<'_>,
        token_hash: &str,
        invitation_expiry: Duration,
    ) -> Result<UserProfile, StoreError>;

    /// 根据邀请令牌激活用户，返回被激活的用户ID
    async fn activate(&self, token_hash: &str) -> Result<i64, StoreError>;

    async fn get_by_id(&self, user_id: i64) -> Result<UserProfile, StoreError>;

    /// 只返回已激活的用户
    async fn get_by_email(&self, email: &str) -> Result<UserRecord, StoreError>;

    async fn update_username(&self, user_id: i64, username: &str)
    -> Result<UserProfile, StoreError>;

    async fn delete(&self, user_id: i64) -> Result<(), StoreError>;

    async fn follow(&self, follower_id: i64, user_id: i64) -> Result<(), StoreError>;

    async fn unfollow(&self, follower_id: i64, user_id: i64) -> Result<(), StoreError>;
}

/// 任何用户存储库都可以作为用户缓存的数据源
#[async_trait]
impl<R> SourceOfRecord<i64, UserProfile> for R
where
    R: UserRepository + ?Sized,
{
    async fn fetch_by_id(&self, id: &i64) -> Result<UserProfile, SourceError> {
        self.get_by_id(*id).await.map_err(|e| match e {
            StoreError::NotFound => SourceError::NotFound,
            other => SourceError::Unavailable(other.to_string()),
        })
    }
}

/// PostgreSQL 用户存储库
#[derive(Clone)]
pub struct UserStore {
    pool: PgPool,
    query_timeout: Duration,
}

/// 带角色的资料查询，`u` 可以是表也可以是 CTE
const PROFILE_SELECT: &str = "SELECT u.id, u.username, u.email, u.created_at, u.is_active, \
     r.name AS role, r.level AS role_level FROM u JOIN roles r ON r.id = u.role_id";

impl UserStore {
    pub fn new(pool: PgPool, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
        }
    }
}

#[async_trait]
impl UserRepository for UserStore {
    async fn create_and_invite(
        &self,
        user: NewUser<'_>,
        token_hash: &str,
        invitation_expiry: Duration,
    ) -> Result<UserProfile, StoreError> {
        timed(self.query_timeout, async {
            let mut tx = self.pool.begin().await?;

            let profile = sqlx::query_as::<_, UserProfile>(&format!(
                "WITH u AS (INSERT INTO users (username, email, password_hash, role_id) \
                 VALUES ($1, $2, $3, (SELECT id FROM roles WHERE name = $4)) RETURNING *) {}",
                PROFILE_SELECT
            ))
            .bind(user.username)
            .bind(user.email)
            .bind(user.password_hash)
            .bind(user.role)
            .fetch_one(&mut *tx)
            .await
            .map_err(classify)?;

            // 出错时 tx 被 drop，用户插入一起回滚
            sqlx::query(
                "INSERT INTO user_invitations (token, user_id, expiry) \
                 VALUES ($1, $2, NOW() + make_interval(secs => $3))",
            )
            .bind(token_hash)
            .bind(profile.id)
            .bind(invitation_expiry.as_secs_f64())
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
            tracing::info!(user_id = profile.id, "created user with pending invitation");
            Ok::<_, StoreError>(profile)
        })
        .await
    }

    async fn activate(&self, token_hash: &str) -> Result<i64, StoreError> {
        timed(self.query_timeout, async {
            let mut tx = self.pool.begin().await?;

            let user_id: i64 = sqlx::query_scalar(
                "SELECT u.id FROM users u JOIN user_invitations ui ON u.id = ui.user_id \
                 WHERE ui.token = $1 AND ui.expiry > NOW()",
            )
            .bind(token_hash)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::NotFound)?;

            sqlx::query("UPDATE users SET is_active = TRUE WHERE id = $1")
                .bind(user_id)
                .execute(&mut *tx)
                .await?;

            sqlx::query("DELETE FROM user_invitations WHERE user_id = $1")
                .bind(user_id)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
            Ok::<_, StoreError>(user_id)
        })
        .await
    }

    async fn get_by_id(&self, user_id: i64) -> Result<UserProfile, StoreError> {
        timed(self.query_timeout, async {
            sqlx::query_as::<_, UserProfile>(&format!(
                "WITH u AS (SELECT * FROM users WHERE id = $1) {}",
                PROFILE_SELECT
            ))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)
        })
        .await
    }

    async fn get_by_email(&self, email: &str) -> Result<UserRecord, StoreError> {
        timed(self.query_timeout, async {
            sqlx::query_as::<_, UserRecord>(
                "SELECT id, username, email, password_hash, created_at, is_active \
                 FROM users WHERE email = $1 AND is_active = TRUE",
            )
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)
        })
        .await
    }

    async fn update_username(
        &self,
        user_id: i64,
        username: &str,
    ) -> Result<UserProfile, StoreError> {
        timed(self.query_timeout, async {
            sqlx::query_as::<_, UserProfile>(&format!(
                "WITH u AS (UPDATE users SET username = $1 WHERE id = $2 RETURNING *) {}",
                PROFILE_SELECT
            ))
            .bind(username)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?
            .ok_or(StoreError::NotFound)
        })
        .await
    }

    async fn delete(&self, user_id: i64) -> Result<(), StoreError> {
        timed(self.query_timeout, async {
            let result = sqlx::query("DELETE FROM users WHERE id = $1")
                .bind(user_id)
                .execute(&self.pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
        .await
    }

    async fn follow(&self, follower_id: i64, user_id: i64) -> Result<(), StoreError> {
        timed(self.query_timeout, async {
            sqlx::query("INSERT INTO followers (user_id, follower_id) VALUES ($1, $2)")
                .bind(user_id)
                .bind(follower_id)
                .execute(&self.pool)
                .await
                .map_err(classify)?;
            Ok::<_, StoreError>(())
        })
        .await
    }

    async fn unfollow(&self, follower_id: i64, user_id: i64) -> Result<(), StoreError> {
        timed(self.query_timeout, async {
            let result =
                sqlx::query("DELETE FROM followers WHERE user_id = $1 AND follower_id = $2")
                    .bind(user_id)
                    .bind(follower_id)
                    .execute(&self.pool)
                    .await?;
            if result.rows_affected() == 0 {
                return Err(StoreError::NotFollowing);
            }
            Ok(())
        })
        .await
    }
}
