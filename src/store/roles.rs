use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::{FromRow, PgPool};

use super::{StoreError, timed};

/// 角色按等级比较，等级高的拥有等级低的全部权限
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub level: i32,
}

/// 新用户默认的角色
pub const DEFAULT_ROLE: &str = "user";
pub const MODERATOR_ROLE: &str = "moderator";
pub const ADMIN_ROLE: &str = "admin";

#[async_trait]
pub trait RoleRepository: Send + Sync {
    async fn get_by_name(&self, name: &str) -> Result<Role, StoreError>;
}

#[derive(Clone)]
pub struct RoleStore {
    pool: PgPool,
    query_timeout: Duration,
}

impl RoleStore {
    pub fn new(pool: PgPool, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
        }
    }
}

#[async_trait]
impl RoleRepository for RoleStore {
    async fn get_by_name(&self, name: &str) -> Result<Role, StoreError> {
        timed(self.query_timeout, async {
            sqlx::query_as::<_, Role>("SELECT id, name, description, level FROM roles WHERE name = $1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?
                .ok_or(StoreError::NotFound)
        })
        .await
    }
}
