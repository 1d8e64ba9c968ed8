use std::sync::Arc;

use config::Config;

use cache::ReadThroughCache;
use error::AppError;
use ratelimit::AdmissionControl;
use store::{Storage, UserProfile};

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod middleware;
pub mod ratelimit;
pub mod router;
pub mod routes;
pub mod store;
pub mod sweep;
pub mod utils;

pub type UserCache = ReadThroughCache<i64, UserProfile>;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Storage,
    /// 关闭缓存时为 None，读请求直接访问数据库
    pub user_cache: Option<Arc<UserCache>>,
    /// 关闭限流时为 None
    pub limiter: Option<Arc<dyn AdmissionControl>>,
}

impl AppState {
    /// 读取用户资料，优先走缓存
    pub async fn load_user(&self, user_id: i64) -> Result<UserProfile, AppError> {
        match &self.user_cache {
            Some(cache) => Ok(cache.get(&user_id).await?),
            None => Ok(self.store.users.get_by_id(user_id).await?),
        }
    }

    /// 写操作之后让缓存中的旧数据失效
    pub async fn invalidate_user(&self, user_id: i64) -> Result<(), AppError> {
        if let Some(cache) = &self.user_cache {
            cache.invalidate(&user_id).await?;
        }
        Ok(())
    }
}
