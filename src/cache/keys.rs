//! 缓存键前缀

/// 用户信息缓存键前缀
pub const USER_INFO_PREFIX: &str = "user:info:";
